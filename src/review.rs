//! Terminal interaction: manual review of each name and rectangle entry

use std::io::{BufRead, Write};

use tracing::warn;

use crate::batch::{Proposal, ReviewContext, ReviewDecision, Reviewer};
use crate::error::{Error, Result};
use crate::fonts::FontChoice;
use crate::layout::{Alignment, FontSize, Placement, RectOrigin, Rectangle, TextLayout};
use crate::output::open_file;

const HELP: &str = "\
Commands:
  <enter>, y        confirm and create the certificate
  size <pt>         use a fixed font size
  auto              size the text automatically
  dx <pt>, dy <pt>  move the text horizontally / vertically
  align <l|c|r>     left, center or right alignment
  font <label>      switch font
  fonts             list available fonts
  preview           write and open a preview PDF
  skip              skip this name
  q                 stop; certificates already written are kept";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Confirm,
    Size(f32),
    Auto,
    Dx(f32),
    Dy(f32),
    Align(Alignment),
    Font(String),
    Fonts,
    Preview,
    Skip,
    Cancel,
    Help,
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let line = line.trim();
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((word, arg)) => (word, arg.trim()),
        None => (line, ""),
    };

    let number = |what: &str| -> std::result::Result<f32, String> {
        arg.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("'{}' needs a number, e.g. '{} 12'", what, what))
    };

    match word.to_ascii_lowercase().as_str() {
        "" | "y" | "yes" | "ok" => Ok(Command::Confirm),
        "size" => number("size").map(Command::Size),
        "auto" => Ok(Command::Auto),
        "dx" => number("dx").map(Command::Dx),
        "dy" => number("dy").map(Command::Dy),
        "align" => arg.parse().map(Command::Align),
        "font" if !arg.is_empty() => Ok(Command::Font(arg.to_string())),
        "font" => Err("'font' needs a label; type 'fonts' to list them".to_string()),
        "fonts" => Ok(Command::Fonts),
        "preview" | "p" => Ok(Command::Preview),
        "skip" | "s" => Ok(Command::Skip),
        "q" | "quit" | "cancel" => Ok(Command::Cancel),
        "help" | "h" | "?" => Ok(Command::Help),
        other => Err(format!("Unknown command '{}'; type 'help' for the list", other)),
    }
}

/// Manual review over a text terminal (or any reader/writer pair)
pub struct TerminalReviewer<R, W> {
    input: R,
    output: W,
    open_previews: bool,
}

impl<R: BufRead, W: Write> TerminalReviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            open_previews: false,
        }
    }

    /// Open preview PDFs in the default viewer after writing them
    pub fn open_previews(mut self, open: bool) -> Self {
        self.open_previews = open;
        self
    }

    /// Give back the writer, mainly to inspect what was printed
    pub fn into_output(self) -> W {
        self.output
    }

    fn describe(&mut self, choice: &FontChoice, placement: &Placement, layout: &TextLayout) -> Result<()> {
        let size = match choice.size {
            FontSize::Auto { .. } => format!("{}pt (auto)", layout.font_size),
            FontSize::Fixed(pt) => format!("{}pt", pt),
        };
        writeln!(
            self.output,
            "  font {}, {}, {} aligned, offset ({}, {}){}",
            choice.font,
            size,
            placement.alignment,
            placement.offset_x,
            placement.offset_y,
            if layout.fits { "" } else { ", DOES NOT FIT" }
        )?;
        Ok(())
    }

    fn handle(
        &mut self,
        command: Command,
        name: &str,
        choice: &mut FontChoice,
        placement: &mut Placement,
        ctx: &mut ReviewContext<'_>,
    ) -> Result<Option<ReviewDecision>> {
        match command {
            Command::Confirm => {
                return Ok(Some(ReviewDecision::Confirm {
                    choice: choice.clone(),
                    placement: *placement,
                }));
            }
            Command::Skip => return Ok(Some(ReviewDecision::Skip)),
            Command::Cancel => return Ok(Some(ReviewDecision::Cancel)),
            Command::Size(pt) => {
                let min = ctx.configured_size().min_size();
                let clamped = FontSize::limit(pt, min, &placement.rect);
                if clamped != pt {
                    writeln!(self.output, "  size limited to {}pt", clamped)?;
                }
                choice.size = FontSize::Fixed(clamped);
            }
            Command::Auto => choice.size = ctx.configured_size().auto_range(),
            Command::Dx(dx) => placement.set_offsets(dx, placement.offset_y),
            Command::Dy(dy) => placement.set_offsets(placement.offset_x, dy),
            Command::Align(alignment) => placement.alignment = alignment,
            Command::Font(label) => match ctx.select_font(&label) {
                Ok(font) => choice.font = font,
                Err(e) => writeln!(self.output, "  {}", e)?,
            },
            Command::Fonts => {
                let labels = ctx.font_labels();
                if labels.is_empty() {
                    writeln!(self.output, "  no fonts in the fonts folder; using the built-in font")?;
                }
                for label in labels {
                    writeln!(self.output, "  {}", label)?;
                }
            }
            Command::Preview => match ctx.preview(name, choice, placement) {
                Ok(path) => {
                    writeln!(self.output, "  preview written to {}", path.display())?;
                    if self.open_previews {
                        if let Err(e) = open_file(&path) {
                            warn!("Could not open preview {}: {}", path.display(), e);
                        }
                    }
                }
                Err(e) => writeln!(self.output, "  preview failed: {}", e)?,
            },
            Command::Help => writeln!(self.output, "{}", HELP)?,
        }
        Ok(None)
    }

    /// Read one line; `None` at end of input
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl<R: BufRead, W: Write> Reviewer for TerminalReviewer<R, W> {
    fn review(&mut self, proposal: Proposal, ctx: &mut ReviewContext<'_>) -> Result<ReviewDecision> {
        let Proposal {
            name,
            index,
            total,
            mut choice,
            mut placement,
            mut layout,
        } = proposal;

        writeln!(self.output, "[{}/{}] {}", index + 1, total, name)?;

        loop {
            self.describe(&choice, &placement, &layout)?;
            write!(self.output, "> ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                writeln!(self.output)?;
                return Ok(ReviewDecision::Cancel);
            };

            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(message) => {
                    writeln!(self.output, "  {}", message)?;
                    continue;
                }
            };

            if let Some(decision) = self.handle(command, &name, &mut choice, &mut placement, ctx)? {
                return Ok(decision);
            }

            match ctx.layout(&name, &choice, &placement) {
                Ok(updated) => layout = updated,
                Err(e) => writeln!(self.output, "  {}", e)?,
            }
        }
    }
}

/// Ask for the placement rectangle until a valid one is entered
///
/// The returned rectangle is in `origin` coordinates, as typed; it has been
/// checked to lie within `page` once converted.
pub fn prompt_rectangle<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    page: &Rectangle,
    origin: RectOrigin,
) -> Result<Rectangle> {
    let corner = match origin {
        RectOrigin::BottomLeft => "bottom-left",
        RectOrigin::TopLeft => "top-left",
    };
    writeln!(
        output,
        "Page is {:.1} x {:.1} pt. Enter the name rectangle as x0,y0,x1,y1 \
         (pt, or add mm/in), measured from the {} corner.",
        page.width(),
        page.height(),
        corner
    )?;

    loop {
        write!(output, "rect> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(Error::InvalidRectangle("no rectangle entered".to_string()));
        }
        if line.trim().is_empty() {
            continue;
        }

        let checked = line
            .parse::<Rectangle>()
            .and_then(|rect| origin.to_page(rect, page).validate(page).map(|_| rect));
        match checked {
            Ok(rect) => return Ok(rect),
            Err(e) => writeln!(output, "{}; please try again", e)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batch;
    use crate::fonts::{FontCatalog, FontLibrary, FontRef};
    use crate::output::{CollisionPolicy, OutputManager};
    use crate::pdf::template::fixtures::template_bytes;
    use crate::pdf::CertificateTemplate;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("\n"), Ok(Command::Confirm));
        assert_eq!(parse_command("Y"), Ok(Command::Confirm));
        assert_eq!(parse_command("size 24.5"), Ok(Command::Size(24.5)));
        assert_eq!(parse_command("dx -12"), Ok(Command::Dx(-12.0)));
        assert_eq!(parse_command("align r"), Ok(Command::Align(Alignment::Right)));
        assert_eq!(
            parse_command("font Roboto/Roboto Bold"),
            Ok(Command::Font("Roboto/Roboto Bold".to_string()))
        );
        assert_eq!(parse_command("q"), Ok(Command::Cancel));
        assert!(parse_command("size big").is_err());
        assert!(parse_command("font").is_err());
        assert!(parse_command("jump").is_err());
    }

    fn run_with_input(dir: &TempDir, input: &str, names: &[&str]) -> (crate::batch::BatchReport, String) {
        run_with_size(dir, input, names, FontSize::default())
    }

    fn run_with_size(
        dir: &TempDir,
        input: &str,
        names: &[&str],
        size: FontSize,
    ) -> (crate::batch::BatchReport, String) {
        let bytes = template_bytes([0, 0, 842, 595], 1);
        let template = CertificateTemplate::from_bytes(Path::new("template.pdf"), &bytes).unwrap();
        let fonts = FontLibrary::new(FontCatalog::scan(&dir.path().join("fonts")).unwrap());
        let output = OutputManager::new(&dir.path().join("output"), CollisionPolicy::Suffix).unwrap();
        let placement = Placement::new(Rectangle::new(171.0, 250.0, 671.0, 310.0));
        let choice = FontChoice {
            font: FontRef::Builtin,
            size,
        };

        let mut batch = Batch::new(&template, fonts, choice, placement, output);
        let mut reviewer = TerminalReviewer::new(Cursor::new(input.to_string()), Vec::new());
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let report = batch.run(&names, Some(&mut reviewer)).unwrap();
        let printed = String::from_utf8(reviewer.into_output()).unwrap();
        (report, printed)
    }

    #[test]
    fn test_adjust_then_confirm() {
        let dir = TempDir::new().unwrap();
        let (report, printed) = run_with_input(&dir, "size 500\ndx 1000\nalign left\n\n", &["Ada Lovelace"]);

        assert_eq!(report.written.len(), 1);
        assert!(printed.contains("[1/1] Ada Lovelace"));
        assert!(printed.contains("size limited to 60pt"));
        assert!(printed.contains("left aligned, offset (250, 0)"));
    }

    #[test]
    fn test_size_commands_follow_configured_range() {
        let dir = TempDir::new().unwrap();
        let configured = FontSize::Auto { min: 20.0, max: 50.0 };
        let (report, printed) = run_with_size(&dir, "size 8\nauto\n\n", &["Ada"], configured);

        assert_eq!(report.written.len(), 1);
        assert!(printed.contains("size limited to 20pt"));
        assert!(printed.contains("50pt (auto)"));
    }

    #[test]
    fn test_end_of_input_cancels() {
        let dir = TempDir::new().unwrap();
        let (report, _) = run_with_input(&dir, "y\n", &["Ada", "Grace", "Alan"]);

        assert!(report.cancelled);
        assert_eq!(report.written.len(), 1);
        assert!(dir.path().join("output/certificate_Ada.pdf").exists());
    }

    #[test]
    fn test_unknown_font_and_skip() {
        let dir = TempDir::new().unwrap();
        let (report, printed) = run_with_input(&dir, "fonts\nfont Missing\nbogus\nskip\nq\n", &["Ada", "Grace"]);

        assert_eq!(report.skipped, vec!["Ada".to_string()]);
        assert!(report.written.is_empty());
        assert!(report.cancelled);
        assert!(printed.contains("no fonts in the fonts folder"));
        assert!(printed.contains("Font not found: Missing"));
        assert!(printed.contains("Unknown command 'bogus'"));
    }

    #[test]
    fn test_preview_is_written_to_output_dir() {
        let dir = TempDir::new().unwrap();
        let (report, printed) = run_with_input(&dir, "preview\n\n", &["Grace Hopper"]);

        assert_eq!(report.written.len(), 1);
        assert!(printed.contains("preview written to"));
        assert!(dir.path().join("output").join(crate::batch::PREVIEW_FILE).exists());
    }

    #[test]
    fn test_prompt_rectangle_reasks_until_valid() {
        let page = Rectangle::new(0.0, 0.0, 842.0, 595.0);
        let mut input = Cursor::new("abc\n\n0,0,900,10\n100,100,300,150\n");
        let mut output = Vec::new();

        let rect = prompt_rectangle(&mut input, &mut output, &page, RectOrigin::BottomLeft).unwrap();

        assert_eq!(rect, Rectangle::new(100.0, 100.0, 300.0, 150.0));
        let printed = String::from_utf8(output).unwrap();
        assert_eq!(printed.matches("please try again").count(), 2);
    }

    #[test]
    fn test_prompt_rectangle_end_of_input() {
        let page = Rectangle::new(0.0, 0.0, 842.0, 595.0);
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let result = prompt_rectangle(&mut input, &mut output, &page, RectOrigin::TopLeft);
        assert!(matches!(result, Err(Error::InvalidRectangle(_))));
    }
}
