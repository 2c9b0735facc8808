//! PDF Certificates CLI tool
//!
//! A command-line tool for drawing participant names onto a certificate
//! template, one PDF per name.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use pdf_certificates::batch::Batch;
use pdf_certificates::fonts::{FontCatalog, FontChoice, FontLibrary, BUILTIN_FONT};
use pdf_certificates::layout::{Length, Rectangle};
use pdf_certificates::logging::init_logger;
use pdf_certificates::names::{clean_names_file, load_names};
use pdf_certificates::output::{open_file, OutputManager};
use pdf_certificates::pdf::CertificateTemplate;
use pdf_certificates::review::{prompt_rectangle, TerminalReviewer};
use pdf_certificates::session::{Mode, Session, SessionConfig};

/// PDF Certificates - Draw participant names onto a certificate template
#[derive(Parser)]
#[command(name = "pdf-certificates")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Find the page size of a template
    pdf-certificates inspect template.pdf

    # Generate one certificate per name, text centered in a box
    pdf-certificates generate --template template.pdf --names names.txt --rect 171,250,671,310

    # Review each name before it is written
    pdf-certificates generate --template template.pdf --names names.txt --manual

    # Tidy up a names list
    pdf-certificates clean names.txt --sort-by-length")]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create one certificate per name
    Generate(GenerateArgs),

    /// Clean a names list (whitespace, casing, numbering, illegal characters)
    Clean {
        /// Names file, one name per line
        input: PathBuf,

        /// Output file path (default: <input>_cleaned.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Order names shortest first
        #[arg(long)]
        sort_by_length: bool,
    },

    /// Show the page size and page count of a template
    Inspect {
        /// Template PDF file
        template: PathBuf,
    },

    /// List the fonts found in the fonts folder
    Fonts {
        /// Folder to scan for .ttf/.otf files
        #[arg(long, default_value = "fonts")]
        fonts_dir: PathBuf,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Template PDF (only the first page is used)
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Names file, one name per line
    #[arg(short, long)]
    names: Option<PathBuf>,

    /// Name rectangle "x0,y0,x1,y1" in points (or add mm/in); asked for when omitted
    #[arg(long)]
    rect: Option<String>,

    /// Corner the rectangle is measured from: bottom-left or top-left
    #[arg(long)]
    rect_origin: Option<String>,

    /// Font label from the fonts folder, a font file, or "Times-Roman"
    #[arg(long)]
    font: Option<String>,

    /// Folder to scan for .ttf/.otf files [default: fonts]
    #[arg(long)]
    fonts_dir: Option<PathBuf>,

    /// Fixed font size in points (default: fit each name to the rectangle)
    #[arg(long)]
    font_size: Option<f32>,

    /// Largest automatic font size [default: 120]
    #[arg(long)]
    max_font_size: Option<f32>,

    /// Smallest automatic font size [default: 5]
    #[arg(long)]
    min_font_size: Option<f32>,

    /// Text alignment: left, center or right [default: center]
    #[arg(long)]
    align: Option<String>,

    /// Text color as #rrggbb [default: #000000]
    #[arg(long)]
    color: Option<String>,

    /// Folder certificates are written to [default: output]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// What to do with files from earlier runs: suffix, skip or overwrite [default: suffix]
    #[arg(long)]
    on_collision: Option<String>,

    /// Clean names before use
    #[arg(long)]
    clean: bool,

    /// Confirm and adjust every name before it is written
    #[arg(long)]
    manual: bool,

    /// TOML session file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Open the output folder when done
    #[arg(long)]
    open: bool,
}

impl GenerateArgs {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            template: self.template.clone(),
            names: self.names.clone(),
            fonts_dir: self.fonts_dir.clone(),
            font: self.font.clone(),
            font_size: self.font_size,
            min_font_size: self.min_font_size,
            max_font_size: self.max_font_size,
            rect: self.rect.clone(),
            rect_origin: self.rect_origin.clone(),
            align: self.align.clone(),
            color: self.color.clone(),
            output_dir: self.output_dir.clone(),
            on_collision: self.on_collision.clone(),
            clean: self.clean.then_some(true),
            manual: self.manual.then_some(true),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Generate(args) => cmd_generate(args),
        Commands::Clean {
            input,
            output,
            sort_by_length,
        } => cmd_clean(input, output, sort_by_length),
        Commands::Inspect { template } => cmd_inspect(template),
        Commands::Fonts { fonts_dir } => cmd_fonts(fonts_dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Generate certificates for every name
fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let file_config = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("Failed to load session file {}", path.display()))?,
        None => SessionConfig::default(),
    };
    let session = Session::from_config(file_config.merge(args.session_config()))?;

    let template = CertificateTemplate::open(&session.template)?;
    let page = template.page_box();

    let names = load_names(&session.names, session.clean)?;
    eprintln!("Loaded {} name(s) from {}", names.len(), session.names.display());

    let rect = match session.rect {
        Some(rect) => rect,
        None => prompt_rectangle(
            &mut io::stdin().lock(),
            &mut io::stdout(),
            &page,
            session.rect_origin,
        )?,
    };
    let placement = session
        .placement(rect, &page)
        .context("Name rectangle does not fit the template page")?;

    let catalog = FontCatalog::scan(&session.fonts_dir)?;
    let font = catalog.choose(session.font.as_deref())?;
    let mut fonts = FontLibrary::new(catalog);
    fonts
        .load(&font)
        .with_context(|| format!("Failed to load font {}", font))?;

    let output = OutputManager::new(&session.output_dir, session.collision)
        .with_context(|| format!("Failed to create output folder {}", session.output_dir.display()))?;

    eprintln!(
        "Drawing names in {} with {} ({})",
        placement.rect, font, session.font_size
    );

    let choice = FontChoice {
        font,
        size: session.font_size,
    };
    let mut batch = Batch::new(&template, fonts, choice, placement, output);

    let report = match session.mode {
        Mode::Auto => batch.run(&names, None)?,
        Mode::Manual => {
            let mut reviewer = TerminalReviewer::new(io::stdin().lock(), io::stdout()).open_previews(true);
            batch.run(&names, Some(&mut reviewer))?
        }
    };

    println!(
        "Written: {}, skipped: {}, failed: {}",
        report.written.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for (name, reason) in &report.failed {
        println!("  failed: {} ({})", name, reason);
    }
    if report.cancelled {
        println!("Stopped before the end of the list; written certificates were kept");
    }
    println!("Output folder: {}", session.output_dir.display());

    if args.open && !report.written.is_empty() {
        open_file(&session.output_dir)?;
    }

    if !report.is_success() {
        bail!("{} certificate(s) could not be created", report.failed.len());
    }

    Ok(())
}

/// Clean a names file
fn cmd_clean(input: PathBuf, output: Option<PathBuf>, sort_by_length: bool) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| cleaned_path(&input));

    let report = clean_names_file(&input, &output, sort_by_length)?;

    println!("Names: {}", report.total);
    println!("Altered: {}", report.altered);
    println!("Dropped: {}", report.dropped);
    println!("Output: {}", output.display());

    Ok(())
}

fn cleaned_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "names".to_string());
    input.with_file_name(format!("{}_cleaned.txt", stem))
}

/// Show information about a template
fn cmd_inspect(template: PathBuf) -> anyhow::Result<()> {
    let certificate = CertificateTemplate::open(&template)?;
    let page: Rectangle = certificate.page_box();

    let mm = |pt: f32| Length::from_pt(pt as f64).mm();

    println!("File: {}", template.display());
    println!("Pages: {}", certificate.page_count());
    println!(
        "Page size: {:.1} x {:.1} pt ({:.1} x {:.1} mm)",
        page.width(),
        page.height(),
        mm(page.width()),
        mm(page.height())
    );
    println!("Page box: {}", page);
    if certificate.rotation() != 0 {
        println!("Rotation: {} degrees", certificate.rotation());
    }

    Ok(())
}

/// List available fonts
fn cmd_fonts(fonts_dir: PathBuf) -> anyhow::Result<()> {
    let catalog = FontCatalog::scan(&fonts_dir)?;

    if catalog.is_empty() {
        println!(
            "No fonts found in {}; the built-in {} will be used",
            fonts_dir.display(),
            BUILTIN_FONT
        );
        return Ok(());
    }

    for entry in catalog.entries() {
        println!("{:<40} {}", entry.label, entry.path.display());
    }
    println!("{:<40} (built-in)", BUILTIN_FONT);

    Ok(())
}
