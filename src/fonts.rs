//! Font discovery, loading and text measurement
//!
//! Fonts are picked up from a folder (scanned recursively for `.ttf` and
//! `.otf` files). When the folder holds no fonts, the built-in Times-Roman
//! is used; it needs no embedding because it is one of the 14 standard PDF
//! fonts.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glob::{glob, Pattern};
use rustybuzz::ttf_parser::GlyphId;
use rustybuzz::{Face, UnicodeBuffer};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::layout::{FontSize, TextMetrics};

/// Label of the built-in fallback font
pub const BUILTIN_FONT: &str = "Times-Roman";

/// File extensions recognised as fonts
const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// A font file discovered in the fonts folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontEntry {
    /// `stem` for files at the top of the folder, `family/stem` below it
    pub label: String,
    pub path: PathBuf,
}

/// Reference to the font used for drawing names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FontRef {
    Builtin,
    File { label: String, path: PathBuf },
}

impl FontRef {
    pub fn label(&self) -> &str {
        match self {
            FontRef::Builtin => BUILTIN_FONT,
            FontRef::File { label, .. } => label,
        }
    }
}

impl fmt::Display for FontRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A font together with the size to draw it at
#[derive(Debug, Clone, PartialEq)]
pub struct FontChoice {
    pub font: FontRef,
    pub size: FontSize,
}

/// Fonts available in a fonts folder
#[derive(Debug, Clone, Default)]
pub struct FontCatalog {
    dir: PathBuf,
    entries: Vec<FontEntry>,
}

impl FontCatalog {
    /// Scan `dir` recursively for font files.
    ///
    /// A missing folder is created so users have somewhere to drop fonts;
    /// the catalog is then empty.
    pub fn scan(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("Could not create fonts folder {}: {}", dir.display(), e);
            }
            return Ok(Self {
                dir: dir.to_path_buf(),
                entries: Vec::new(),
            });
        }

        let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
        let paths = glob(&pattern)
            .map_err(|e| Error::General(format!("Invalid fonts folder pattern {}: {}", pattern, e)))?;

        let mut entries: Vec<FontEntry> = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable fonts folder entry: {}", e);
                    continue;
                }
            };
            if !path.is_file() || !is_font_file(&path) {
                continue;
            }
            entries.push(FontEntry {
                label: font_label(dir, &path),
                path,
            });
        }

        entries.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.path.cmp(&b.path)));
        entries.dedup_by(|later, first| {
            let duplicate = later.label == first.label;
            if duplicate {
                warn!(
                    "Ignoring {}: label '{}' already used by {}",
                    later.path.display(),
                    first.label,
                    first.path.display()
                );
            }
            duplicate
        });

        debug!("Found {} font(s) in {}", entries.len(), dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[FontEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, label: &str) -> Option<&FontEntry> {
        self.entries.iter().find(|entry| entry.label == label)
    }

    /// Resolve a requested font.
    ///
    /// `requested` may be a catalog label, the built-in font name, or a path
    /// to a font file. Without a request the first catalog font is used, or
    /// the built-in font when the catalog is empty.
    pub fn choose(&self, requested: Option<&str>) -> Result<FontRef> {
        match requested {
            Some(name) if name.eq_ignore_ascii_case(BUILTIN_FONT) => Ok(FontRef::Builtin),
            Some(name) => {
                if let Some(entry) = self.find(name) {
                    return Ok(FontRef::File {
                        label: entry.label.clone(),
                        path: entry.path.clone(),
                    });
                }

                let path = Path::new(name);
                if path.is_file() && is_font_file(path) {
                    return Ok(FontRef::File {
                        label: file_stem(path),
                        path: path.to_path_buf(),
                    });
                }

                Err(Error::FontNotFound {
                    requested: name.to_string(),
                    available: self.available_labels(),
                })
            }
            None => match self.entries.first() {
                Some(entry) => Ok(FontRef::File {
                    label: entry.label.clone(),
                    path: entry.path.clone(),
                }),
                None => {
                    warn!(
                        "No fonts found in {}; falling back to {}",
                        self.dir.display(),
                        BUILTIN_FONT
                    );
                    Ok(FontRef::Builtin)
                }
            },
        }
    }

    fn available_labels(&self) -> String {
        let mut labels: Vec<&str> = self.entries.iter().map(|e| e.label.as_str()).collect();
        labels.push(BUILTIN_FONT);
        labels.join(", ")
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FONT_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "font".to_string())
}

fn font_label(root: &Path, path: &Path) -> String {
    let stem = file_stem(path);
    let family = path
        .parent()
        .filter(|parent| *parent != root)
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().into_owned());

    match family {
        Some(family) => format!("{}/{}", family, stem),
        None => stem,
    }
}

/// One positioned glyph of a shaped line
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedGlyph {
    /// Glyph id (embedded fonts) or WinAnsi character code (built-in font)
    pub id: u16,
    /// Nominal advance in thousandths of an em
    pub width: i32,
    /// Advance after shaping (kerning) in thousandths of an em
    pub advance: i32,
    /// Source text the glyph represents
    pub text: String,
}

/// A line of text converted to glyphs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapedText {
    pub glyphs: Vec<ShapedGlyph>,
}

impl ShapedText {
    /// Total advance in thousandths of an em
    pub fn advance(&self) -> i32 {
        self.glyphs.iter().map(|g| g.advance).sum()
    }

    /// Whether any character had no glyph in the font
    pub fn has_missing_glyphs(&self) -> bool {
        self.glyphs.iter().any(|g| g.id == 0)
    }
}

/// Parsed data of a TrueType/OpenType font file
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    pub data: Vec<u8>,
    /// Name used for BaseFont, restricted to PDF-safe characters
    pub postscript_name: String,
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    pub cap_height: i16,
    /// x_min, y_min, x_max, y_max in font units
    pub bbox: [i16; 4],
    /// CFF outlines (`OTTO` signature) rather than TrueType outlines
    pub is_cff: bool,
}

impl EmbeddedFont {
    fn parse(path: &Path, data: Vec<u8>) -> Result<Self> {
        let (units_per_em, ascender, descender, cap_height, bbox) = {
            let face = Face::from_slice(&data, 0).ok_or_else(|| {
                Error::Font(format!("{} is not a valid TrueType/OpenType font", path.display()))
            })?;
            let units_per_em = u16::try_from(face.units_per_em()).map_err(|_| {
                Error::Font(format!("{} has an invalid units-per-em value", path.display()))
            })?;
            let bbox = face.global_bounding_box();
            (
                units_per_em,
                face.ascender(),
                face.descender(),
                face.capital_height().unwrap_or(face.ascender()),
                [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            )
        };
        let is_cff = data.starts_with(b"OTTO");

        let postscript_name: String = file_stem(path)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();

        Ok(Self {
            postscript_name: if postscript_name.is_empty() {
                "EmbeddedFont".to_string()
            } else {
                postscript_name
            },
            units_per_em,
            ascender,
            descender,
            cap_height,
            bbox,
            is_cff,
            data,
        })
    }

    /// Scale a value in font units to thousandths of an em
    pub fn to_milli(&self, units: i32) -> i32 {
        let upem = self.units_per_em.max(1) as f32;
        (units as f32 * 1000.0 / upem).round() as i32
    }

    fn shape(&self, text: &str) -> Result<ShapedText> {
        let face = Face::from_slice(&self.data, 0)
            .ok_or_else(|| Error::Font(format!("{} could not be re-parsed", self.postscript_name)))?;

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        let output = rustybuzz::shape(&face, &[], buffer);
        let infos = output.glyph_infos();
        let positions = output.glyph_positions();

        // Cluster boundaries map each glyph back to the text it came from
        let mut boundaries: Vec<usize> = infos.iter().map(|g| g.cluster as usize).collect();
        boundaries.push(text.len());
        boundaries.sort_unstable();
        boundaries.dedup();

        let glyphs = infos
            .iter()
            .zip(positions.iter())
            .map(|(info, pos)| {
                let id = info.glyph_id as u16;
                let start = (info.cluster as usize).min(text.len());
                let end = boundaries
                    .iter()
                    .copied()
                    .find(|b| *b > start)
                    .unwrap_or(text.len());
                let nominal = face.glyph_hor_advance(GlyphId(id)).unwrap_or(0) as i32;
                ShapedGlyph {
                    id,
                    width: self.to_milli(nominal),
                    advance: self.to_milli(pos.x_advance),
                    text: text.get(start..end).unwrap_or_default().to_string(),
                }
            })
            .collect();

        Ok(ShapedText { glyphs })
    }
}

#[derive(Debug, Clone)]
enum FontKind {
    Standard,
    Embedded(EmbeddedFont),
}

/// A font ready for measuring and drawing text
#[derive(Debug, Clone)]
pub struct LoadedFont {
    label: String,
    kind: FontKind,
}

impl LoadedFont {
    /// The built-in Times-Roman font
    pub fn builtin() -> Self {
        Self {
            label: BUILTIN_FONT.to_string(),
            kind: FontKind::Standard,
        }
    }

    /// Load the font behind a [`FontRef`]
    pub fn load(font: &FontRef) -> Result<Self> {
        match font {
            FontRef::Builtin => Ok(Self::builtin()),
            FontRef::File { label, path } => {
                let data = std::fs::read(path).map_err(|e| {
                    Error::Font(format!("Unable to read font file {}: {}", path.display(), e))
                })?;
                let embedded = EmbeddedFont::parse(path, data)?;
                debug!(
                    "Loaded font {} ({} units/em{})",
                    label,
                    embedded.units_per_em,
                    if embedded.is_cff { ", CFF" } else { "" }
                );
                Ok(Self {
                    label: label.clone(),
                    kind: FontKind::Embedded(embedded),
                })
            }
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Font program data, `None` for the built-in font
    pub fn embedded(&self) -> Option<&EmbeddedFont> {
        match &self.kind {
            FontKind::Standard => None,
            FontKind::Embedded(font) => Some(font),
        }
    }

    /// Distance from baseline to the top of the line, in em
    pub fn ascent(&self) -> f32 {
        match &self.kind {
            FontKind::Standard => STANDARD_ASCENT as f32 / 1000.0,
            FontKind::Embedded(font) => font.ascender as f32 / font.units_per_em.max(1) as f32,
        }
    }

    /// Distance from baseline to the bottom of the line, in em (negative)
    pub fn descent(&self) -> f32 {
        match &self.kind {
            FontKind::Standard => STANDARD_DESCENT as f32 / 1000.0,
            FontKind::Embedded(font) => font.descender as f32 / font.units_per_em.max(1) as f32,
        }
    }

    /// Convert text into glyphs with advances
    pub fn shape(&self, text: &str) -> Result<ShapedText> {
        match &self.kind {
            FontKind::Standard => Ok(shape_win_ansi(text)),
            FontKind::Embedded(font) => font.shape(text),
        }
    }

    /// Measure shaped text for layout
    pub fn metrics(&self, shaped: &ShapedText) -> TextMetrics {
        TextMetrics {
            advance: shaped.advance() as f32 / 1000.0,
            ascent: self.ascent(),
            descent: self.descent(),
        }
    }
}

/// Loaded fonts, keyed by font file, shared across the names of a batch
#[derive(Debug, Default)]
pub struct FontLibrary {
    catalog: FontCatalog,
    loaded: HashMap<FontRef, Rc<LoadedFont>>,
}

impl FontLibrary {
    pub fn new(catalog: FontCatalog) -> Self {
        Self {
            catalog,
            loaded: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &FontCatalog {
        &self.catalog
    }

    /// Load a font, reusing an earlier load of the same file
    ///
    /// A font picked by path may share its label with a catalog font, so
    /// the cache is keyed by the whole reference.
    pub fn load(&mut self, font: &FontRef) -> Result<Rc<LoadedFont>> {
        if let Some(loaded) = self.loaded.get(font) {
            return Ok(Rc::clone(loaded));
        }
        let loaded = Rc::new(LoadedFont::load(font)?);
        self.loaded.insert(font.clone(), Rc::clone(&loaded));
        Ok(loaded)
    }

    /// Resolve a label (or path) through the catalog and load it
    pub fn resolve(&mut self, requested: &str) -> Result<(FontRef, Rc<LoadedFont>)> {
        let font = self.catalog.choose(Some(requested))?;
        let loaded = self.load(&font)?;
        Ok((font, loaded))
    }
}

/// Times-Roman ascent and descent in thousandths of an em
const STANDARD_ASCENT: i32 = 891;
const STANDARD_DESCENT: i32 = -216;

/// Unicode code points for WinAnsiEncoding bytes 0x80-0x9F (0 = unassigned)
const WIN_ANSI_HIGH: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, //
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0, 0x017D, 0, //
    0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, //
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Times-Roman glyph widths for WinAnsiEncoding codes 32-255,
/// in thousandths of an em
pub const STANDARD_WIDTHS: [u16; 224] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // 32
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // 48
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // 64
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // 80
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // 96
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, 350, // 112
    500, 350, 333, 500, 444, 1000, 500, 500, 333, 1000, 556, 333, 889, 350, 611, 350, // 128
    350, 333, 333, 444, 444, 350, 500, 1000, 333, 980, 389, 333, 722, 350, 444, 722, // 144
    250, 333, 500, 500, 500, 500, 200, 500, 333, 760, 276, 500, 564, 333, 760, 333, // 160
    400, 564, 300, 300, 333, 500, 453, 250, 333, 300, 310, 500, 750, 750, 750, 444, // 176
    722, 722, 722, 722, 722, 722, 889, 667, 611, 611, 611, 611, 333, 333, 333, 333, // 192
    722, 722, 722, 722, 722, 722, 722, 564, 722, 722, 722, 722, 722, 722, 556, 500, // 208
    444, 444, 444, 444, 444, 444, 667, 444, 444, 444, 444, 444, 278, 278, 278, 278, // 224
    500, 500, 500, 500, 500, 500, 500, 564, 500, 500, 500, 500, 500, 500, 500, 500, // 240
];

/// Map a character to its WinAnsiEncoding byte
pub fn win_ansi_code(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|&u| u != 0 && u == code)
            .map(|i| 0x80 + i as u8),
    }
}

fn standard_width(code: u8) -> i32 {
    STANDARD_WIDTHS
        .get((code as usize).wrapping_sub(32))
        .copied()
        .unwrap_or(0) as i32
}

/// Encode text for the built-in font; unmappable characters become `?`
fn shape_win_ansi(text: &str) -> ShapedText {
    let glyphs = text
        .chars()
        .map(|c| {
            let code = win_ansi_code(c).unwrap_or(b'?');
            let width = standard_width(code);
            ShapedGlyph {
                id: code as u16,
                width,
                advance: width,
                text: c.to_string(),
            }
        })
        .collect();
    ShapedText { glyphs }
}
