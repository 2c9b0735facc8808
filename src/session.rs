//! Session configuration
//!
//! A session gathers everything one generator run needs. Values come from an
//! optional TOML session file and from command-line flags; flags win.
//!
//! ```toml
//! template = "template.pdf"
//! names = "participants.txt"
//! font = "Roboto/Roboto-Bold"
//! rect = "171,250,671,310"
//! align = "center"
//! color = "#1a237e"
//! manual = false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::{Alignment, Color, FontSize, Placement, RectOrigin, Rectangle};
use crate::output::CollisionPolicy;

/// Default folder scanned for fonts
pub const DEFAULT_FONTS_DIR: &str = "fonts";

/// Default folder certificates are written to
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// How names are processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Render every name without asking
    #[default]
    Auto,
    /// Show each name for confirmation and adjustment before rendering
    Manual,
}

/// Raw session settings; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub template: Option<PathBuf>,
    pub names: Option<PathBuf>,
    pub fonts_dir: Option<PathBuf>,
    pub font: Option<String>,
    /// Fixed font size in points; auto sizing when absent
    pub font_size: Option<f32>,
    pub min_font_size: Option<f32>,
    pub max_font_size: Option<f32>,
    /// `"x0,y0,x1,y1"` with an optional `pt`, `mm` or `in` suffix
    pub rect: Option<String>,
    pub rect_origin: Option<String>,
    pub align: Option<String>,
    pub color: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub on_collision: Option<String>,
    pub clean: Option<bool>,
    pub manual: Option<bool>,
}

impl SessionConfig {
    /// Load settings from a TOML session file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("TOML parsing error: {}", e)))
    }

    /// Combine with `overrides`, whose values take precedence
    pub fn merge(self, overrides: SessionConfig) -> SessionConfig {
        SessionConfig {
            template: overrides.template.or(self.template),
            names: overrides.names.or(self.names),
            fonts_dir: overrides.fonts_dir.or(self.fonts_dir),
            font: overrides.font.or(self.font),
            font_size: overrides.font_size.or(self.font_size),
            min_font_size: overrides.min_font_size.or(self.min_font_size),
            max_font_size: overrides.max_font_size.or(self.max_font_size),
            rect: overrides.rect.or(self.rect),
            rect_origin: overrides.rect_origin.or(self.rect_origin),
            align: overrides.align.or(self.align),
            color: overrides.color.or(self.color),
            output_dir: overrides.output_dir.or(self.output_dir),
            on_collision: overrides.on_collision.or(self.on_collision),
            clean: overrides.clean.or(self.clean),
            manual: overrides.manual.or(self.manual),
        }
    }
}

/// Validated settings for one generator run
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub template: PathBuf,
    pub names: PathBuf,
    pub fonts_dir: PathBuf,
    /// Font label or path; the first font found when absent
    pub font: Option<String>,
    pub font_size: FontSize,
    /// Placement rectangle as entered, in `rect_origin` coordinates
    pub rect: Option<Rectangle>,
    pub rect_origin: RectOrigin,
    pub alignment: Alignment,
    pub color: Color,
    pub output_dir: PathBuf,
    pub collision: CollisionPolicy,
    pub clean: bool,
    pub mode: Mode,
}

impl Session {
    /// Validate raw settings and fill in defaults
    pub fn from_config(config: SessionConfig) -> Result<Self> {
        let template = config.template.ok_or_else(|| {
            Error::Config("no template given (use --template or `template` in the session file)".to_string())
        })?;
        let names = config.names.ok_or_else(|| {
            Error::Config("no names file given (use --names or `names` in the session file)".to_string())
        })?;

        let font_size = match config.font_size {
            Some(size) if size > 0.0 && size.is_finite() => FontSize::Fixed(size),
            Some(size) => {
                return Err(Error::Config(format!("font size must be positive, got {}", size)));
            }
            None => {
                let min = config.min_font_size.unwrap_or(FontSize::DEFAULT_MIN);
                let max = config.max_font_size.unwrap_or(FontSize::DEFAULT_MAX);
                if !(min > 0.0 && min <= max) {
                    return Err(Error::Config(format!(
                        "invalid font size range {}-{}pt",
                        min, max
                    )));
                }
                FontSize::Auto { min, max }
            }
        };

        let rect = config.rect.as_deref().map(str::parse::<Rectangle>).transpose()?;

        Ok(Self {
            template,
            names,
            fonts_dir: config
                .fonts_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FONTS_DIR)),
            font: config.font,
            font_size,
            rect,
            rect_origin: parse_setting(config.rect_origin)?,
            alignment: parse_setting(config.align)?,
            color: parse_setting(config.color)?,
            output_dir: config
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            collision: parse_setting(config.on_collision)?,
            clean: config.clean.unwrap_or(false),
            mode: if config.manual.unwrap_or(false) {
                Mode::Manual
            } else {
                Mode::Auto
            },
        })
    }

    /// Build the placement for `rect`, converting it into page coordinates
    /// and checking it against the template page
    pub fn placement(&self, rect: Rectangle, page: &Rectangle) -> Result<Placement> {
        let rect = self.rect_origin.to_page(rect, page);
        rect.validate(page)?;
        Ok(Placement {
            alignment: self.alignment,
            color: self.color,
            ..Placement::new(rect)
        })
    }
}

fn parse_setting<T>(value: Option<String>) -> Result<T>
where
    T: std::str::FromStr<Err = String> + Default,
{
    match value {
        Some(text) => text.parse().map_err(Error::Config),
        None => Ok(T::default()),
    }
}
