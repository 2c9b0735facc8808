//! Placement geometry and text layout calculations
//!
//! All coordinates are PDF points with the origin at the bottom-left of the
//! page, matching the template's own coordinate space.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Tolerance used when comparing coordinates
const EPSILON: f32 = 0.01;

/// Simple length type in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length(pub f64);

impl Length {
    /// Create a length from millimeters
    pub fn from_mm(mm: f64) -> Self {
        Length(mm)
    }

    /// Create a length from inches
    pub fn from_inches(inches: f64) -> Self {
        Length(inches * 25.4)
    }

    /// Create a length from points (1/72 inch)
    pub fn from_pt(pt: f64) -> Self {
        Length(pt * 25.4 / 72.0)
    }

    /// Get the value in millimeters
    pub fn mm(&self) -> f64 {
        self.0
    }

    /// Get the value in points (1/72 inch)
    pub fn pt(&self) -> f64 {
        self.0 * 72.0 / 25.4
    }
}

/// An axis-aligned box `(x0, y0)`–`(x1, y1)` in page coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rectangle {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Build a rectangle from two opposite corners given in any order
    pub fn from_corners(a: (f32, f32), b: (f32, f32)) -> Self {
        Self {
            x0: a.0.min(b.0),
            y0: a.1.min(b.1),
            x1: a.0.max(b.0),
            y1: a.1.max(b.1),
        }
    }

    /// Convert a rectangle measured from the page's top-left corner (y grows
    /// downwards, as in a rendered preview image) into page coordinates.
    pub fn from_top_left(rect: Rectangle, page: &Rectangle) -> Self {
        Self::from_corners(
            (page.x0 + rect.x0, page.y1 - rect.y0),
            (page.x0 + rect.x1, page.y1 - rect.y1),
        )
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Whether `other` lies entirely inside this rectangle
    pub fn contains(&self, other: &Rectangle) -> bool {
        other.x0 >= self.x0 - EPSILON
            && other.y0 >= self.y0 - EPSILON
            && other.x1 <= self.x1 + EPSILON
            && other.y1 <= self.y1 + EPSILON
    }

    /// Check that the rectangle has a positive area and lies within `page`
    pub fn validate(&self, page: &Rectangle) -> Result<()> {
        let coords = [self.x0, self.y0, self.x1, self.y1];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidRectangle(format!("{} has non-finite coordinates", self)));
        }
        if self.x1 <= self.x0 || self.y1 <= self.y0 {
            return Err(Error::InvalidRectangle(format!("{} has zero or negative size", self)));
        }
        if !page.contains(self) {
            return Err(Error::InvalidRectangle(format!(
                "{} lies outside the page bounds {}",
                self, page
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.1}, {:.1}, {:.1}, {:.1}]", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Parses `"x0,y0,x1,y1"` with an optional `pt`, `mm` or `in` suffix.
/// Whitespace may be used instead of commas.
impl FromStr for Rectangle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let (body, to_length): (&str, fn(f64) -> Length) = if lower.ends_with("mm") {
            (&trimmed[..trimmed.len() - 2], Length::from_mm)
        } else if lower.ends_with("in") {
            (&trimmed[..trimmed.len() - 2], Length::from_inches)
        } else if lower.ends_with("pt") {
            (&trimmed[..trimmed.len() - 2], Length::from_pt)
        } else {
            (trimmed, Length::from_pt)
        };

        let values: Vec<f64> = body
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<f64>().map_err(|_| {
                    Error::InvalidRectangle(format!("'{}' is not a number in '{}'", part, s))
                })
            })
            .collect::<Result<_>>()?;

        if values.len() != 4 {
            return Err(Error::InvalidRectangle(format!(
                "expected four coordinates x0,y0,x1,y1 but got {} in '{}'",
                values.len(),
                s
            )));
        }

        let pt = |v: f64| to_length(v).pt() as f32;
        Ok(Rectangle::from_corners(
            (pt(values[0]), pt(values[1])),
            (pt(values[2]), pt(values[3])),
        ))
    }
}

/// Corner the coordinates of a user-entered rectangle are measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RectOrigin {
    /// PDF convention, y grows upwards
    #[default]
    BottomLeft,
    /// Image convention, y grows downwards
    TopLeft,
}

impl RectOrigin {
    /// Convert `rect` into page coordinates
    pub fn to_page(self, rect: Rectangle, page: &Rectangle) -> Rectangle {
        match self {
            RectOrigin::BottomLeft => rect,
            RectOrigin::TopLeft => Rectangle::from_top_left(rect, page),
        }
    }
}

impl FromStr for RectOrigin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "bottom-left" | "pdf" => Ok(RectOrigin::BottomLeft),
            "top-left" | "image" => Ok(RectOrigin::TopLeft),
            other => Err(format!("unknown rectangle origin '{}' (use bottom-left or top-left)", other)),
        }
    }
}

/// Horizontal anchoring of the name inside the rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Alignment::Left),
            "center" | "centre" | "c" => Ok(Alignment::Center),
            "right" | "r" => Ok(Alignment::Right),
            other => Err(format!("unknown alignment '{}' (use left, center or right)", other)),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        };
        f.write_str(name)
    }
}

/// RGB fill color, components in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parse `#rrggbb` (the leading `#` is optional)
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid color '{}' (expected #rrggbb)", s));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|e| e.to_string())
        };
        Ok(Color {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

/// How the font size is chosen for each name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FontSize {
    /// Largest whole point size in `min..=max` that fits the rectangle
    Auto { min: f32, max: f32 },
    /// Always use this size
    Fixed(f32),
}

impl FontSize {
    pub const DEFAULT_MIN: f32 = 5.0;
    pub const DEFAULT_MAX: f32 = 120.0;

    /// Smallest size a name may be drawn at
    pub fn min_size(&self) -> f32 {
        match self {
            FontSize::Auto { min, .. } => *min,
            FontSize::Fixed(_) => Self::DEFAULT_MIN,
        }
    }

    /// Automatic sizing over this range, or over the default range when fixed
    pub fn auto_range(&self) -> FontSize {
        match self {
            FontSize::Auto { .. } => *self,
            FontSize::Fixed(_) => FontSize::default(),
        }
    }

    /// Limit a fixed size to `[min, floor(rect height)]`; `min` wins when
    /// the rectangle is lower than that
    pub fn limit(pt: f32, min: f32, rect: &Rectangle) -> f32 {
        pt.min(rect.height().floor()).max(min)
    }
}

impl Default for FontSize {
    fn default() -> Self {
        FontSize::Auto {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontSize::Auto { min, max } => write!(f, "auto ({}-{}pt)", min, max),
            FontSize::Fixed(size) => write!(f, "{}pt", size),
        }
    }
}

/// Where and how the name is drawn on the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub rect: Rectangle,
    pub alignment: Alignment,
    /// Manual horizontal adjustment in points
    pub offset_x: f32,
    /// Manual vertical adjustment in points
    pub offset_y: f32,
    pub color: Color,
}

impl Placement {
    pub fn new(rect: Rectangle) -> Self {
        Self {
            rect,
            alignment: Alignment::default(),
            offset_x: 0.0,
            offset_y: 0.0,
            color: Color::default(),
        }
    }

    /// Largest allowed manual offsets: half the rectangle, but at least 10pt
    pub fn offset_limits(&self) -> (f32, f32) {
        (
            (self.rect.width() / 2.0).max(10.0),
            (self.rect.height() / 2.0).max(10.0),
        )
    }

    /// Set the manual offsets, clamped to [`Placement::offset_limits`]
    pub fn set_offsets(&mut self, dx: f32, dy: f32) {
        let (max_x, max_y) = self.offset_limits();
        self.offset_x = dx.clamp(-max_x, max_x);
        self.offset_y = dy.clamp(-max_y, max_y);
    }
}

/// Font-independent measurements of a line of text
///
/// Values are in em units: multiply by the font size to get points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Total advance width of the text
    pub advance: f32,
    /// Distance from the baseline to the top of the line (positive)
    pub ascent: f32,
    /// Distance from the baseline to the bottom of the line (negative)
    pub descent: f32,
}

impl TextMetrics {
    fn line_height(&self) -> f32 {
        self.ascent - self.descent
    }

    fn fits(&self, size: f32, rect: &Rectangle) -> bool {
        self.advance * size <= rect.width() + EPSILON
            && self.line_height() * size <= rect.height() + EPSILON
    }
}

/// Resolved position of a name on the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    pub font_size: f32,
    /// Left edge of the text
    pub x: f32,
    pub baseline: f32,
    pub width: f32,
    /// Box spanned by the text advance and the font's ascent/descent
    pub bounds: Rectangle,
    /// Whether the text fits the rectangle at `font_size`
    pub fits: bool,
}

/// Pick the largest whole point size in `min..=max` at which the text fits.
///
/// The upper bound is also capped by the rectangle height. When nothing fits,
/// `min` is returned together with `false`.
pub fn fit_font_size(metrics: &TextMetrics, rect: &Rectangle, min: f32, max: f32) -> (f32, bool) {
    let lower = min.max(1.0).ceil() as i32;
    let upper = max.min(rect.height()).floor() as i32;

    for size in (lower..=upper).rev() {
        if metrics.fits(size as f32, rect) {
            return (size as f32, true);
        }
    }

    (min, metrics.fits(min, rect))
}

/// Compute the font size and origin for a line of text inside a placement
pub fn layout_text(metrics: &TextMetrics, size: FontSize, placement: &Placement) -> TextLayout {
    let rect = placement.rect;

    let (font_size, fits) = match size {
        FontSize::Auto { min, max } => fit_font_size(metrics, &rect, min, max),
        FontSize::Fixed(size) => (size, metrics.fits(size, &rect)),
    };

    let width = metrics.advance * font_size;
    let line_height = metrics.line_height() * font_size;

    let x = match placement.alignment {
        Alignment::Left => rect.x0,
        Alignment::Center => rect.x0 + (rect.width() - width) / 2.0,
        Alignment::Right => rect.x1 - width,
    } + placement.offset_x;

    // Center the ascent/descent box vertically
    let baseline = rect.y0 + (rect.height() - line_height) / 2.0 - metrics.descent * font_size
        + placement.offset_y;

    TextLayout {
        font_size,
        x,
        baseline,
        width,
        bounds: Rectangle::new(
            x,
            baseline + metrics.descent * font_size,
            x + width,
            baseline + metrics.ascent * font_size,
        ),
        fits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(advance: f32) -> TextMetrics {
        TextMetrics {
            advance,
            ascent: 0.9,
            descent: -0.2,
        }
    }

    #[test]
    fn test_length_conversions() {
        let len = Length::from_inches(1.0);
        assert!((len.mm() - 25.4).abs() < 0.01);
        assert!((len.pt() - 72.0).abs() < 0.01);
        assert!((Length::from_pt(72.0).mm() - 25.4).abs() < 0.01);
    }

    #[test]
    fn test_rectangle_parse_points() {
        let rect: Rectangle = "100,200,500,260".parse().unwrap();
        assert_eq!(rect, Rectangle::new(100.0, 200.0, 500.0, 260.0));
    }

    #[test]
    fn test_rectangle_parse_normalizes_corners() {
        let rect: Rectangle = "500 260 100 200".parse().unwrap();
        assert_eq!(rect, Rectangle::new(100.0, 200.0, 500.0, 260.0));
    }

    #[test]
    fn test_rectangle_parse_inches() {
        let rect: Rectangle = "1,1,2,1.5in".parse().unwrap();
        assert!((rect.x0 - 72.0).abs() < 0.01);
        assert!((rect.x1 - 144.0).abs() < 0.01);
        assert!((rect.y1 - 108.0).abs() < 0.01);
    }

    #[test]
    fn test_rectangle_parse_rejects_bad_input() {
        assert!("1,2,3".parse::<Rectangle>().is_err());
        assert!("a,b,c,d".parse::<Rectangle>().is_err());
    }

    #[test]
    fn test_from_top_left_flips_y() {
        let page = Rectangle::new(0.0, 0.0, 842.0, 595.0);
        let rect = Rectangle::from_top_left(Rectangle::new(100.0, 50.0, 300.0, 90.0), &page);
        assert_eq!(rect, Rectangle::new(100.0, 505.0, 300.0, 545.0));
    }

    #[test]
    fn test_rect_origin() {
        let page = Rectangle::new(0.0, 0.0, 842.0, 595.0);
        let rect = Rectangle::new(100.0, 50.0, 300.0, 90.0);
        assert_eq!("top-left".parse::<RectOrigin>().unwrap().to_page(rect, &page).y1, 545.0);
        assert_eq!(RectOrigin::default().to_page(rect, &page), rect);
        assert!("middle".parse::<RectOrigin>().is_err());
    }

    #[test]
    fn test_validate() {
        let page = Rectangle::new(0.0, 0.0, 612.0, 792.0);
        assert!(Rectangle::new(10.0, 10.0, 100.0, 50.0).validate(&page).is_ok());
        assert!(Rectangle::new(10.0, 10.0, 10.0, 50.0).validate(&page).is_err());
        assert!(Rectangle::new(500.0, 10.0, 700.0, 50.0).validate(&page).is_err());
        assert!(Rectangle::new(f32::NAN, 10.0, 100.0, 50.0).validate(&page).is_err());
    }

    #[test]
    fn test_color_parse() {
        let color: Color = "#ff8000".parse().unwrap();
        assert_eq!(color.r, 1.0);
        assert!((color.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(color.b, 0.0);
        assert!("#12345".parse::<Color>().is_err());
    }

    #[test]
    fn test_fit_font_size_limited_by_width() {
        let rect = Rectangle::new(0.0, 0.0, 100.0, 200.0);
        // 5 em of advance: 20pt is the largest size at 100pt wide
        let (size, fits) = fit_font_size(&metrics(5.0), &rect, 5.0, 120.0);
        assert_eq!(size, 20.0);
        assert!(fits);
    }

    #[test]
    fn test_fit_font_size_limited_by_height() {
        let rect = Rectangle::new(0.0, 0.0, 1000.0, 33.0);
        let (size, fits) = fit_font_size(&metrics(1.0), &rect, 5.0, 120.0);
        // line height 1.1 em: 30pt * 1.1 = 33pt
        assert_eq!(size, 30.0);
        assert!(fits);
    }

    #[test]
    fn test_fit_font_size_falls_back_to_minimum() {
        let rect = Rectangle::new(0.0, 0.0, 10.0, 40.0);
        let (size, fits) = fit_font_size(&metrics(20.0), &rect, 5.0, 120.0);
        assert_eq!(size, 5.0);
        assert!(!fits);
    }

    #[test]
    fn test_layout_centers_text() {
        let placement = Placement::new(Rectangle::new(100.0, 100.0, 300.0, 150.0));
        let layout = layout_text(&metrics(4.0), FontSize::Fixed(20.0), &placement);

        assert_eq!(layout.width, 80.0);
        assert!((layout.x - 160.0).abs() < 0.001);
        assert!(placement.rect.contains(&layout.bounds));
        // Equal space above and below the line box
        let above = placement.rect.y1 - layout.bounds.y1;
        let below = layout.bounds.y0 - placement.rect.y0;
        assert!((above - below).abs() < 0.001);
    }

    #[test]
    fn test_layout_alignment_and_offsets() {
        let mut placement = Placement::new(Rectangle::new(100.0, 100.0, 300.0, 150.0));
        placement.alignment = Alignment::Right;
        placement.offset_x = -5.0;
        let layout = layout_text(&metrics(4.0), FontSize::Fixed(20.0), &placement);
        assert!((layout.x - 215.0).abs() < 0.001);

        placement.alignment = Alignment::Left;
        placement.offset_x = 0.0;
        let layout = layout_text(&metrics(4.0), FontSize::Fixed(20.0), &placement);
        assert_eq!(layout.x, 100.0);
    }

    #[test]
    fn test_auto_layout_stays_inside_rectangle() {
        let placement = Placement::new(Rectangle::new(50.0, 300.0, 550.0, 360.0));
        for advance in [0.5, 3.0, 7.5, 12.0, 25.0] {
            let layout = layout_text(&metrics(advance), FontSize::default(), &placement);
            assert!(layout.fits, "advance {} should fit", advance);
            assert!(placement.rect.contains(&layout.bounds));
        }
    }

    #[test]
    fn test_offsets_are_clamped() {
        let mut placement = Placement::new(Rectangle::new(0.0, 0.0, 100.0, 10.0));
        placement.set_offsets(500.0, -500.0);
        assert_eq!(placement.offset_x, 50.0);
        assert_eq!(placement.offset_y, -10.0);
    }
}
