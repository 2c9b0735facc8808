//! Drawing a participant name onto a copy of the template page
//!
//! The name is written directly into the page with lopdf: the font is added
//! to the page resources and a content stream is appended after the
//! template's own content. The template content is wrapped in `q`/`Q` so any
//! transformation it leaves behind cannot move the name.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::error::Result;
use crate::fonts::LoadedFont;
use crate::layout::{layout_text, FontSize, Placement, TextLayout};
use crate::pdf::font::{add_font, show_text};
use crate::pdf::template::{inherited, CertificateTemplate};

/// Resource name the name font is registered under (a suffix is added if taken)
const FONT_RESOURCE: &str = "CertName";

/// A finished certificate
#[derive(Debug, Clone)]
pub struct RenderedCertificate {
    /// Complete single-page PDF file
    pub bytes: Vec<u8>,
    /// Where the name ended up on the page
    pub layout: TextLayout,
}

/// Measure `name` and work out where it goes, without producing a PDF
pub fn layout_name(
    name: &str,
    font: &LoadedFont,
    size: FontSize,
    placement: &Placement,
) -> Result<TextLayout> {
    let shaped = font.shape(name)?;
    Ok(layout_text(&font.metrics(&shaped), size, placement))
}

/// Render one certificate
///
/// The output holds only the template's first page with `name` drawn inside
/// `placement.rect`. Identical inputs produce identical bytes.
pub fn render_certificate(
    template: &CertificateTemplate,
    name: &str,
    font: &LoadedFont,
    size: FontSize,
    placement: &Placement,
) -> Result<RenderedCertificate> {
    let shaped = font.shape(name)?;
    if shaped.has_missing_glyphs() {
        warn!("Font {} has no glyphs for some characters in '{}'", font.label(), name);
    }

    let layout = layout_text(&font.metrics(&shaped), size, placement);
    if !layout.fits {
        warn!(
            "'{}' does not fit the rectangle at {}pt and will overflow it",
            name, layout.font_size
        );
    }

    let mut doc = template.document().clone();
    let page_id = template.page_id();
    keep_first_page(&mut doc);

    let font_id = add_font(&mut doc, font, &shaped)?;
    let resource_name = add_font_to_page_resources(&mut doc, page_id, font_id)?;

    let save_state = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    insert_content(&mut doc, page_id, save_state, Layer::Below)?;

    let color = placement.color;
    let overlay = Content {
        operations: vec![
            // Restore the state saved before the template content
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("rg", vec![real(color.r), real(color.g), real(color.b)]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(resource_name), real(layout.font_size)]),
            Operation::new(
                "Tm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    real(layout.x),
                    real(layout.baseline),
                ],
            ),
            show_text(font, &shaped),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay.encode()?));
    insert_content(&mut doc, page_id, overlay_id, Layer::Above)?;

    debug!(
        "Rendered '{}' at ({:.1}, {:.1}) size {}pt",
        name, layout.x, layout.baseline, layout.font_size
    );

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    Ok(RenderedCertificate { bytes, layout })
}

/// Round to three decimals so content streams stay short and stable
fn real(value: f32) -> Object {
    Object::Real((value * 1000.0).round() / 1000.0)
}

/// Drop every page after the first
fn keep_first_page(doc: &mut Document) {
    let extra: Vec<u32> = doc.get_pages().keys().copied().filter(|n| *n != 1).collect();
    if !extra.is_empty() {
        doc.delete_pages(&extra);
        doc.prune_objects();
    }
}

/// Register `font_id` in the page's font resources and return its name
///
/// Resources inherited from the page tree are copied onto the page so the
/// change stays local to it.
fn add_font_to_page_resources(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<Vec<u8>> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };

    let name = unused_resource_name(&fonts, FONT_RESOURCE);
    fonts.set(name.clone(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc.get_dictionary_mut(page_id)?;
    page.set("Resources", Object::Dictionary(resources));

    Ok(name)
}

fn unused_resource_name(existing: &Dictionary, base: &str) -> Vec<u8> {
    if !existing.has(base.as_bytes()) {
        return base.as_bytes().to_vec();
    }
    (1..)
        .map(|n| format!("{}{}", base, n).into_bytes())
        .find(|candidate| !existing.has(candidate))
        .unwrap_or_else(|| base.as_bytes().to_vec())
}

/// Where a new content stream goes relative to the page's own content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Below,
    Above,
}

/// Add a content stream to a page
///
/// `Contents` may be a stream, an array of streams, or a reference to such
/// an array; the result is always a flat array of stream references.
fn insert_content(doc: &mut Document, page_id: ObjectId, content_id: ObjectId, layer: Layer) -> Result<()> {
    let mut streams = match doc.get_dictionary(page_id)?.get(b"Contents").ok() {
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Some(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    match layer {
        Layer::Below => streams.insert(0, Object::Reference(content_id)),
        Layer::Above => streams.push(Object::Reference(content_id)),
    }

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(streams));
    Ok(())
}
