//! Certificate template loading and inspection

use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId};
use tracing::warn;

use crate::error::{Error, Result};
use crate::layout::Rectangle;

/// US Letter, used when a page carries no usable MediaBox
const FALLBACK_PAGE: Rectangle = Rectangle {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// The background PDF every certificate is drawn on
///
/// Only the first page is used. The parsed document is never modified;
/// each render works on its own clone.
#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    path: PathBuf,
    document: Document,
    page_id: ObjectId,
    page_count: usize,
    page_box: Rectangle,
    rotation: i64,
}

impl CertificateTemplate {
    /// Load a template from disk
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|e| Error::Template {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_bytes(path, &bytes)
    }

    /// Parse a template from memory; `path` is only used in messages
    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        let document = Document::load_mem(bytes).map_err(|e| Error::Template {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let pages = document.get_pages();
        let page_count = pages.len();
        let page_id = match pages.values().next() {
            Some(id) => *id,
            None => return Err(Error::EmptyPdf(path.to_path_buf())),
        };

        if page_count > 1 {
            warn!(
                "Template {} has {} pages; only the first page is used",
                path.display(),
                page_count
            );
        }

        let page_box = page_box(&document, page_id).unwrap_or_else(|| {
            warn!(
                "Template {} has no usable MediaBox; assuming US Letter",
                path.display()
            );
            FALLBACK_PAGE
        });

        let rotation = inherited(&document, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        if rotation % 360 != 0 {
            warn!(
                "Template page is rotated by {} degrees; rectangles are in unrotated page coordinates",
                rotation
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            document,
            page_id,
            page_count,
            page_box,
            rotation,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed template, to be cloned per certificate
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of the page certificates are drawn on
    pub fn page_id(&self) -> ObjectId {
        self.page_id
    }

    /// Number of pages in the template file
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// The page's MediaBox in page coordinates
    pub fn page_box(&self) -> Rectangle {
        self.page_box
    }

    /// Page rotation in degrees (`/Rotate`)
    pub fn rotation(&self) -> i64 {
        self.rotation
    }
}

/// Look up a page attribute, following `Parent` links for inherited values
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_object(id).and_then(|o| o.as_dict()).ok()?;
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(target) => doc.get_object(*target).ok(),
                other => Some(other),
            };
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

fn page_box(doc: &Document, page_id: ObjectId) -> Option<Rectangle> {
    let values = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut coords = [0.0f32; 4];
    for (slot, value) in coords.iter_mut().zip(values) {
        *slot = number(doc, value)?;
    }
    let rect = Rectangle::from_corners((coords[0], coords[1]), (coords[2], coords[3]));
    if rect.width() > 0.0 && rect.height() > 0.0 {
        Some(rect)
    } else {
        None
    }
}

fn number(doc: &Document, obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| number(doc, o)),
        _ => None,
    }
}
