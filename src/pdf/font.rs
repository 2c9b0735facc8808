//! Font objects and text-showing operators for certificate pages
//!
//! Embedded fonts are written as Type0 fonts with Identity-H encoding so any
//! glyph in the font can be drawn; only the glyphs used on the page get a
//! width entry and a ToUnicode mapping. The built-in fallback is the standard
//! Times-Roman font with WinAnsiEncoding.

use std::collections::BTreeMap;

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::Result;
use crate::fonts::{EmbeddedFont, LoadedFont, ShapedText, BUILTIN_FONT};

/// Add the font needed to draw `shaped` to the document
pub fn add_font(doc: &mut Document, font: &LoadedFont, shaped: &ShapedText) -> Result<ObjectId> {
    match font.embedded() {
        None => Ok(add_standard_font(doc)),
        Some(embedded) => add_embedded_font(doc, embedded, shaped),
    }
}

/// Build the `Tj`/`TJ` operation that draws `shaped` with `font`
pub fn show_text(font: &LoadedFont, shaped: &ShapedText) -> Operation {
    match font.embedded() {
        None => {
            let bytes: Vec<u8> = shaped.glyphs.iter().map(|g| g.id as u8).collect();
            Operation::new("Tj", vec![Object::String(bytes, StringFormat::Literal)])
        }
        Some(_) => {
            let mut parts = Vec::with_capacity(shaped.glyphs.len() * 2);
            for glyph in &shaped.glyphs {
                parts.push(Object::String(
                    glyph.id.to_be_bytes().to_vec(),
                    StringFormat::Hexadecimal,
                ));
                // Kerning: positive values move the next glyph left
                let adjust = glyph.width - glyph.advance;
                if adjust != 0 {
                    parts.push(Object::Integer(adjust as i64));
                }
            }
            Operation::new("TJ", vec![Object::Array(parts)])
        }
    }
}

/// Standard Type1 font (one of the 14 fonts every PDF reader provides)
fn add_standard_font(doc: &mut Document) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(BUILTIN_FONT.as_bytes().to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    doc.add_object(Object::Dictionary(font))
}

fn add_embedded_font(doc: &mut Document, font: &EmbeddedFont, shaped: &ShapedText) -> Result<ObjectId> {
    let base_font = Object::Name(font.postscript_name.as_bytes().to_vec());

    // Font program
    let mut file_dict = Dictionary::new();
    if font.is_cff {
        file_dict.set("Subtype", Object::Name(b"OpenType".to_vec()));
    } else {
        file_dict.set("Length1", Object::Integer(font.data.len() as i64));
    }
    let font_file_id = doc.add_object(Stream::new(file_dict, font.data.clone()));

    let scale = |units: i16| Object::Integer(font.to_milli(units as i32) as i64);

    let mut descriptor = Dictionary::new();
    descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    descriptor.set("FontName", base_font.clone());
    descriptor.set("Flags", Object::Integer(32)); // Nonsymbolic
    descriptor.set(
        "FontBBox",
        Object::Array(font.bbox.iter().map(|v| scale(*v)).collect()),
    );
    descriptor.set("ItalicAngle", Object::Integer(0));
    descriptor.set("Ascent", scale(font.ascender));
    descriptor.set("Descent", scale(font.descender));
    descriptor.set("CapHeight", scale(font.cap_height));
    descriptor.set("StemV", Object::Integer(80));
    descriptor.set(
        if font.is_cff { "FontFile3" } else { "FontFile2" },
        Object::Reference(font_file_id),
    );
    let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

    // Glyphs used on this page: widths and source text
    let mut used: BTreeMap<u16, (i32, String)> = BTreeMap::new();
    for glyph in &shaped.glyphs {
        used.entry(glyph.id)
            .or_insert_with(|| (glyph.width, glyph.text.clone()));
    }

    let mut widths = Vec::with_capacity(used.len() * 2);
    for (gid, (width, _)) in &used {
        widths.push(Object::Integer(*gid as i64));
        widths.push(Object::Array(vec![Object::Integer(*width as i64)]));
    }

    let mut system_info = Dictionary::new();
    system_info.set("Registry", Object::string_literal("Adobe"));
    system_info.set("Ordering", Object::string_literal("Identity"));
    system_info.set("Supplement", Object::Integer(0));

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", Object::Name(b"Font".to_vec()));
    cid_font.set(
        "Subtype",
        Object::Name(if font.is_cff { b"CIDFontType0".to_vec() } else { b"CIDFontType2".to_vec() }),
    );
    cid_font.set("BaseFont", base_font.clone());
    cid_font.set("CIDSystemInfo", Object::Dictionary(system_info));
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    cid_font.set("W", Object::Array(widths));
    if !font.is_cff {
        cid_font.set("CIDToGIDMap", Object::Name(b"Identity".to_vec()));
    }
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let glyph_text: BTreeMap<u16, &str> = used
        .iter()
        .map(|(gid, (_, text))| (*gid, text.as_str()))
        .collect();
    let to_unicode_id = doc.add_object(Stream::new(
        Dictionary::new(),
        to_unicode_cmap(&glyph_text).into_bytes(),
    ));

    let mut type0 = Dictionary::new();
    type0.set("Type", Object::Name(b"Font".to_vec()));
    type0.set("Subtype", Object::Name(b"Type0".to_vec()));
    type0.set("BaseFont", base_font);
    type0.set("Encoding", Object::Name(b"Identity-H".to_vec()));
    type0.set("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)]));
    type0.set("ToUnicode", Object::Reference(to_unicode_id));

    Ok(doc.add_object(Object::Dictionary(type0)))
}

/// ToUnicode CMap mapping glyph ids back to the text they draw
fn to_unicode_cmap(glyphs: &BTreeMap<u16, &str>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    let entries: Vec<(u16, &str)> = glyphs
        .iter()
        .filter(|(_, text)| !text.is_empty())
        .map(|(gid, text)| (*gid, *text))
        .collect();

    // At most 100 entries per bfchar block
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, text) in chunk {
            let unicode: String = text
                .encode_utf16()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", gid, unicode));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}
