//! Font embedding and WinAnsi text encoding

use std::fs;
use std::path::Path;

use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use rustybuzz::ttf_parser::{Face, GlyphId};

use crate::error::{Error, Result};
use crate::layout::AVERAGE_CHAR_WIDTH_FACTOR;

/// Resource name our font is registered under on every page we touch
pub(crate) const FONT_RESOURCE: &str = "NameplateF1";

const FIRST_CHAR: u8 = 32;

/// WinAnsiEncoding for 0x80..=0x9F; the rest of the upper half matches Latin-1
const WINANSI_HIGH: [Option<char>; 32] = [
    Some('€'), None, Some('‚'), Some('ƒ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('ˆ'), Some('‰'), Some('Š'), Some('‹'), Some('Œ'), None, Some('Ž'), None,
    None, Some('‘'), Some('’'), Some('“'), Some('”'), Some('•'), Some('–'), Some('—'),
    Some('˜'), Some('™'), Some('š'), Some('›'), Some('œ'), None, Some('ž'), Some('Ÿ'),
];

/// Character for a WinAnsi code, None for unassigned codes
pub(crate) fn winansi_char(code: u8) -> Option<char> {
    match code {
        0x80..=0x9F => WINANSI_HIGH[(code - 0x80) as usize],
        _ => Some(code as char),
    }
}

/// Encode text as WinAnsi bytes; unmappable characters become `?`
pub fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            _ => WINANSI_HIGH
                .iter()
                .position(|&w| w == Some(c))
                .map(|i| 0x80 + i as u8)
                .unwrap_or(b'?'),
        })
        .collect()
}

/// Escape bytes for a PDF literal string; non-ASCII bytes use octal escapes
pub(crate) fn escape_pdf_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

/// Horizontal and vertical metrics in 1/1000 em, for WinAnsi codes 32..=255
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    widths: Vec<f32>,
    ascent: f32,
    descent: f32,
}

impl FontMetrics {
    /// Helvetica has no widths we can read, so every glyph gets the average advance
    pub fn helvetica() -> Self {
        Self {
            widths: vec![AVERAGE_CHAR_WIDTH_FACTOR * 1000.0; 256 - FIRST_CHAR as usize],
            ascent: 718.0,
            descent: -207.0,
        }
    }

    fn from_face(face: &Face) -> Self {
        let scale = 1000.0 / face.units_per_em() as f32;
        let missing = face
            .glyph_hor_advance(GlyphId(0))
            .map(|adv| adv as f32 * scale)
            .unwrap_or(0.0);

        let widths = (FIRST_CHAR..=255)
            .map(|code| {
                winansi_char(code)
                    .and_then(|c| face.glyph_index(c))
                    .and_then(|g| face.glyph_hor_advance(g))
                    .map(|adv| adv as f32 * scale)
                    .unwrap_or(missing)
            })
            .collect();

        Self {
            widths,
            ascent: face.ascender() as f32 * scale,
            descent: face.descender() as f32 * scale,
        }
    }

    /// Width of already-encoded bytes at `font_size`
    pub fn encoded_width(&self, bytes: &[u8], font_size: f32) -> f32 {
        bytes
            .iter()
            .map(|&b| {
                b.checked_sub(FIRST_CHAR)
                    .and_then(|i| self.widths.get(i as usize))
                    .copied()
                    .unwrap_or(0.0)
            })
            .sum::<f32>()
            * font_size
            / 1000.0
    }

    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        self.encoded_width(&encode_winansi(text), font_size)
    }

    /// Distance from the top of a line box to its baseline
    pub fn ascent(&self, font_size: f32) -> f32 {
        self.ascent * font_size / 1000.0
    }

    /// Depth below the baseline (positive)
    pub fn descent(&self, font_size: f32) -> f32 {
        -self.descent * font_size / 1000.0
    }
}

/// A font object added to a document, with the metrics used to lay text out in it
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    pub id: ObjectId,
    pub metrics: FontMetrics,
}

/// Reference Helvetica (one of the 14 standard PDF fonts, nothing embedded)
pub fn use_helvetica_font(doc: &mut Document) -> EmbeddedFont {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));

    EmbeddedFont {
        id: doc.add_object(Object::Dictionary(font)),
        metrics: FontMetrics::helvetica(),
    }
}

/// PostScript-safe base font name derived from the file name
fn base_font_name(path: &Path) -> String {
    let name: String = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    if name.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        name
    }
}

/// Embed a TrueType font file with WinAnsiEncoding
///
/// The font program goes in as FontFile2; widths and the descriptor's
/// metrics are read from the font itself.
pub fn embed_truetype(doc: &mut Document, path: &Path) -> Result<EmbeddedFont> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let data = fs::read(path)?;
    let face = Face::parse(&data, 0)
        .map_err(|e| Error::Font(format!("{}: {}", path.display(), e)))?;

    let metrics = FontMetrics::from_face(&face);
    let scale = 1000.0 / face.units_per_em() as f32;
    let bbox = face.global_bounding_box();
    let cap_height = face.capital_height().unwrap_or(face.ascender());
    let font_name = base_font_name(path);

    debug!("Embedding {} ({} bytes) as {}", path.display(), data.len(), font_name);

    // Create font stream object (the actual TTF data)
    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", Object::Integer(data.len() as i64));

    let font_stream = Stream {
        dict: font_stream_dict,
        content: data.clone(),
        allows_compression: true,
        start_position: None,
    };
    let font_stream_id = doc.add_object(Object::Stream(font_stream));

    let scaled = |v: i16| Object::Integer((v as f32 * scale).round() as i64);

    let mut font_descriptor = Dictionary::new();
    font_descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    font_descriptor.set("FontName", Object::Name(font_name.as_bytes().to_vec()));
    font_descriptor.set("Flags", Object::Integer(32)); // Nonsymbolic
    font_descriptor.set("FontBBox", Object::Array(vec![
        scaled(bbox.x_min),
        scaled(bbox.y_min),
        scaled(bbox.x_max),
        scaled(bbox.y_max),
    ]));
    font_descriptor.set("ItalicAngle", Object::Integer(0));
    font_descriptor.set("Ascent", scaled(face.ascender()));
    font_descriptor.set("Descent", scaled(face.descender()));
    font_descriptor.set("CapHeight", scaled(cap_height));
    font_descriptor.set("StemV", Object::Integer(80));
    font_descriptor.set("FontFile2", Object::Reference(font_stream_id));

    let font_descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"TrueType".to_vec()));
    font.set("BaseFont", Object::Name(font_name.into_bytes()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font.set("FontDescriptor", Object::Reference(font_descriptor_id));
    font.set("FirstChar", Object::Integer(FIRST_CHAR as i64));
    font.set("LastChar", Object::Integer(255));
    font.set("Widths", Object::Array(
        metrics.widths.iter().map(|w| Object::Integer(w.round() as i64)).collect(),
    ));

    Ok(EmbeddedFont {
        id: doc.add_object(Object::Dictionary(font)),
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_winansi() {
        assert_eq!(encode_winansi("AB c"), b"AB c".to_vec());
        assert_eq!(encode_winansi("é"), vec![0xE9]);
        assert_eq!(encode_winansi("€"), vec![0x80]);
        assert_eq!(encode_winansi("—"), vec![0x97]);
        assert_eq!(encode_winansi("日本"), b"??".to_vec());
    }

    #[test]
    fn test_winansi_round_trip_of_specials() {
        for code in 0x80u8..=0x9F {
            if let Some(c) = winansi_char(code) {
                assert_eq!(encode_winansi(&c.to_string()), vec![code]);
            }
        }
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(escape_pdf_string(b"(a\\b)"), "\\(a\\\\b\\)");
        assert_eq!(escape_pdf_string(&[0xE9]), "\\351");
    }

    #[test]
    fn test_helvetica_metrics_match_estimate() {
        let metrics = FontMetrics::helvetica();
        let width = metrics.text_width("JOHN DOE", 14.0);
        assert!((width - 67.2).abs() < 0.001);
        assert!((metrics.ascent(10.0) - 7.18).abs() < 0.001);
        assert!((metrics.descent(10.0) - 2.07).abs() < 0.001);
    }

    #[test]
    fn test_base_font_name() {
        assert_eq!(base_font_name(Path::new("assets/font/LexendDeca-Regular.ttf")), "LexendDeca-Regular");
        assert_eq!(base_font_name(Path::new("my font (1).ttf")), "myfont1");
        assert_eq!(base_font_name(Path::new("")), "EmbeddedFont");
    }

    #[test]
    fn test_embed_missing_font() {
        let mut doc = Document::with_version("1.5");
        let result = embed_truetype(&mut doc, Path::new("no-such-font.ttf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_embed_rejects_non_font() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bogus.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();

        let mut doc = Document::with_version("1.5");
        let result = embed_truetype(&mut doc, &path);
        assert!(matches!(result, Err(Error::Font(_))));
    }
}
