//! Locating literal text on a page
//!
//! Walks the decoded content stream while tracking the graphics transform and
//! the text state, turning every shown byte into a positioned glyph. Glyph
//! advances come from the font's Widths array, or half an em when the font
//! declares none. Only single-byte encodings are decoded.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::Result;
use crate::layout::Rect;
use crate::pdf::font::winansi_char;
use crate::pdf::page::{number, page_fonts, resolve, PageGeometry};

/// Advance used for glyphs without a declared width, in em
const FALLBACK_ADVANCE: f32 = 0.5;
/// Share of the font size above the baseline covered by a match rectangle
const ASCENT_SHARE: f32 = 0.8;

/// Represents a PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TransformMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl TransformMatrix {
    /// Identity matrix (no transformation)
    fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    fn translate(tx: f32, ty: f32) -> Self {
        Self { e: tx, f: ty, ..Self::identity() }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let nums: Vec<f32> = operands.iter().filter_map(number).collect();
        if nums.len() != 6 {
            return None;
        }
        Some(Self {
            a: nums[0],
            b: nums[1],
            c: nums[2],
            d: nums[3],
            e: nums[4],
            f: nums[5],
        })
    }

    /// `self` applied first, then `other`
    fn then(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Length of a unit vertical step after transformation
    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Glyph widths of one font, in em
struct FontWidths {
    first_char: i64,
    widths: Vec<f32>,
}

impl FontWidths {
    fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| resolve(doc, o).ok())
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);

        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(doc, o).ok())
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|w| {
                        resolve(doc, w)
                            .ok()
                            .and_then(number)
                            .map(|v| v / 1000.0)
                            .unwrap_or(FALLBACK_ADVANCE)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { first_char, widths }
    }

    fn advance(&self, code: u8) -> f32 {
        let index = code as i64 - self.first_char;
        if index < 0 {
            return FALLBACK_ADVANCE;
        }
        self.widths
            .get(index as usize)
            .copied()
            .unwrap_or(FALLBACK_ADVANCE)
    }
}

/// A shown glyph in user space
#[derive(Debug, Clone, Copy)]
struct Glyph {
    ch: char,
    x0: f32,
    x1: f32,
    baseline: f32,
    size: f32,
}

/// Content stream interpreter that only cares about where text lands
struct TextScanner<'a> {
    fonts: &'a BTreeMap<Vec<u8>, FontWidths>,
    ctm: TransformMatrix,
    saved: Vec<TransformMatrix>,
    tm: TransformMatrix,
    tlm: TransformMatrix,
    font: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    leading: f32,
    horizontal_scale: f32,
    /// Glyphs grouped into runs that share a baseline
    runs: Vec<Vec<Glyph>>,
}

impl<'a> TextScanner<'a> {
    fn new(fonts: &'a BTreeMap<Vec<u8>, FontWidths>) -> Self {
        Self {
            fonts,
            ctm: TransformMatrix::identity(),
            saved: Vec::new(),
            tm: TransformMatrix::identity(),
            tlm: TransformMatrix::identity(),
            font: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            leading: 0.0,
            horizontal_scale: 1.0,
            runs: Vec::new(),
        }
    }

    fn operand(op: &Operation, i: usize) -> f32 {
        op.operands.get(i).and_then(number).unwrap_or(0.0)
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = TransformMatrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn apply(&mut self, op: &Operation) {
        match op.operator.as_str() {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = TransformMatrix::from_operands(&op.operands) {
                    self.ctm = m.then(&self.ctm);
                }
            }
            "BT" => {
                self.tm = TransformMatrix::identity();
                self.tlm = TransformMatrix::identity();
            }
            "Tf" => {
                if let Some(Ok(name)) = op.operands.first().map(|o| o.as_name()) {
                    self.font = name.to_vec();
                }
                self.font_size = Self::operand(op, 1);
            }
            "Tc" => self.char_spacing = Self::operand(op, 0),
            "Tw" => self.word_spacing = Self::operand(op, 0),
            "TL" => self.leading = Self::operand(op, 0),
            "Tz" => self.horizontal_scale = Self::operand(op, 0) / 100.0,
            "Td" => self.move_line(Self::operand(op, 0), Self::operand(op, 1)),
            "TD" => {
                let ty = Self::operand(op, 1);
                self.leading = -ty;
                self.move_line(Self::operand(op, 0), ty);
            }
            "Tm" => {
                if let Some(m) = TransformMatrix::from_operands(&op.operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.word_spacing = Self::operand(op, 0);
                self.char_spacing = Self::operand(op, 1);
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0 * self.font_size * self.horizontal_scale;
                                    self.tm = TransformMatrix::translate(tx, 0.0).then(&self.tm);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn show(&mut self, bytes: &[u8]) {
        let fonts = self.fonts;
        let widths = fonts.get(&self.font);

        for &code in bytes {
            let w0 = widths.map(|w| w.advance(code)).unwrap_or(FALLBACK_ADVANCE);
            let trm = self.tm.then(&self.ctm);
            let (x0, baseline) = trm.apply(0.0, 0.0);
            let (x1, _) = trm.apply(w0 * self.font_size * self.horizontal_scale, 0.0);
            let size = self.font_size * trm.vertical_scale();

            self.push(Glyph {
                ch: winansi_char(code).unwrap_or('\u{fffd}'),
                x0: x0.min(x1),
                x1: x0.max(x1),
                baseline,
                size,
            });

            let spacing = if code == b' ' { self.word_spacing } else { 0.0 };
            let advance = (w0 * self.font_size + self.char_spacing + spacing) * self.horizontal_scale;
            self.tm = TransformMatrix::translate(advance, 0.0).then(&self.tm);
        }
    }

    fn push(&mut self, glyph: Glyph) {
        let starts_new_run = match self.runs.last().and_then(|run| run.last()) {
            Some(last) => {
                let em = last.size.max(glyph.size);
                let tolerance = (em * 0.5).max(0.5);
                (last.baseline - glyph.baseline).abs() > tolerance
                    || glyph.x0 + tolerance < last.x0
                    || glyph.x0 - last.x1 > em
            }
            None => true,
        };

        if starts_new_run {
            self.runs.push(vec![glyph]);
        } else if let Some(run) = self.runs.last_mut() {
            run.push(glyph);
        }
    }

    /// Non-overlapping occurrences of `needle`, in user space: (x0, x1, baseline, size)
    fn matches(&self, needle: &[char]) -> Vec<(f32, f32, f32, f32)> {
        let mut found = Vec::new();
        if needle.is_empty() {
            return found;
        }

        for run in &self.runs {
            let mut i = 0;
            while i + needle.len() <= run.len() {
                let window = &run[i..i + needle.len()];
                if window.iter().zip(needle).all(|(g, c)| g.ch == *c) {
                    let x0 = window.iter().map(|g| g.x0).fold(f32::INFINITY, f32::min);
                    let x1 = window.iter().map(|g| g.x1).fold(f32::NEG_INFINITY, f32::max);
                    found.push((x0, x1, window[0].baseline, window[0].size));
                    i += needle.len();
                } else {
                    i += 1;
                }
            }
        }

        found
    }
}

/// Page-space rectangles of every occurrence of `literal` on the page
pub(crate) fn find_text(
    doc: &Document,
    page_id: ObjectId,
    geometry: &PageGeometry,
    literal: &str,
) -> Result<Vec<Rect>> {
    let needle: Vec<char> = literal.chars().collect();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let fonts: BTreeMap<Vec<u8>, FontWidths> = page_fonts(doc, page_id)?
        .iter()
        .map(|(name, dict)| (name.clone(), FontWidths::from_dict(doc, dict)))
        .collect();

    let data = doc.get_page_content(page_id)?;
    let content = Content::decode(&data)?;

    let mut scanner = TextScanner::new(&fonts);
    for op in &content.operations {
        scanner.apply(op);
    }

    Ok(scanner
        .matches(&needle)
        .into_iter()
        .map(|(x0, x1, baseline, size)| {
            let origin = geometry.to_page(x0, baseline);
            Rect::new(origin.x, origin.y - ASCENT_SHARE * size, x1 - x0, size)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(ops: Vec<Operation>) -> Vec<(f32, f32, f32, f32)> {
        let fonts = BTreeMap::new();
        let mut scanner = TextScanner::new(&fonts);
        for op in &ops {
            scanner.apply(op);
        }
        scanner.matches(&"Name:".chars().collect::<Vec<_>>())
    }

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    #[test]
    fn test_matrix_composition() {
        let scale = TransformMatrix { a: 2.0, d: 2.0, ..TransformMatrix::identity() };
        let shift = TransformMatrix::translate(10.0, 5.0);
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 7.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn test_tj_match_with_fallback_widths() {
        let found = scan(vec![
            op("BT", vec![]),
            op("Tf", vec!["F1".into(), 10.into()]),
            op("Td", vec![100.into(), 200.into()]),
            op("Tj", vec![Object::string_literal("Name: ________")]),
            op("ET", vec![]),
        ]);
        assert_eq!(found.len(), 1);
        let (x0, x1, baseline, size) = found[0];
        assert_eq!(x0, 100.0);
        assert_eq!(x1, 125.0);
        assert_eq!(baseline, 200.0);
        assert_eq!(size, 10.0);
    }

    #[test]
    fn test_label_split_across_tj_array_and_cm() {
        let found = scan(vec![
            op("q", vec![]),
            op("cm", vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()]),
            op("BT", vec![]),
            op("Tf", vec!["F1".into(), 10.into()]),
            op("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 20.into()]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Na"),
                    Object::Integer(-100),
                    Object::string_literal("me:"),
                ])],
            ),
            op("ET", vec![]),
            op("Q", vec![]),
        ]);
        assert_eq!(found.len(), 1);
        let (x0, _, baseline, size) = found[0];
        assert_eq!(x0, 20.0);
        assert_eq!(baseline, 40.0);
        assert_eq!(size, 20.0);
    }

    #[test]
    fn test_wide_gap_splits_run() {
        let found = scan(vec![
            op("BT", vec![]),
            op("Tf", vec!["F1".into(), 10.into()]),
            op("Td", vec![50.into(), 500.into()]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Na"),
                    Object::Integer(-20000),
                    Object::string_literal("me:"),
                ])],
            ),
            op("ET", vec![]),
        ]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_different_lines_do_not_join() {
        let found = scan(vec![
            op("BT", vec![]),
            op("Tf", vec!["F1".into(), 10.into()]),
            op("Td", vec![50.into(), 500.into()]),
            op("Tj", vec![Object::string_literal("Na")]),
            op("Td", vec![0.into(), Object::Integer(-40)]),
            op("Tj", vec![Object::string_literal("me:")]),
            op("ET", vec![]),
        ]);
        assert!(found.is_empty());
    }
}
