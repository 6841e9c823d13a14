//! Text placement calculations
//!
//! All coordinates here are in page space: points, origin at the top-left
//! corner of the page, y growing downward. The `pdf` module converts to PDF
//! user space when it writes content streams.

use serde::{Deserialize, Serialize};

/// Average glyph advance as a fraction of the font size.
///
/// A rough heuristic, not measured from glyph metrics.
pub const AVERAGE_CHAR_WIDTH_FACTOR: f32 = 0.6;

/// A point in page space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in page space; (x, y) is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self { width: 612.0, height: 792.0 }
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self { width: 595.0, height: 842.0 }
    }
}

/// Horizontal alignment of text inside its box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Constants that pull an anchored field into the printable region.
///
/// Tuned per template: the cover page uses a bottom margin of 88.5 where
/// other layouts use 88.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorOffsets {
    /// Gap between the end of the anchor label and the inserted text
    pub horizontal_offset: f32,
    /// Subtracted from the anchor's bottom edge to find the baseline
    pub vertical_adjust: f32,
    /// Smallest allowed baseline
    pub min_y: f32,
    /// Distance from the right page edge the text may not start beyond
    pub right_margin: f32,
    /// Distance from the bottom page edge the baseline may not pass
    pub bottom_margin: f32,
}

impl Default for AnchorOffsets {
    fn default() -> Self {
        Self {
            horizontal_offset: 10.0,
            vertical_adjust: 5.0,
            min_y: 20.0,
            right_margin: 239.0,
            bottom_margin: 88.5,
        }
    }
}

/// Where a field is anchored on the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// A fixed baseline, with the text right-aligned against a gap from the right edge
    Fixed { right_gap: f32, y: f32 },
    /// The bounding box of a label located on the page
    Detected(Rect),
}

/// Everything needed to place one field on one page
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequest {
    pub page: PageSize,
    pub anchor: Anchor,
    pub text: String,
    pub font_size: f32,
    pub alignment: Alignment,
}

/// Where a field ends up
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementResult {
    /// Baseline start of a single line
    Point(Point),
    /// Box for multi-line, aligned text
    Box(Rect),
}

impl PlacementRequest {
    /// Baseline start for single-line text.
    ///
    /// `offsets` only applies to detected anchors.
    pub fn position(&self, offsets: &AnchorOffsets) -> Point {
        match self.anchor {
            Anchor::Fixed { right_gap, y } => compute_fixed_overlay_position(
                self.page.width,
                &self.text,
                self.font_size,
                right_gap,
                y,
            ),
            Anchor::Detected(rect) => compute_anchored_position(rect, self.page, offsets),
        }
    }
}

/// Estimate the rendered width of `text` without font metrics.
///
/// `chars * 0.6 * font_size`. Zero for the empty string.
pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * AVERAGE_CHAR_WIDTH_FACTOR * font_size
}

/// Right-align `text` against `right_gap` on a fixed baseline.
///
/// No clamping: a string wider than `page_width - right_gap` yields a
/// negative x and is drawn partly off the page.
pub fn compute_fixed_overlay_position(
    page_width: f32,
    text: &str,
    font_size: f32,
    right_gap: f32,
    fixed_y: f32,
) -> Point {
    let x = page_width - right_gap - estimate_text_width(text, font_size);
    Point::new(x, fixed_y)
}

/// Place text just after a detected anchor, clamped into the printable region.
pub fn compute_anchored_position(anchor: Rect, page: PageSize, offsets: &AnchorOffsets) -> Point {
    let x = (anchor.x + anchor.width + offsets.horizontal_offset)
        .min(page.width - offsets.right_margin);
    let y = (anchor.y + anchor.height - offsets.vertical_adjust)
        .max(offsets.min_y)
        .min(page.height - offsets.bottom_margin);
    Point::new(x, y)
}

/// Box for a second field directly below the first.
pub fn compute_secondary_field_box(
    primary: Point,
    box_width: f32,
    box_height: f32,
    vertical_gap: f32,
) -> Rect {
    Rect::new(primary.x, primary.y + vertical_gap, box_width, box_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.001
    }

    #[test]
    fn test_estimate_text_width_empty() {
        assert_eq!(estimate_text_width("", 14.0), 0.0);
    }

    #[test]
    fn test_estimate_text_width_monotonic() {
        let mut previous = 0.0;
        for len in 0..40 {
            let text = "W".repeat(len);
            let width = estimate_text_width(&text, 12.0);
            assert!(width >= previous);
            previous = width;
        }

        let mut previous = 0.0;
        for size in 1..60 {
            let width = estimate_text_width("JOHN DOE", size as f32);
            assert!(width >= previous);
            previous = width;
        }
    }

    #[test]
    fn test_estimate_text_width_counts_chars_not_bytes() {
        assert!(approx(estimate_text_width("ÉLODIE", 10.0), 36.0));
    }

    #[test]
    fn test_fixed_overlay_regression() {
        let p = compute_fixed_overlay_position(200.0, "JOHN DOE", 14.0, 100.0, 700.0);
        assert!(approx(p.x, 32.8));
        assert_eq!(p.y, 700.0);
    }

    #[test]
    fn test_fixed_overlay_goes_negative_for_long_names() {
        let p = compute_fixed_overlay_position(200.0, "A VERY LONG NAME INDEED", 14.0, 100.0, 700.0);
        assert!(p.x < 0.0);
    }

    #[test]
    fn test_anchored_position_example() {
        let offsets = AnchorOffsets {
            bottom_margin: 88.0,
            ..AnchorOffsets::default()
        };
        let anchor = Rect::new(50.0, 780.0, 40.0, 12.0);
        let p = compute_anchored_position(anchor, PageSize::a4(), &offsets);
        assert!(approx(p.x, 100.0));
        assert!(approx(p.y, 754.0));
    }

    #[test]
    fn test_anchored_position_min_y() {
        let anchor = Rect::new(10.0, 0.0, 20.0, 10.0);
        let p = compute_anchored_position(anchor, PageSize::a4(), &AnchorOffsets::default());
        assert!(approx(p.x, 40.0));
        assert!(approx(p.y, 20.0));
    }

    #[test]
    fn test_anchored_position_stays_in_printable_region() {
        let page = PageSize::a4();
        let offsets = AnchorOffsets::default();
        for ix in 0..12 {
            for iy in 0..12 {
                let anchor = Rect::new(ix as f32 * 45.0, iy as f32 * 65.0, 120.0, 14.0);
                let p = compute_anchored_position(anchor, page, &offsets);
                assert!(p.x <= page.width - offsets.right_margin);
                assert!(p.y <= page.height - offsets.bottom_margin);
            }
        }
    }

    #[test]
    fn test_secondary_field_box() {
        let rect = compute_secondary_field_box(Point::new(100.0, 754.0), 234.5, 60.0, 5.0);
        assert_eq!(rect, Rect::new(100.0, 759.0, 234.5, 60.0));
        assert!(approx(rect.right(), 334.5));
        assert!(approx(rect.bottom(), 819.0));
    }

    #[test]
    fn test_request_position() {
        let request = PlacementRequest {
            page: PageSize { width: 200.0, height: 842.0 },
            anchor: Anchor::Fixed { right_gap: 100.0, y: 700.0 },
            text: "JOHN DOE".to_string(),
            font_size: 14.0,
            alignment: Alignment::Right,
        };
        let p = request.position(&AnchorOffsets::default());
        assert!(approx(p.x, 32.8));
        assert_eq!(p.y, 700.0);
    }
}
