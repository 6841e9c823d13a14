//! PDF manipulation module
//!
//! [`OverlayDocument`] is the small set of capabilities generation needs from
//! a PDF library; [`LopdfDocument`] provides them on top of lopdf.

pub mod document;
pub mod font;
pub mod inspect;
pub mod page;
mod text;

#[cfg(test)]
pub(crate) mod fixtures;

use std::path::Path;

use crate::config::Rgb;
use crate::error::Result;
use crate::layout::{Alignment, PageSize, Point, Rect};

// Re-export commonly used items
pub use document::LopdfDocument;
pub use inspect::{inspect, PdfMetadata};

/// How overlay text is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Rgb,
    pub alignment: Alignment,
}

impl TextStyle {
    pub fn new(font_size: f32, color: Rgb) -> Self {
        Self {
            font_size,
            color,
            alignment: Alignment::Left,
        }
    }

    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }
}

/// Operations the generators perform on an open template.
///
/// Pages are addressed by zero-based index; all geometry is in page space.
pub trait OverlayDocument {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Result<PageSize>;

    /// Bounding boxes of every occurrence of `literal` on the page
    fn search_for(&self, page: usize, literal: &str) -> Result<Vec<Rect>>;

    /// Draw one line of text with its baseline starting at `at`
    fn insert_text(&mut self, page: usize, at: Point, text: &str, style: &TextStyle) -> Result<()>;

    /// Draw wrapped text inside `rect`; returns the number of lines drawn
    fn insert_textbox(&mut self, page: usize, rect: Rect, text: &str, style: &TextStyle) -> Result<usize>;

    fn save(&mut self, path: &Path) -> Result<()>;
}
