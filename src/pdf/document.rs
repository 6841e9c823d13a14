//! [`OverlayDocument`] on top of lopdf
//!
//! Overlays are appended as extra content streams after the page's own
//! content, which is wrapped in q/Q first. The font is added to the document
//! on the first draw and shared by every page.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::layout::{Alignment, PageSize, Point, Rect};
use crate::pdf::font::{embed_truetype, encode_winansi, escape_pdf_string, use_helvetica_font, EmbeddedFont, FontMetrics, FONT_RESOURCE};
use crate::pdf::page::{add_font_resource, append_content, isolate_contents, page_geometry};
use crate::pdf::text::find_text;
use crate::pdf::{OverlayDocument, TextStyle};

/// Line spacing of text boxes, as a multiple of the font size
const LINE_HEIGHT: f32 = 1.2;

const PRODUCER: &str = concat!("pdf-nameplate ", env!("CARGO_PKG_VERSION"));

/// A template opened for overlaying
pub struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    font_path: Option<PathBuf>,
    font: Option<EmbeddedFont>,
    isolated: HashSet<ObjectId>,
}

impl LopdfDocument {
    /// Load a template; `font_path` is embedded on first draw, Helvetica when None
    pub fn open(path: &Path, font_path: Option<&Path>) -> Result<Self> {
        if !path.exists() {
            return Err(Error::TemplateNotFound(path.to_path_buf()));
        }

        let mut doc = Document::load(path)?;

        // Decompress for easier content stream parsing
        doc.decompress();

        debug!("Opened {} ({} pages)", path.display(), doc.get_pages().len());

        Ok(Self::from_document(doc, font_path))
    }

    pub fn from_document(doc: Document, font_path: Option<&Path>) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self {
            doc,
            pages,
            font_path: font_path.map(Path::to_path_buf),
            font: None,
            isolated: HashSet::new(),
        }
    }

    /// The underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.doc
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.pages.get(page).copied().ok_or_else(|| {
            Error::General(format!(
                "page index {} out of range (document has {} pages)",
                page,
                self.pages.len()
            ))
        })
    }

    fn ensure_font(&mut self) -> Result<()> {
        if self.font.is_none() {
            let font = match &self.font_path {
                Some(path) => embed_truetype(&mut self.doc, path)?,
                None => use_helvetica_font(&mut self.doc),
            };
            self.font = Some(font);
        }
        Ok(())
    }

    /// Font id and metrics, embedding the font if this is the first draw
    fn font(&mut self) -> Result<(ObjectId, FontMetrics)> {
        self.ensure_font()?;
        match &self.font {
            Some(font) => Ok((font.id, font.metrics.clone())),
            None => Err(Error::Font("font was not initialised".to_string())),
        }
    }

    /// Append one overlay content stream to a page
    fn draw(&mut self, page_id: ObjectId, font_id: ObjectId, content: String) -> Result<()> {
        add_font_resource(&mut self.doc, page_id, FONT_RESOURCE, font_id)?;

        if self.isolated.insert(page_id) {
            isolate_contents(&mut self.doc, page_id)?;
        }

        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        append_content(&mut self.doc, page_id, content_id)
    }

    fn draw_text(&mut self, page: usize, at: Point, text: &str, style: &TextStyle) -> Result<()> {
        let page_id = self.page_id(page)?;
        let geometry = page_geometry(&self.doc, page_id)?;
        let (font_id, _) = self.font()?;

        let (x, y) = geometry.to_user(at);
        let mut content = String::from("q\n");
        content.push_str(&text_object(x, y, &encode_winansi(text), style));
        content.push_str("Q\n");

        self.draw(page_id, font_id, content)
    }

    fn draw_textbox(&mut self, page: usize, rect: Rect, text: &str, style: &TextStyle) -> Result<usize> {
        let page_id = self.page_id(page)?;
        let geometry = page_geometry(&self.doc, page_id)?;
        let (font_id, metrics) = self.font()?;

        let size = style.font_size;
        let lines = wrap_lines(text, rect.width, size, &metrics);
        let mut content = String::from("q\n");
        let mut drawn = 0;

        for (i, line) in lines.iter().enumerate() {
            let baseline = rect.y + metrics.ascent(size) + i as f32 * size * LINE_HEIGHT;
            if baseline + metrics.descent(size) > rect.bottom() {
                warn!(
                    "Text box on page {} holds {} of {} lines; dropping the rest",
                    page,
                    drawn,
                    lines.len()
                );
                break;
            }

            let bytes = encode_winansi(line);
            let line_width = metrics.encoded_width(&bytes, size);
            let x = match style.alignment {
                Alignment::Left => rect.x,
                Alignment::Center => rect.x + (rect.width - line_width) / 2.0,
                Alignment::Right => rect.right() - line_width,
            };

            let (ux, uy) = geometry.to_user(Point::new(x, baseline));
            content.push_str(&text_object(ux, uy, &bytes, style));
            drawn += 1;
        }

        content.push_str("Q\n");

        if drawn > 0 {
            self.draw(page_id, font_id, content)?;
        }

        Ok(drawn)
    }

    /// Record producer and modification date in the Info dictionary
    fn stamp_info(&mut self) -> Result<()> {
        let mod_date = Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();

        let existing = match self.doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };

        let info = match existing {
            Some(id) => self.doc.get_object_mut(id)?.as_dict_mut()?,
            None => {
                let id = self.doc.add_object(Object::Dictionary(Dictionary::new()));
                self.doc.trailer.set("Info", Object::Reference(id));
                self.doc.get_object_mut(id)?.as_dict_mut()?
            }
        };

        info.set("Producer", Object::string_literal(PRODUCER));
        info.set("ModDate", Object::string_literal(mod_date));
        Ok(())
    }
}

impl OverlayDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize> {
        Ok(page_geometry(&self.doc, self.page_id(page)?)?.size())
    }

    fn search_for(&self, page: usize, literal: &str) -> Result<Vec<Rect>> {
        let page_id = self.page_id(page)?;
        let geometry = page_geometry(&self.doc, page_id)?;
        find_text(&self.doc, page_id, &geometry, literal)
    }

    fn insert_text(&mut self, page: usize, at: Point, text: &str, style: &TextStyle) -> Result<()> {
        self.draw_text(page, at, text, style)
            .map_err(|e| Error::render(page, e))
    }

    fn insert_textbox(&mut self, page: usize, rect: Rect, text: &str, style: &TextStyle) -> Result<usize> {
        self.draw_textbox(page, rect, text, style)
            .map_err(|e| Error::render(page, e))
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        self.stamp_info()?;
        self.doc.compress();
        self.doc
            .save(path)
            .map_err(|e| Error::OutputWrite {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// A single-line text object in user space
fn text_object(x: f32, y: f32, bytes: &[u8], style: &TextStyle) -> String {
    let [r, g, b] = style.color;
    let mut content = String::new();
    content.push_str("BT\n");
    content.push_str(&format!("{} {} {} rg\n", r, g, b));
    content.push_str(&format!("/{} {} Tf\n", FONT_RESOURCE, style.font_size));
    content.push_str(&format!("1 0 0 1 {} {} Tm\n", x, y));
    content.push_str(&format!("({}) Tj\n", escape_pdf_string(bytes)));
    content.push_str("ET\n");
    content
}

/// Greedy word wrap; explicit newlines always break. Words wider than the box stay whole.
fn wrap_lines(text: &str, max_width: f32, font_size: f32, metrics: &FontMetrics) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{} {}", current, word);
            if metrics.text_width(&candidate, font_size) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }

    lines
}
