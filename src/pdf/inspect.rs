//! Template inspection: page count, Info metadata and anchor hits per page

use std::path::Path;

use lopdf::{Document, Object};

use crate::error::{Error, Result};
use crate::layout::{PageSize, Rect};
use crate::pdf::{LopdfDocument, OverlayDocument};

/// Count pages by reading the Count field from the Pages dictionary
/// This is more reliable than get_pages() which doesn't handle nested page trees
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog_id = match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => *id,
        _ => return Err(Error::General("Root is not a reference".to_string())),
    };

    let pages_id = match doc.get_object(catalog_id)?.as_dict()?.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        _ => return Err(Error::General("Pages is not a reference".to_string())),
    };

    match doc.get_object(pages_id)?.as_dict()?.get(b"Count") {
        Ok(Object::Integer(n)) => Ok(*n as usize),
        _ => Err(Error::General("Count is not an integer".to_string())),
    }
}

/// Read a text entry from the Info dictionary
fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info_id = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => *id,
        _ => return None,
    };
    let info = doc.get_object(info_id).ok()?.as_dict().ok()?;
    let bytes = info.get(key).ok()?.as_str().ok()?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// What one page looks like to the placement engine
#[derive(Debug, Clone)]
pub struct PageReport {
    /// Zero-based page index
    pub index: usize,
    pub size: PageSize,
    pub anchor_hits: Vec<Rect>,
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    pub pages: Vec<PageReport>,
}

/// Inspect a PDF file, searching every page for `anchor` when given
pub fn inspect(path: &Path, anchor: Option<&str>) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let document = LopdfDocument::open(path, None)?;
    let doc = document.inner();

    // Fall back to the walked page list when the Count field is missing or lies
    let page_count = count_pages_from_catalog(doc).unwrap_or(0).max(document.page_count());
    if page_count == 0 {
        return Err(Error::General(format!("PDF has no pages: {}", path.display())));
    }

    let mut pages = Vec::with_capacity(document.page_count());
    for index in 0..document.page_count() {
        let anchor_hits = match anchor {
            Some(label) => document.search_for(index, label)?,
            None => Vec::new(),
        };
        pages.push(PageReport {
            index,
            size: document.page_size(index)?,
            anchor_hits,
        });
    }

    Ok(PdfMetadata {
        page_count,
        title: info_string(doc, b"Title"),
        author: info_string(doc, b"Author"),
        pages,
    })
}
