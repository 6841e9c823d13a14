//! Page tree helpers: inherited attributes, geometry, resources and content streams

use std::collections::BTreeMap;

use log::warn;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::layout::{PageSize, Point};

/// Guards against Parent cycles in malformed page trees
const MAX_TREE_DEPTH: usize = 32;

/// The visible page area in PDF user space (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageGeometry {
    pub fn letter() -> Self {
        Self { x0: 0.0, y0: 0.0, x1: 612.0, y1: 792.0 }
    }

    pub fn size(&self) -> PageSize {
        PageSize {
            width: self.x1 - self.x0,
            height: self.y1 - self.y0,
        }
    }

    /// Page space (top-left origin) to PDF user space
    pub fn to_user(&self, point: Point) -> (f32, f32) {
        (self.x0 + point.x, self.y1 - point.y)
    }

    /// PDF user space to page space
    pub fn to_page(&self, x: f32, y: f32) -> Point {
        Point::new(x - self.x0, self.y1 - y)
    }
}

/// Numeric value of an Integer or Real object
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Follow a reference to the object it points at
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Look up `key` on the page, walking up through Parent nodes when it is absent
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(current)?.as_dict()?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(resolve(doc, value)?));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return Ok(None),
        }
    }
    Err(Error::General(format!(
        "page tree deeper than {} levels above {:?}",
        MAX_TREE_DEPTH, page_id
    )))
}

/// A page box (MediaBox, CropBox) as declared on the page or inherited
fn page_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Result<Option<PageGeometry>> {
    let Some(declared) = inherited(doc, page_id, key)? else {
        return Ok(None);
    };

    let values: Vec<f32> = declared
        .as_array()?
        .iter()
        .filter_map(|o| resolve(doc, o).ok().and_then(number))
        .collect();

    if values.len() != 4 {
        return Err(Error::General(format!(
            "malformed {} on page {:?}",
            String::from_utf8_lossy(key),
            page_id
        )));
    }

    Ok(Some(PageGeometry {
        x0: values[0].min(values[2]),
        y0: values[1].min(values[3]),
        x1: values[0].max(values[2]),
        y1: values[1].max(values[3]),
    }))
}

/// Visible area of a page: the CropBox clipped to the MediaBox.
///
/// Falls back to the MediaBox, then to US Letter. Rotation is not applied.
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> Result<PageGeometry> {
    let media = page_box(doc, page_id, b"MediaBox")?.unwrap_or_else(PageGeometry::letter);

    let rotate = inherited(doc, page_id, b"Rotate")?.and_then(number).unwrap_or(0.0);
    if rotate % 360.0 != 0.0 {
        warn!(
            "Page {:?} is rotated by {} degrees; text is placed in unrotated page space",
            page_id, rotate
        );
    }

    let crop = match page_box(doc, page_id, b"CropBox") {
        Ok(crop) => crop,
        Err(e) => {
            warn!("Ignoring CropBox: {}", e);
            None
        }
    };

    let Some(crop) = crop else {
        return Ok(media);
    };

    let clipped = PageGeometry {
        x0: crop.x0.max(media.x0),
        y0: crop.y0.max(media.y0),
        x1: crop.x1.min(media.x1),
        y1: crop.y1.min(media.y1),
    };
    if clipped.x1 <= clipped.x0 || clipped.y1 <= clipped.y0 {
        warn!("CropBox of page {:?} lies outside its MediaBox; using the MediaBox", page_id);
        return Ok(media);
    }
    Ok(clipped)
}

/// The page's effective Resources dictionary (inherited and dereferenced), as an owned copy
pub(crate) fn resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    match inherited(doc, page_id, b"Resources")? {
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        _ => Ok(Dictionary::new()),
    }
}

/// Font dictionaries available to a page, keyed by resource name
pub(crate) fn page_fonts(doc: &Document, page_id: ObjectId) -> Result<BTreeMap<Vec<u8>, Dictionary>> {
    let resources = resources(doc, page_id)?;
    let mut fonts = BTreeMap::new();

    if let Ok(font_entry) = resources.get(b"Font") {
        if let Object::Dictionary(font_dict) = resolve(doc, font_entry)? {
            for (name, value) in font_dict.iter() {
                if let Ok(Object::Dictionary(font)) = resolve(doc, value) {
                    fonts.insert(name.clone(), font.clone());
                }
            }
        }
    }

    Ok(fonts)
}

/// Register `font_id` under `name` in the page's own Resources
///
/// Inherited or referenced resources are copied onto the page first so the
/// change stays local to this page.
pub(crate) fn add_font_resource(doc: &mut Document, page_id: ObjectId, name: &str, font_id: ObjectId) -> Result<()> {
    let mut new_resources = resources(doc, page_id)?;

    let mut fonts = match new_resources.get(b"Font") {
        Ok(entry) => match resolve(doc, entry)? {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };

    fonts.set(name, Object::Reference(font_id));
    new_resources.set("Font", Object::Dictionary(fonts));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(new_resources));

    Ok(())
}

/// Current Contents of a page as a list of stream references
fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc.get_object(page_id)?.as_dict()?;

    let refs = match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            // Contents may point at an array object rather than a stream
            Object::Array(arr) => arr.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(arr)) => arr.clone(),
        _ => vec![],
    };

    Ok(refs)
}

/// Add a content stream before the page's existing content
pub(crate) fn prepend_content(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents = content_refs(doc, page_id)?;
    contents.insert(0, Object::Reference(new_content_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));

    Ok(())
}

/// Add a content stream after the page's existing content, so it paints on top
pub(crate) fn append_content(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents = content_refs(doc, page_id)?;
    contents.push(Object::Reference(new_content_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));

    Ok(())
}

/// Wrap the existing content in q/Q
///
/// Templates sometimes leave a `cm` or a fill color in effect at the end of
/// their content; anything appended afterwards starts from the default
/// graphics state.
pub(crate) fn isolate_contents(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    prepend_content(doc, page_id, save_id)?;
    append_content(doc, page_id, restore_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Two pages under one Pages node that carries MediaBox and Resources
    fn two_page_doc() -> (Document, ObjectId, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let first = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let second = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![10.into(), 20.into(), 310.into(), 420.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![first.into(), second.into()],
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );
        (doc, first, second)
    }

    #[test]
    fn test_geometry_inherited_and_local() {
        let (doc, first, second) = two_page_doc();

        let inherited = page_geometry(&doc, first).unwrap();
        assert_eq!(inherited.size(), PageSize::a4());

        let local = page_geometry(&doc, second).unwrap();
        assert_eq!(local.size(), PageSize { width: 300.0, height: 400.0 });
        assert_eq!(local.to_user(Point::new(5.0, 10.0)), (15.0, 410.0));
        assert_eq!(local.to_page(15.0, 410.0), Point::new(5.0, 10.0));
    }

    #[test]
    fn test_geometry_follows_crop_box() {
        let (mut doc, first, second) = two_page_doc();
        {
            let page = doc.get_object_mut(first).unwrap().as_dict_mut().unwrap();
            page.set("CropBox", vec![36.into(), 36.into(), 559.into(), 806.into()]);
            page.set("Rotate", Object::Integer(90));
        }
        {
            // Reaches past the MediaBox on the right and top
            let page = doc.get_object_mut(second).unwrap().as_dict_mut().unwrap();
            page.set("CropBox", vec![0.into(), 0.into(), 1000.into(), 1000.into()]);
        }

        let cropped = page_geometry(&doc, first).unwrap();
        assert_eq!(cropped.size(), PageSize { width: 523.0, height: 770.0 });
        assert_eq!(cropped.to_user(Point::new(0.0, 0.0)), (36.0, 806.0));

        let clipped = page_geometry(&doc, second).unwrap();
        assert_eq!(clipped, PageGeometry { x0: 10.0, y0: 20.0, x1: 310.0, y1: 420.0 });
    }

    #[test]
    fn test_add_font_keeps_inherited_fonts() {
        let (mut doc, first, _) = two_page_doc();
        let extra = doc.add_object(dictionary! { "Type" => "Font" });

        add_font_resource(&mut doc, first, "NameplateF1", extra).unwrap();

        let fonts = page_fonts(&doc, first).unwrap();
        assert!(fonts.contains_key(b"F1".as_slice()));
        assert!(fonts.contains_key(b"NameplateF1".as_slice()));
    }

    #[test]
    fn test_isolate_then_append_order() {
        let (mut doc, first, _) = two_page_doc();
        let overlay = doc.add_object(Stream::new(dictionary! {}, b"0 g".to_vec()));

        isolate_contents(&mut doc, first).unwrap();
        append_content(&mut doc, first, overlay).unwrap();

        let refs = content_refs(&doc, first).unwrap();
        assert_eq!(refs.len(), 4);
        assert_eq!(refs[3], Object::Reference(overlay));

        let content = doc.get_page_content(first).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.starts_with("q"));
    }
}
