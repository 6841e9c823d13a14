//! Personalizing the cover page and the report
//!
//! The `stamp_*` functions run the placement engine over any
//! [`OverlayDocument`]; [`Personalizer`] wires them to the configured
//! templates and writes the result.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::{AppConfig, CoverTuning, ReportTuning};
use crate::error::{Error, Result};
use crate::layout::{
    compute_secondary_field_box, Alignment, Anchor, AnchorOffsets, PlacementRequest, PlacementResult,
};
use crate::pdf::{LopdfDocument, OverlayDocument, TextStyle};

/// Longest file stem taken from user input, in bytes
const MAX_STEM_BYTES: usize = 120;
/// How many numbered names to try before giving up on a directory
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Which value a placement carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    CollegeId,
}

/// One field drawn on one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Zero-based page index
    pub page: usize,
    pub field: Field,
    pub result: PlacementResult,
}

/// A generated document and what was drawn into it
#[derive(Debug, Clone)]
pub struct Generated {
    /// Where this request's output was written; never shared with another request
    pub path: PathBuf,
    /// Name to present the document under, e.g. `Cover_for_Jane Doe.pdf`
    pub file_name: String,
    pub placements: Vec<Placement>,
}

/// Draw the name after every anchor label and the college ID box below it.
///
/// Pages without the label are left untouched.
pub fn stamp_cover<D: OverlayDocument>(
    doc: &mut D,
    tuning: &CoverTuning,
    name: &str,
    college_id: &str,
) -> Result<Vec<Placement>> {
    let mut placements = Vec::new();

    for page in 0..doc.page_count() {
        let anchors = doc.search_for(page, &tuning.anchor_label)?;
        if anchors.is_empty() {
            let missing = Error::AnchorNotFound {
                label: tuning.anchor_label.clone(),
                page,
            };
            warn!("{}; page left unchanged", missing);
            continue;
        }

        let size = doc.page_size(page)?;
        for anchor in anchors {
            let request = PlacementRequest {
                page: size,
                anchor: Anchor::Detected(anchor),
                text: name.to_string(),
                font_size: tuning.font_size,
                alignment: Alignment::Left,
            };
            let at = request.position(&tuning.offsets);
            let style = TextStyle::new(tuning.font_size, tuning.color).aligned(request.alignment);

            debug!("Page {}: name at ({:.1}, {:.1})", page, at.x, at.y);
            doc.insert_text(page, at, name, &style)?;
            placements.push(Placement {
                page,
                field: Field::Name,
                result: PlacementResult::Point(at),
            });

            if college_id.is_empty() {
                continue;
            }

            let id_box = compute_secondary_field_box(
                at,
                tuning.id_box_width,
                tuning.id_box_height,
                tuning.id_box_gap,
            );
            let lines = doc.insert_textbox(page, id_box, college_id, &style.aligned(tuning.id_alignment))?;
            if lines == 0 {
                warn!("Page {}: college ID did not fit its {:.1}x{:.1} box", page, id_box.width, id_box.height);
            }
            placements.push(Placement {
                page,
                field: Field::CollegeId,
                result: PlacementResult::Box(id_box),
            });
        }
    }

    Ok(placements)
}

/// Draw the name right-aligned on a fixed baseline of the configured pages.
pub fn stamp_report<D: OverlayDocument>(doc: &mut D, tuning: &ReportTuning, name: &str) -> Result<Vec<Placement>> {
    let mut pages = tuning.pages.clone();
    pages.sort_unstable();
    pages.dedup();

    let page_count = doc.page_count();
    let style = TextStyle::new(tuning.font_size, tuning.color);
    let mut placements = Vec::new();

    for page in pages {
        if page >= page_count {
            warn!("Report template has {} pages; skipping page index {}", page_count, page);
            continue;
        }

        let request = PlacementRequest {
            page: doc.page_size(page)?,
            anchor: Anchor::Fixed {
                right_gap: tuning.right_gap,
                y: tuning.fixed_y,
            },
            text: name.to_string(),
            font_size: tuning.font_size,
            alignment: Alignment::Right,
        };
        let at = request.position(&AnchorOffsets::default());
        if at.x < 0.0 {
            warn!(
                "Page {}: {:?} is wider than the space left of the right gap and starts off the page (x = {:.1})",
                page, name, at.x
            );
        }

        doc.insert_text(page, at, name, &style)?;
        placements.push(Placement {
            page,
            field: Field::Name,
            result: PlacementResult::Point(at),
        });
    }

    Ok(placements)
}

/// Collapse whitespace and capitalize each word ("jANE  doe" → "Jane Doe")
pub fn normalize_name(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Make a user-supplied string safe to use inside a file name.
///
/// Long input is cut on a character boundary to keep file names within
/// filesystem limits.
pub fn file_stem_for(value: &str) -> String {
    let stem: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let mut end = stem.len().min(MAX_STEM_BYTES);
    while !stem.is_char_boundary(end) {
        end -= 1;
    }

    let stem = stem[..end].trim().trim_matches('.').to_string();
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem
    }
}

fn require<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(value)
}

fn output_error(path: &Path, err: std::io::Error) -> Error {
    Error::OutputWrite {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// `name.pdf`, `name (1).pdf`, `name (2).pdf`, ...
fn numbered(file_name: &str, n: usize) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", file_name, n),
    }
}

/// Save to a temp file in `dir`, then move it to the first free numbered name.
///
/// Existing files are never replaced, so concurrent requests for the same
/// name each keep their own document.
fn write_output<D: OverlayDocument>(doc: &mut D, dir: &Path, file_name: &str) -> Result<PathBuf> {
    let target = dir.join(file_name);
    fs::create_dir_all(dir).map_err(|e| output_error(&target, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".nameplate-")
        .suffix(".pdf")
        .tempfile_in(dir)
        .map_err(|e| output_error(&target, e))?;

    doc.save(temp.path())?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(numbered(file_name, attempt));
        match temp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => temp = e.file,
            Err(e) => return Err(output_error(&path, e.error)),
        }
    }

    Err(Error::OutputWrite {
        path: target,
        reason: format!("no free file name after {} attempts", MAX_NAME_ATTEMPTS),
    })
}

/// Generates personalized documents from the configured templates.
///
/// Holds only read-only configuration, so one instance can serve many
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct Personalizer {
    config: AppConfig,
}

impl Personalizer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn open(&self, template: &Path) -> Result<LopdfDocument> {
        LopdfDocument::open(template, self.config.font_path.as_deref())
    }

    /// Cover page with the name and the upper-cased college ID.
    ///
    /// Written to `Cover_for_<name>.pdf` in the cover output directory, or a
    /// numbered variant when that name is taken.
    pub fn generate_cover_page(&self, name: &str, college_id: &str) -> Result<Generated> {
        let name = require("name", name)?;
        let college_id = college_id.trim().to_uppercase();
        let template = self.config.cover_template();

        info!("Generating cover page for {:?} from {}", name, template.display());

        let mut doc = self.open(&template)?;
        let placements = stamp_cover(&mut doc, &self.config.cover, name, &college_id)?;

        let file_name = format!("Cover_for_{}.pdf", file_stem_for(name));
        let path = write_output(&mut doc, &self.config.cover_output_dir(), &file_name)?;

        info!("Cover page written to {} ({} fields)", path.display(), placements.len());
        Ok(Generated {
            path,
            file_name,
            placements,
        })
    }

    /// Report with the upper-cased name on the configured pages.
    pub fn generate_report(&self, name: &str) -> Result<Generated> {
        let name = require("name", name)?.to_uppercase();
        let template = self.config.report_template();

        info!("Generating report for {:?} from {}", name, template.display());

        let mut doc = self.open(&template)?;
        let placements = stamp_report(&mut doc, &self.config.report, &name)?;

        let file_name = self
            .config
            .report
            .output_name
            .replace("{name}", &file_stem_for(&name));
        let path = write_output(&mut doc, &self.config.report_output_dir(), &file_name)?;

        info!("Report written to {} ({} pages stamped)", path.display(), placements.len());
        Ok(Generated {
            path,
            file_name,
            placements,
        })
    }
}
