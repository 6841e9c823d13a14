//! Process-wide configuration
//!
//! Built-in defaults describe the two shipped templates. A TOML file may
//! override any of them, and a few paths can be overridden from the
//! environment (`.env` is honoured by the binary). The result is read-only
//! once loaded.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::layout::{Alignment, AnchorOffsets};

/// Environment variable overriding [`AppConfig::pdf_dir`]
pub const ENV_PDF_DIR: &str = "PDF_NAMEPLATE_PDF_DIR";
/// Environment variable overriding [`AppConfig::font_path`]
pub const ENV_FONT: &str = "PDF_NAMEPLATE_FONT";
/// Environment variable overriding both output directories
pub const ENV_OUTPUT_DIR: &str = "PDF_NAMEPLATE_OUTPUT_DIR";
/// Bot credential
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

/// RGB fill color, each channel in 0.0..=1.0
pub type Rgb = [f32; 3];

/// Tuning for the cover page: a name after the "Name:" label and an ID box below it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoverTuning {
    /// Template file name inside `pdf_dir`
    pub template: String,
    /// Label searched for on every page
    pub anchor_label: String,
    pub font_size: f32,
    pub color: Rgb,
    pub offsets: AnchorOffsets,
    /// Secondary (college ID) box
    pub id_box_width: f32,
    pub id_box_height: f32,
    pub id_box_gap: f32,
    pub id_alignment: Alignment,
    /// Where `Cover_for_<name>.pdf` is written; defaults to `pdf_dir`
    pub output_dir: Option<PathBuf>,
}

impl Default for CoverTuning {
    fn default() -> Self {
        Self {
            template: "Cover_Page.pdf".to_string(),
            anchor_label: "Name:".to_string(),
            font_size: 18.0,
            color: [1.0, 1.0, 1.0],
            offsets: AnchorOffsets::default(),
            id_box_width: 234.5,
            id_box_height: 60.0,
            id_box_gap: 5.0,
            id_alignment: Alignment::Center,
            output_dir: None,
        }
    }
}

/// Tuning for the report: the name right-aligned on a fixed baseline of selected pages
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportTuning {
    pub template: String,
    /// Zero-based page indices that carry the name
    pub pages: Vec<usize>,
    pub font_size: f32,
    pub color: Rgb,
    pub right_gap: f32,
    /// Baseline, measured from the top of the page
    pub fixed_y: f32,
    /// File name; `{name}` is replaced by the stamped name
    pub output_name: String,
    /// Defaults to `~/Downloads`
    pub output_dir: Option<PathBuf>,
}

impl Default for ReportTuning {
    fn default() -> Self {
        Self {
            template: "HEYGION_HEALTH_REPORT.pdf".to_string(),
            pages: vec![3, 9, 13, 17, 24, 31, 33],
            font_size: 14.0,
            color: [0.0, 0.0, 0.0],
            right_gap: 100.0,
            fixed_y: 700.0,
            output_name: "Health_Report_for_{name}.pdf".to_string(),
            output_dir: None,
        }
    }
}

/// Telegram front end settings (the token itself only comes from the environment)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub api_base: String,
    /// Long-poll timeout passed to getUpdates
    pub poll_timeout_secs: u64,
    /// Pause after a failed poll
    pub retry_delay_secs: u64,
    /// Where bot requests are generated before upload; defaults to a
    /// `pdf-nameplate-bot` folder in the system temp dir
    pub output_dir: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            retry_delay_secs: 5,
            output_dir: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the templates
    pub pdf_dir: PathBuf,
    /// TrueType font embedded into outputs; Helvetica is used when unset
    pub font_path: Option<PathBuf>,
    /// Prefilled answers for the interactive prompt
    pub default_name: String,
    pub default_college_id: String,
    pub cover: CoverTuning,
    pub report: ReportTuning,
    pub bot: BotConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pdf_dir: PathBuf::from("assets/pdf"),
            font_path: Some(PathBuf::from("assets/font/LexendDeca-Regular.ttf")),
            default_name: "Jane Doe".to_string(),
            default_college_id: "00/X/ABC-DEF/00".to_string(),
            cover: CoverTuning::default(),
            report: ReportTuning::default(),
            bot: BotConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file (if any), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::FileNotFound(path.to_path_buf()));
                }
                debug!("Loading configuration from {}", path.display());
                Self::from_toml(&fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var(ENV_PDF_DIR) {
            self.pdf_dir = PathBuf::from(dir);
        }
        if let Ok(font) = env::var(ENV_FONT) {
            // An empty value switches back to the built-in Helvetica
            self.font_path = if font.is_empty() { None } else { Some(PathBuf::from(font)) };
        }
        if let Ok(dir) = env::var(ENV_OUTPUT_DIR) {
            self.cover.output_dir = Some(PathBuf::from(&dir));
            self.report.output_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn cover_template(&self) -> PathBuf {
        self.pdf_dir.join(&self.cover.template)
    }

    pub fn report_template(&self) -> PathBuf {
        self.pdf_dir.join(&self.report.template)
    }

    pub fn cover_output_dir(&self) -> PathBuf {
        self.cover.output_dir.clone().unwrap_or_else(|| self.pdf_dir.clone())
    }

    pub fn report_output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.report.output_dir {
            return dir.clone();
        }
        match env::var_os("HOME").or_else(|| env::var_os("USERPROFILE")) {
            Some(home) => PathBuf::from(home).join("Downloads"),
            None => env::temp_dir(),
        }
    }

    pub fn bot_output_dir(&self) -> PathBuf {
        self.bot
            .output_dir
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("pdf-nameplate-bot"))
    }

    /// The same configuration with every output redirected to the bot's
    /// scratch directory, so chat requests never land in template or user folders.
    pub fn for_bot(&self) -> Self {
        let dir = self.bot_output_dir();
        let mut config = self.clone();
        config.cover.output_dir = Some(dir.clone());
        config.report.output_dir = Some(dir);
        config
    }

    /// Bot token from the environment; its absence is fatal for the bot.
    pub fn bot_token() -> Result<String> {
        match env::var(ENV_BOT_TOKEN) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(Error::MissingToken),
        }
    }
}
