//! PDF Nameplate Library
//!
//! Personalizes PDF templates by writing a person's name (and college ID)
//! onto them. This library provides functionality to:
//! - Locate anchor labels in page content and place text next to them
//! - Right-align text on a fixed baseline of selected pages
//! - Generate the cover page and health report documents
//! - Serve the same generation over a Telegram chat bot
//!
//! # Example
//!
//! ```no_run
//! use pdf_nameplate::{AppConfig, Personalizer};
//!
//! let config = AppConfig::load(None).expect("Failed to load configuration");
//! let personalizer = Personalizer::new(config);
//!
//! let cover = personalizer
//!     .generate_cover_page("Jane Doe", "23/V/KPC-CST/36")
//!     .expect("Failed to generate cover page");
//! println!("{}", cover.path.display());
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod generate;
pub mod layout;
pub mod pdf;

// Re-export commonly used items
pub use config::AppConfig;
pub use error::{Error, Result};
pub use generate::{Generated, Personalizer};
