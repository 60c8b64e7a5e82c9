use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::enrich::ProviderKind;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding the snipped question images.
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    /// Path to the canonical metadata JSON file.
    #[serde(default = "default_metadata_file")]
    pub metadata_file: PathBuf,

    /// Path to the SQLite database. Defaults to `~/.qbank/data/qbank.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Which LLM provider backend to use.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name override. Each provider has a sensible default.
    #[serde(default)]
    pub model: Option<String>,

    /// Request timeout for enrichment calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub ocr: OcrConfig,
}

/// OCR engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OcrConfig {
    /// Tesseract language codes, joined with `+` for the engine.
    #[serde(default = "default_ocr_languages")]
    pub languages: Vec<String>,

    /// Rendering DPI hint passed to the engine.
    #[serde(default = "default_ocr_dpi")]
    pub dpi: u32,
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("question_images")
}

fn default_metadata_file() -> PathBuf {
    PathBuf::from("question_metadata.json")
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_ocr_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_ocr_dpi() -> u32 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            images_dir: default_images_dir(),
            metadata_file: default_metadata_file(),
            database_path: None,
            provider: ProviderKind::default(),
            model: None,
            request_timeout_secs: default_request_timeout_secs(),
            ocr: OcrConfig::default(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: default_ocr_languages(),
            dpi: default_ocr_dpi(),
        }
    }
}

impl Config {
    /// Resolves the database path, falling back to the canonical location.
    pub fn resolve_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}
