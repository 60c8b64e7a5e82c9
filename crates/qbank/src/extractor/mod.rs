//! Text extraction from scanned question images.
//!
//! Wraps the OCR engine with filename listing, whitespace cleanup and a
//! per-process result cache. Extraction failures never propagate as
//! errors; each image yields an [`ImageRecord`] whose `success` flag and
//! `error` message describe the outcome.

pub mod ocr;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

pub use ocr::OcrEngine;

/// Outcome of running OCR on a single question image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub filename: String,
    pub text: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageRecord {
    fn failure(filename: &str, error: String) -> Self {
        Self {
            filename: filename.to_string(),
            text: String::new(),
            success: false,
            error: Some(error),
        }
    }
}

/// OCR front-end for the question image directory.
pub struct TextExtractor {
    images_dir: PathBuf,
    engine: OcrEngine,
    cache: Mutex<HashMap<String, ImageRecord>>,
}

impl TextExtractor {
    pub fn new<P: AsRef<Path>>(images_dir: P, languages: &[String], dpi: u32) -> Self {
        Self {
            images_dir: images_dir.as_ref().to_path_buf(),
            engine: OcrEngine::new(languages, dpi),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Lists question images in the configured directory.
    ///
    /// Only `question_*.png` files count; anything else in the directory
    /// (thumbnails, exports, stray downloads) is ignored. A missing
    /// directory yields an empty list.
    pub fn list_images(&self) -> Vec<String> {
        if !self.images_dir.exists() {
            log::error!("Image directory not found: {}", self.images_dir.display());
            return Vec::new();
        }

        let mut names: Vec<String> = WalkDir::new(&self.images_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(|s| s.to_string()))
            .filter(|name| is_question_image(name))
            .collect();

        names.sort();
        names
    }

    /// Runs OCR on a single image, consulting the cache unless `force` is set.
    ///
    /// Only successful results are cached; failed extractions are retried
    /// on the next call.
    pub fn extract(&self, filename: &str, force: bool) -> ImageRecord {
        if !force {
            if let Some(cached) = self.cached(filename) {
                return cached;
            }
        }

        let record = self.extract_uncached(filename);
        if record.success {
            // A poisoned cache is treated as absent.
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(filename.to_string(), record.clone());
            }
        }
        record
    }

    /// Runs OCR on a batch of images. An empty `filenames` slice means
    /// "all known images in the directory".
    pub fn extract_batch(&self, filenames: &[String], force: bool) -> Vec<ImageRecord> {
        let targets = if filenames.is_empty() {
            self.list_images()
        } else {
            filenames.to_vec()
        };

        targets
            .iter()
            .map(|filename| {
                log::info!("Processing {}...", filename);
                self.extract(filename, force)
            })
            .collect()
    }

    fn cached(&self, filename: &str) -> Option<ImageRecord> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(filename).cloned())
    }

    fn extract_uncached(&self, filename: &str) -> ImageRecord {
        let image_path = self.images_dir.join(filename);

        if !image_path.exists() {
            let error = format!("Image file not found: {}", image_path.display());
            log::error!("{}", error);
            return ImageRecord::failure(filename, error);
        }

        match self.engine.recognize(&image_path) {
            Ok(raw) => ImageRecord {
                filename: filename.to_string(),
                text: clean_text(&raw),
                success: true,
                error: None,
            },
            Err(e) => {
                let error = format!("OCR processing failed for {}: {}", filename, e);
                log::error!("{}", error);
                ImageRecord::failure(filename, error)
            }
        }
    }
}

/// Collapses OCR output into a single line: each source line is trimmed,
/// blank lines are dropped and the remainder joined with single spaces.
fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_question_image(name: &str) -> bool {
    name.starts_with("question_") && name.to_ascii_lowercase().ends_with(".png")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor_in(dir: &Path) -> TextExtractor {
        TextExtractor::new(dir, &["eng".to_string()], 300)
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        let raw = "What is the unit of force?\n\n  A) Newton  \n\tB) Joule\n\n\nC) Watt\n";
        assert_eq!(
            clean_text(raw),
            "What is the unit of force? A) Newton B) Joule C) Watt"
        );
    }

    #[test]
    fn test_clean_text_empty_input() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("\n\n  \n"), "");
    }

    #[test]
    fn test_is_question_image() {
        assert!(is_question_image("question_001.png"));
        assert!(is_question_image("question_042.PNG"));
        assert!(!is_question_image("answer_001.png"));
        assert!(!is_question_image("question_001.jpg"));
        assert!(!is_question_image("notes.txt"));
    }

    #[test]
    fn test_list_images_missing_directory() {
        let extractor = extractor_in(Path::new("/nonexistent/questions"));
        assert!(extractor.list_images().is_empty());
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["question_002.png", "question_001.png", "readme.md", "scan.png"] {
            std::fs::write(dir.path().join(name), b"stub").unwrap();
        }

        let extractor = extractor_in(dir.path());
        assert_eq!(
            extractor.list_images(),
            vec!["question_001.png", "question_002.png"]
        );
    }

    #[test]
    fn test_extract_missing_file_is_soft_failure() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor_in(dir.path());

        let record = extractor.extract("question_404.png", false);
        assert_eq!(record.filename, "question_404.png");
        assert!(!record.success);
        assert!(record.text.is_empty());
        assert!(record.error.as_deref().unwrap().contains("not found"));
    }

    #[test]
    fn test_extract_undecodable_file_is_soft_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("question_001.png"), b"not a png").unwrap();
        let extractor = extractor_in(dir.path());

        let record = extractor.extract("question_001.png", false);
        assert!(!record.success);
        assert!(record.error.is_some());
    }

    #[test]
    fn test_failures_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor_in(dir.path());

        let first = extractor.extract("question_001.png", false);
        assert!(!first.success);
        assert!(extractor.cached("question_001.png").is_none());
    }

    #[test]
    fn test_extract_batch_empty_list_means_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("question_001.png"), b"bad").unwrap();
        std::fs::write(dir.path().join("question_002.png"), b"bad").unwrap();
        let extractor = extractor_in(dir.path());

        let results = extractor.extract_batch(&[], false);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].filename, "question_001.png");
    }
}
