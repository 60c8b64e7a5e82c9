//! Operation facade over the pipeline components.
//!
//! `QuestionService` owns one instance of each component and exposes the
//! operations an embedding application (web layer, CLI, desktop shell)
//! drives per image. Every mutating operation returns a definite outcome
//! object; component failures are converted here and never propagate as
//! unhandled faults.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::db::{question_repo, Database, QuestionRow};
use crate::enrich::EnrichmentClient;
use crate::error::{ConfigError, QbankError};
use crate::extractor::{ImageRecord, TextExtractor};
use crate::store::{MetadataRecord, MetadataStore};

/// Generic outcome wrapper for facade operations.
#[derive(Debug, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Outcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionRef {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct OcrBatch {
    pub processed: usize,
    pub results: Vec<ImageRecord>,
}

#[derive(Debug, Serialize)]
pub struct OcrReview {
    pub ocr_result: ImageRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataRecord>,
}

#[derive(Debug, Serialize)]
pub struct PromptPreview {
    pub filename: String,
    pub prompt: String,
}

/// Outcome of an enrichment run. On parse failures `raw_response`
/// preserves the (truncated) model reply for diagnosis.
#[derive(Debug, Serialize)]
pub struct AnalysisOutcome {
    pub success: bool,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<crate::enrich::EnrichedMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchUpdateOutcome {
    pub success: bool,
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewStatus {
    pub filename: String,
    pub review_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct QuestionList {
    pub questions: Vec<String>,
    pub count: usize,
}

/// Dashboard split of known images by review state.
#[derive(Debug, Serialize)]
pub struct ReviewOverview {
    pub pending: Vec<String>,
    pub completed: Vec<String>,
}

pub struct QuestionService {
    extractor: Arc<TextExtractor>,
    enricher: Arc<EnrichmentClient>,
    store: Arc<MetadataStore>,
    database: Database,
}

impl QuestionService {
    pub fn new(
        extractor: Arc<TextExtractor>,
        enricher: Arc<EnrichmentClient>,
        store: Arc<MetadataStore>,
        database: Database,
    ) -> Self {
        Self {
            extractor,
            enricher,
            store,
            database,
        }
    }

    /// Builds the service from configuration: components are constructed
    /// once here and shared by reference for the process lifetime.
    pub fn from_config(config: &Config) -> Result<Self, QbankError> {
        let extractor = TextExtractor::new(&config.images_dir, &config.ocr.languages, config.ocr.dpi);
        let enricher = EnrichmentClient::from_config(config)?;
        let store = MetadataStore::new(&config.metadata_file)?;

        let db_path = config
            .resolve_database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "could not resolve a database path".to_string(),
            })?;
        let database = Database::open(&db_path)?;

        Ok(Self::new(
            Arc::new(extractor),
            Arc::new(enricher),
            Arc::new(store),
            database,
        ))
    }

    /// Runs OCR over a batch of images. An empty `filenames` slice means
    /// "all known images"; `force` bypasses the extractor's cache.
    pub fn process_images(&self, filenames: &[String], force: bool) -> OcrBatch {
        let results = self.extractor.extract_batch(filenames, force);
        OcrBatch {
            processed: results.len(),
            results,
        }
    }

    /// OCR result for a single image together with its current metadata.
    pub fn ocr_result(&self, filename: &str) -> OcrReview {
        OcrReview {
            ocr_result: self.extractor.extract(filename, false),
            metadata: self.store.get(filename),
        }
    }

    /// Generates the enrichment prompt for preview/editing without
    /// calling the model.
    pub fn build_prompt(&self, filename: &str, ocr_text: &str) -> Outcome<PromptPreview> {
        if filename.is_empty() || ocr_text.is_empty() {
            return Outcome::err("Filename and OCR text required");
        }

        let existing = self.existing_fields(filename);
        match self.enricher.build_prompt(ocr_text, existing.as_ref()) {
            Ok(prompt) => Outcome::ok(PromptPreview {
                filename: filename.to_string(),
                prompt,
            }),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Analyzes OCR text with the model, optionally through a
    /// caller-edited prompt. Failures come back as a diagnosable outcome,
    /// never an error.
    pub async fn analyze(
        &self,
        filename: &str,
        ocr_text: &str,
        custom_prompt: Option<&str>,
    ) -> AnalysisOutcome {
        if filename.is_empty() || ocr_text.is_empty() {
            return AnalysisOutcome {
                success: false,
                filename: filename.to_string(),
                metadata: None,
                error: Some("Filename and OCR text required".to_string()),
                raw_response: None,
            };
        }

        let result = match custom_prompt {
            Some(prompt) => self.enricher.enrich_with_prompt(prompt).await,
            None => {
                let existing = self.existing_fields(filename);
                self.enricher.enrich(ocr_text, existing.as_ref()).await
            }
        };

        match result {
            Ok(metadata) => AnalysisOutcome {
                success: true,
                filename: filename.to_string(),
                metadata: Some(metadata),
                error: None,
                raw_response: None,
            },
            Err(e) => {
                log::error!("LLM analysis error for {}: {}", filename, e);
                let raw_response = e.raw_response().map(|s| s.to_string());
                AnalysisOutcome {
                    success: false,
                    filename: filename.to_string(),
                    metadata: None,
                    error: Some(e.to_string()),
                    raw_response,
                }
            }
        }
    }

    /// Merges a field patch into the metadata for `filename`.
    pub fn update_metadata(
        &self,
        filename: &str,
        patch: &Map<String, Value>,
    ) -> Outcome<QuestionRef> {
        if filename.is_empty() || patch.is_empty() {
            return Outcome::err("Filename and metadata required");
        }

        match self.store.merge_update(filename, patch) {
            Ok(()) => Outcome::ok(QuestionRef {
                filename: filename.to_string(),
            }),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Merges patches for multiple images in one store pass.
    pub fn batch_update(&self, updates: &[(String, Map<String, Value>)]) -> BatchUpdateOutcome {
        if updates.is_empty() {
            return BatchUpdateOutcome {
                success: false,
                success_count: 0,
                failure_count: 0,
                error: Some("No updates provided".to_string()),
            };
        }

        let (success_count, failure_count) = self.store.batch_merge_update(updates);
        BatchUpdateOutcome {
            success: failure_count == 0,
            success_count,
            failure_count,
            error: None,
        }
    }

    /// Toggles review completion for a question.
    pub fn set_review_completed(&self, filename: &str, completed: bool) -> Outcome<ReviewStatus> {
        if filename.is_empty() {
            return Outcome::err("Filename is required");
        }

        match self.store.mark_review_completed(filename, completed) {
            Ok(()) => Outcome::ok(ReviewStatus {
                filename: filename.to_string(),
                review_completed: completed,
            }),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Splits known images into pending and review-completed sets for the
    /// dashboard. Completed entries whose image no longer exists are
    /// dropped rather than shown as stale.
    pub fn review_overview(&self) -> ReviewOverview {
        let all_images = self.extractor.list_images();
        let completed_review = self.store.completed_review_filenames();

        let completed: Vec<String> = completed_review
            .into_iter()
            .filter(|name| all_images.contains(name))
            .collect();
        let pending: Vec<String> = all_images
            .into_iter()
            .filter(|name| !completed.contains(name))
            .collect();

        ReviewOverview { pending, completed }
    }

    /// Persists a review-completed question into the database. The review
    /// gate lives here, not in the repository.
    pub fn save_to_database(&self, filename: &str) -> Outcome<QuestionRef> {
        if filename.is_empty() {
            return Outcome::err("Filename is required");
        }

        let Some(metadata) = self.store.get(filename) else {
            return Outcome::err("Metadata not found for this question");
        };

        if !metadata.review_completed {
            return Outcome::err("Cannot save to database: review is not completed");
        }

        let row = match QuestionRow::from_record(&metadata) {
            Ok(row) => row,
            Err(e) => return Outcome::err(e.to_string()),
        };

        match question_repo::upsert(&self.database, &row) {
            Ok(()) => {
                log::info!("Question metadata saved to database: {}", filename);
                Outcome::ok(QuestionRef {
                    filename: filename.to_string(),
                })
            }
            Err(e) => {
                log::error!("Error saving question to database: {}", e);
                Outcome::err(e.to_string())
            }
        }
    }

    /// Retrieves a persisted question. Storage errors are logged and read
    /// as absent.
    pub fn saved_question(&self, filename: &str) -> Option<MetadataRecord> {
        match question_repo::find_by_filename(&self.database, filename) {
            Ok(row) => row.and_then(|r| match r.to_record() {
                Ok(record) => Some(record),
                Err(e) => {
                    log::error!("Error decoding stored question {}: {}", filename, e);
                    None
                }
            }),
            Err(e) => {
                log::error!("Error retrieving question from database: {}", e);
                None
            }
        }
    }

    /// Lists persisted questions by recency, optionally filtered by
    /// review status.
    pub fn list_saved(&self, review_completed: Option<bool>) -> Outcome<QuestionList> {
        match question_repo::list(&self.database, review_completed) {
            Ok(rows) => {
                let questions: Vec<String> = rows.into_iter().map(|r| r.filename).collect();
                let count = questions.len();
                Outcome::ok(QuestionList { questions, count })
            }
            Err(e) => {
                log::error!("Error retrieving questions from database: {}", e);
                Outcome::err(e.to_string())
            }
        }
    }

    /// Removes a persisted question. Deleting an absent row is a failure.
    pub fn delete_saved(&self, filename: &str) -> Outcome<QuestionRef> {
        match question_repo::delete(&self.database, filename) {
            Ok(true) => Outcome::ok(QuestionRef {
                filename: filename.to_string(),
            }),
            Ok(false) => Outcome::err(format!("No question found to delete: {}", filename)),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    fn existing_fields(&self, filename: &str) -> Option<Map<String, Value>> {
        self.store.get(filename).map(|r| r.as_prompt_fields())
    }
}
