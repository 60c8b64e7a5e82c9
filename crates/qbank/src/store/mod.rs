//! Canonical metadata store.
//!
//! Records live in a single JSON array file. Every mutating operation
//! copies the current file into a timestamped backup first; backup
//! failures are logged and swallowed so they degrade safety, not
//! availability. Read-modify-write is not atomic across processes —
//! concurrent writers race with last-write-wins semantics.

pub mod record;

use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde_json::{Map, Value};

use crate::error::StoreError;

pub use record::MetadataRecord;

const BACKUP_DIR_NAME: &str = "metadata_backups";

pub struct MetadataStore {
    metadata_file: PathBuf,
    backup_dir: PathBuf,
}

impl MetadataStore {
    /// Creates a store for the given metadata file, ensuring the backup
    /// directory next to it exists.
    pub fn new<P: AsRef<Path>>(metadata_file: P) -> Result<Self, StoreError> {
        let metadata_file = metadata_file.as_ref().to_path_buf();
        let backup_dir = metadata_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(BACKUP_DIR_NAME);

        std::fs::create_dir_all(&backup_dir).map_err(|e| StoreError::CreateDirectory {
            path: backup_dir.clone(),
            source: e,
        })?;

        Ok(Self {
            metadata_file,
            backup_dir,
        })
    }

    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Reads the full record collection. A missing or unparseable file
    /// reads as empty — "no metadata yet" is not an error here.
    pub fn read_all(&self) -> Vec<MetadataRecord> {
        if !self.metadata_file.exists() {
            log::warn!(
                "Metadata file not found: {}",
                self.metadata_file.display()
            );
            return Vec::new();
        }

        let content = match std::fs::read_to_string(&self.metadata_file) {
            Ok(content) => content,
            Err(e) => {
                log::error!("Error reading metadata file: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                log::error!("Error parsing metadata file: {}", e);
                Vec::new()
            }
        }
    }

    /// Finds the metadata entry for a specific image.
    pub fn get(&self, filename: &str) -> Option<MetadataRecord> {
        self.read_all()
            .into_iter()
            .find(|record| record.filename == filename)
    }

    /// Merges `patch` into the record for `filename`, synthesizing a new
    /// record when none exists. Takes a backup before writing and stamps
    /// `last_updated` (and `created` for new records).
    pub fn merge_update(
        &self,
        filename: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        record::validate_patch(patch)?;

        self.create_backup();

        let mut records = self.read_all();
        let now = Utc::now();

        match records.iter_mut().find(|r| r.filename == filename) {
            Some(existing) => {
                record::apply_patch(existing, patch);
                existing.last_updated = Some(now);
            }
            None => {
                log::info!("Creating new metadata entry for {}", filename);
                let mut fresh = MetadataRecord::new(filename, now);
                record::apply_patch(&mut fresh, patch);
                records.push(fresh);
            }
        }

        self.save_all(&records)
    }

    /// Merges a batch of patches with a single backup, read and write.
    ///
    /// Unlike [`merge_update`](Self::merge_update), entries without an
    /// existing record are counted as failures rather than synthesized.
    /// If the final write fails the whole batch counts as failed.
    pub fn batch_merge_update(&self, updates: &[(String, Map<String, Value>)]) -> (usize, usize) {
        if updates.is_empty() {
            return (0, 0);
        }

        self.create_backup();

        let mut records = self.read_all();
        let mut success_count = 0;
        let mut failure_count = 0;

        for (filename, patch) in updates {
            if let Err(e) = record::validate_patch(patch) {
                log::warn!("Rejecting batch entry for {}: {}", filename, e);
                failure_count += 1;
                continue;
            }

            match records.iter_mut().find(|r| &r.filename == filename) {
                Some(existing) => {
                    record::apply_patch(existing, patch);
                    existing.last_updated = Some(Utc::now());
                    success_count += 1;
                }
                None => {
                    log::warn!("No metadata entry found for {}", filename);
                    failure_count += 1;
                }
            }
        }

        if self.save_all(&records).is_err() {
            return (0, success_count + failure_count);
        }

        (success_count, failure_count)
    }

    /// Sets the review-completed flag, stamping `review_completed_at` on
    /// the transition to true and clearing it when set false.
    pub fn mark_review_completed(
        &self,
        filename: &str,
        completed: bool,
    ) -> Result<(), StoreError> {
        self.create_backup();

        let mut records = self.read_all();
        let now = Utc::now();

        let idx = match records.iter().position(|r| r.filename == filename) {
            Some(idx) => idx,
            None => {
                log::info!("Creating new metadata entry for {}", filename);
                records.push(MetadataRecord::new(filename, now));
                records.len() - 1
            }
        };
        let entry = &mut records[idx];

        if completed {
            if !entry.review_completed {
                entry.review_completed_at = Some(now);
            }
        } else {
            entry.review_completed_at = None;
        }
        entry.review_completed = completed;
        entry.last_updated = Some(now);

        self.save_all(&records)
    }

    /// Filenames currently flagged review-complete.
    pub fn completed_review_filenames(&self) -> Vec<String> {
        self.read_all()
            .into_iter()
            .filter(|record| record.review_completed)
            .map(|record| record.filename)
            .collect()
    }

    /// Copies the current metadata file into the backup directory with a
    /// second-resolution timestamp in the name. Best-effort: failures are
    /// logged and never block the write that follows.
    fn create_backup(&self) {
        if !self.metadata_file.exists() {
            log::warn!(
                "Cannot create backup: file {} not found",
                self.metadata_file.display()
            );
            return;
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let backup_path = self
            .backup_dir
            .join(format!("metadata_backup_{}.json", timestamp));

        match std::fs::copy(&self.metadata_file, &backup_path) {
            Ok(_) => log::info!("Created backup: {}", backup_path.display()),
            Err(e) => log::error!("Failed to create backup: {}", e),
        }
    }

    fn save_all(&self, records: &[MetadataRecord]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(records)?;

        std::fs::write(&self.metadata_file, content).map_err(|e| StoreError::WriteFile {
            path: self.metadata_file.clone(),
            source: e,
        })?;

        log::info!("Metadata saved to {}", self.metadata_file.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> (tempfile::TempDir, MetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("question_metadata.json")).unwrap();
        (dir, store)
    }

    fn patch(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let (_dir, store) = test_store();
        assert!(store.read_all().is_empty());
        assert!(store.get("question_001.png").is_none());
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let (_dir, store) = test_store();
        std::fs::write(store.metadata_file(), "{not json").unwrap();
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn test_merge_update_synthesizes_record() {
        let (_dir, store) = test_store();

        store
            .merge_update("question_001.png", &patch(&[("subject", json!("physics"))]))
            .unwrap();

        let record = store.get("question_001.png").unwrap();
        assert_eq!(record.subject.as_deref(), Some("physics"));
        assert!(record.created.is_some());
        assert_eq!(record.created, record.last_updated);
    }

    #[test]
    fn test_merge_update_preserves_unspecified_fields() {
        let (_dir, store) = test_store();

        store
            .merge_update(
                "question_001.png",
                &patch(&[("subject", json!("physics")), ("answer", json!("A"))]),
            )
            .unwrap();
        store
            .merge_update(
                "question_001.png",
                &patch(&[("difficulty_level", json!("hard"))]),
            )
            .unwrap();

        let record = store.get("question_001.png").unwrap();
        assert_eq!(record.subject.as_deref(), Some("physics"));
        assert_eq!(record.answer.as_deref(), Some("A"));
        assert_eq!(record.difficulty_level.as_deref(), Some("hard"));
        assert!(record.last_updated >= record.created);
    }

    #[test]
    fn test_merge_update_rejects_reserved_field() {
        let (_dir, store) = test_store();

        let result = store.merge_update(
            "question_001.png",
            &patch(&[("review_completed", json!(true))]),
        );
        assert!(matches!(result, Err(StoreError::InvalidField { .. })));
    }

    #[test]
    fn test_backup_created_before_mutation() {
        let (_dir, store) = test_store();

        store
            .merge_update("question_001.png", &patch(&[("subject", json!("physics"))]))
            .unwrap();
        // First write had no file to back up. The second one does.
        store
            .merge_update("question_001.png", &patch(&[("answer", json!("C"))]))
            .unwrap();

        let backups: Vec<_> = std::fs::read_dir(store.backup_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("metadata_backup_")
            })
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_batch_does_not_synthesize() {
        let (_dir, store) = test_store();

        store
            .merge_update("question_001.png", &patch(&[("subject", json!("physics"))]))
            .unwrap();
        store
            .merge_update("question_002.png", &patch(&[("subject", json!("physics"))]))
            .unwrap();

        let updates = vec![
            (
                "question_001.png".to_string(),
                patch(&[("answer", json!("A"))]),
            ),
            (
                "question_002.png".to_string(),
                patch(&[("answer", json!("B"))]),
            ),
            (
                "question_999.png".to_string(),
                patch(&[("answer", json!("C"))]),
            ),
        ];

        let (success, failure) = store.batch_merge_update(&updates);
        assert_eq!((success, failure), (2, 1));
        assert!(store.get("question_999.png").is_none());
        assert_eq!(
            store.get("question_002.png").unwrap().answer.as_deref(),
            Some("B")
        );
    }

    #[test]
    fn test_batch_empty_is_noop() {
        let (_dir, store) = test_store();
        assert_eq!(store.batch_merge_update(&[]), (0, 0));
    }

    #[test]
    fn test_review_toggle_stamps_and_clears() {
        let (_dir, store) = test_store();

        store.mark_review_completed("question_001.png", true).unwrap();
        let record = store.get("question_001.png").unwrap();
        assert!(record.review_completed);
        assert!(record.review_completed_at.is_some());

        store
            .mark_review_completed("question_001.png", false)
            .unwrap();
        let record = store.get("question_001.png").unwrap();
        assert!(!record.review_completed);
        assert!(record.review_completed_at.is_none());
    }

    #[test]
    fn test_review_restamp_is_idempotent() {
        let (_dir, store) = test_store();

        store.mark_review_completed("question_001.png", true).unwrap();
        let first = store.get("question_001.png").unwrap().review_completed_at;

        store.mark_review_completed("question_001.png", true).unwrap();
        let second = store.get("question_001.png").unwrap().review_completed_at;
        assert_eq!(first, second);
    }

    #[test]
    fn test_completed_review_filenames() {
        let (_dir, store) = test_store();

        store.mark_review_completed("question_001.png", true).unwrap();
        store.mark_review_completed("question_002.png", false).unwrap();
        store.mark_review_completed("question_003.png", true).unwrap();

        let completed = store.completed_review_filenames();
        assert_eq!(completed, vec!["question_001.png", "question_003.png"]);
    }

    #[test]
    fn test_legacy_entries_survive_merge() {
        let (_dir, store) = test_store();
        std::fs::write(
            store.metadata_file(),
            r#"[{"filename": "question_007.png", "subject": "economics", "coordinates": [1, 2, 3, 4]}]"#,
        )
        .unwrap();

        store
            .merge_update("question_007.png", &patch(&[("answer", json!("D"))]))
            .unwrap();

        let record = store.get("question_007.png").unwrap();
        assert_eq!(record.subject.as_deref(), Some("economics"));
        assert_eq!(record.answer.as_deref(), Some("D"));
        assert!(record.extra.contains_key("coordinates"));
        assert!(record.last_updated.is_some());
    }
}
