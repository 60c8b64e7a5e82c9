//! Question repository — upsert and queries for the `questions` table.
//!
//! Each row stores the full metadata record as a JSON blob plus
//! denormalized columns (timestamps, review flag) so listings can filter
//! and sort without deserializing every blob.

use chrono::Utc;
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::store::MetadataRecord;

/// A raw question row from the database.
#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub filename: String,
    pub created: String,
    pub last_updated: String,
    pub review_completed: bool,
    pub review_completed_at: Option<String>,
    pub metadata_json: String,
}

impl QuestionRow {
    /// Builds a row from a metadata record, stamping missing timestamps
    /// with the current time.
    pub fn from_record(record: &MetadataRecord) -> Result<Self, DatabaseError> {
        let created = record.created.unwrap_or_else(Utc::now);
        let last_updated = record.last_updated.unwrap_or(created);
        let review_completed_at = if record.review_completed {
            record.review_completed_at.map(|t| t.to_rfc3339())
        } else {
            None
        };

        Ok(Self {
            filename: record.filename.clone(),
            created: created.to_rfc3339(),
            last_updated: last_updated.to_rfc3339(),
            review_completed: record.review_completed,
            review_completed_at,
            metadata_json: serde_json::to_string(record)?,
        })
    }

    /// Decodes the stored metadata blob back into a record.
    pub fn to_record(&self) -> Result<MetadataRecord, DatabaseError> {
        Ok(serde_json::from_str(&self.metadata_json)?)
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            filename: row.get("filename")?,
            created: row.get("created")?,
            last_updated: row.get("last_updated")?,
            review_completed: row.get("review_completed")?,
            review_completed_at: row.get("review_completed_at")?,
            metadata_json: row.get("metadata_json")?,
        })
    }
}

/// Inserts or updates the row for the record's filename. `created` is
/// preserved on update, so repeated saves of an identical record are
/// no-ops in effect.
pub fn upsert(db: &Database, row: &QuestionRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO questions (filename, created, last_updated, review_completed,
             review_completed_at, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(filename) DO UPDATE SET
                 last_updated = excluded.last_updated,
                 review_completed = excluded.review_completed,
                 review_completed_at = excluded.review_completed_at,
                 metadata_json = excluded.metadata_json",
            params![
                row.filename,
                row.created,
                row.last_updated,
                row.review_completed,
                row.review_completed_at,
                row.metadata_json,
            ],
        )?;
        Ok(())
    })
}

/// Finds a question by its filename.
pub fn find_by_filename(db: &Database, filename: &str) -> Result<Option<QuestionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM questions WHERE filename = ?1")?;
        let mut rows = stmt.query_map(params![filename], QuestionRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists questions ordered by `last_updated` descending, optionally
/// filtered by review status.
pub fn list(
    db: &Database,
    review_completed: Option<bool>,
) -> Result<Vec<QuestionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let rows = match review_completed {
            None => {
                let mut stmt =
                    conn.prepare("SELECT * FROM questions ORDER BY last_updated DESC")?;
                let rows: Vec<QuestionRow> = stmt
                    .query_map([], QuestionRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            Some(flag) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM questions WHERE review_completed = ?1
                     ORDER BY last_updated DESC",
                )?;
                let rows: Vec<QuestionRow> = stmt
                    .query_map(params![flag], QuestionRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    })
}

/// Deletes the row for `filename`. Returns false when no row matched.
pub fn delete(db: &Database, filename: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM questions WHERE filename = ?1",
            params![filename],
        )?;
        Ok(deleted > 0)
    })
}

/// Counts all stored questions.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM questions", [], |r| r.get(0))?;
        Ok(count)
    })
}
