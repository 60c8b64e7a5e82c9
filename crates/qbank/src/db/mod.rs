//! SQLite-backed persistence for review-completed questions.
//!
//! A single connection serves the whole process, behind a mutex so the
//! handle can be cloned and shared freely. SQLite serializes writes
//! anyway; WAL mode keeps readers from blocking on them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod migrations;
pub mod question_repo;

pub use error::DatabaseError;
pub use question_repo::QuestionRow;

/// Cloneable handle to the question database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file, bringing the schema up to
    /// date. Parent directories are created as needed.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::from_connection(conn)?;

        log::info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database for tests; schema is initialized the same way.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_pending(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection lock held.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Returns the canonical database path: `~/.qbank/data/qbank.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".qbank").join("data").join("qbank.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question_count(db: &Database) -> u32 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM questions", [], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_db_has_schema() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(question_count(&db), 0);
    }

    #[test]
    fn test_open_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("qbank.db");

        let db = Database::open(&path).unwrap();
        assert_eq!(question_count(&db), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qbank.db");

        {
            let db = Database::open(&path).unwrap();
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO questions (filename, created, last_updated, metadata_json)
                     VALUES ('question_001.png', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', '{}')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        }

        let reopened = Database::open(&path).unwrap();
        assert_eq!(question_count(&reopened), 1);
    }

    #[test]
    fn test_cloned_handles_share_the_connection() {
        let db = Database::open_in_memory().unwrap();
        let clone = db.clone();

        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO questions (filename, created, last_updated, metadata_json)
                 VALUES ('question_001.png', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', '{}')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(question_count(&clone), 1);
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with("qbank.db"));
        assert!(path.to_string_lossy().contains(".qbank"));
    }
}
