//! Schema migrations.
//!
//! The schema is self-initializing: opening a database applies whatever
//! migrations it has not seen yet, in version order. Applied versions
//! are recorded in `_migrations`.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create_questions_table",
    sql: include_str!("sql/001_create_questions.sql"),
}];

/// Applies every migration newer than the database's recorded version.
pub fn run_pending(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = applied_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        log::info!(
            "Applying schema migration v{} ({})",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

fn applied_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_db_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_pending(&conn).unwrap();

        assert_eq!(
            applied_version(&conn).unwrap(),
            MIGRATIONS.last().unwrap().version
        );
    }

    #[test]
    fn test_rerunning_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        run_pending(&conn).unwrap();
        run_pending(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_questions_table_accepts_rows() {
        let conn = Connection::open_in_memory().unwrap();
        run_pending(&conn).unwrap();

        conn.execute(
            "INSERT INTO questions (filename, created, last_updated, metadata_json)
             VALUES ('question_001.png', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', '{}')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_filename_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run_pending(&conn).unwrap();

        let insert = "INSERT INTO questions (filename, created, last_updated, metadata_json)
                      VALUES ('question_001.png', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', '{}')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
