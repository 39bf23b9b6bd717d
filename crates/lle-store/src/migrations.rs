//! Schema versioning for the local store.
//!
//! Schema steps are embedded with `include_str!` and numbered by position.
//! SQLite's `user_version` pragma records how many have been applied, and
//! each step commits together with its version bump.

use rusqlite::Connection;
use thiserror::Error;

type Step = (&'static str, &'static str);

/// Schema steps in order. New steps are appended, never edited.
const STEPS: &[Step] = &[
    ("local_storage", include_str!("migrations/000_local_storage.sql")),
    ("session_log", include_str!("migrations/001_session_log.sql")),
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("schema step {version} ({name}) failed: {source}")]
    Step {
        version: usize,
        name: &'static str,
        source: rusqlite::Error,
    },

    #[error("failed to read store schema version: {0}")]
    Version(rusqlite::Error),

    /// The file was written by a newer client.
    #[error("store schema version {found} is newer than this client supports ({known})")]
    TooNew { found: usize, known: usize },
}

/// Brings the schema up to date and returns how many steps were applied.
///
/// # Errors
///
/// Returns `MigrationError` if a step fails (it is rolled back), if the
/// version cannot be read, or if the store is ahead of this build.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply_steps(conn, STEPS)
}

fn schema_version(conn: &Connection) -> Result<usize, MigrationError> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(MigrationError::Version)?;
    Ok(usize::try_from(version).unwrap_or(0))
}

fn apply_steps(conn: &Connection, steps: &[Step]) -> Result<usize, MigrationError> {
    let current = schema_version(conn)?;
    if current > steps.len() {
        return Err(MigrationError::TooNew {
            found: current,
            known: steps.len(),
        });
    }

    for (index, &(name, sql)) in steps.iter().enumerate().skip(current) {
        let version = index + 1;
        let step_failed = |source: rusqlite::Error| MigrationError::Step {
            version,
            name,
            source,
        };
        tracing::info!(version, step = name, "upgrading store schema");

        let tx = conn.unchecked_transaction().map_err(step_failed)?;
        tx.execute_batch(sql).map_err(step_failed)?;
        tx.pragma_update(None, "user_version", version as i64)
            .map_err(step_failed)?;
        tx.commit().map_err(step_failed)?;
    }

    Ok(steps.len() - current)
}
