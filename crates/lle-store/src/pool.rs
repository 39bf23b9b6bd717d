use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;
use thiserror::Error;

/// Path that selects a private in-memory database.
pub(crate) const IN_MEMORY: &str = ":memory:";

/// SQLite tuning for the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Upper bound on pooled connections to a file store.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 4,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create store connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Builds the connection pool for a store at `db_path`.
///
/// File stores use WAL so the CLI and a long-running agent can share one
/// file. `:memory:` gets a single connection that is never recycled, since
/// each SQLite connection to memory is a separate database.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the first connection cannot be opened.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let in_memory = db_path == IN_MEMORY;
    let manager = if in_memory {
        SqliteConnectionManager::memory()
    } else {
        SqliteConnectionManager::file(db_path)
    };

    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = manager.with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") && !mode.eq_ignore_ascii_case("memory") {
            tracing::warn!(journal_mode = %mode, "store is not in WAL mode");
        }
        Ok(())
    });

    let builder = Pool::builder();
    let pool = if in_memory {
        builder
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .build(manager)?
    } else {
        builder.max_size(settings.pool_max_size.max(1)).build(manager)?
    };
    tracing::debug!(path = db_path, max_size = pool.max_size(), "store pool ready");
    Ok(pool)
}
