//! Key/value local storage and the typed records kept in it.

use crate::migrations::{run_migrations, MigrationError};
use crate::pool::{create_pool, DbPool, DbRuntimeSettings, PoolError, IN_MEMORY};
use lle_types::{AuthTokens, Child, SessionStart};
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

const ACCESS_TOKEN_KEY: &str = "auth_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const SELECTED_CHILD_KEY: &str = "selected-child";

/// Errors raised by the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("store connection unavailable: {0}")]
    Connection(#[from] r2d2::Error),

    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read access to the child picked on the dashboard.
///
/// The voice-agent view takes this as an injected dependency rather than
/// reading global state.
pub trait ChildSelection: Send + Sync {
    /// Returns the selected child, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    fn selected_child(&self) -> Result<Option<Child>, StoreError>;
}

/// A session recorded as started by this client and not yet ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub session_id: i64,
    pub child_id: String,
    pub livekit_room: String,
    pub started_at: String,
}

/// SQLite-backed local storage.
#[derive(Clone)]
pub struct LocalStore {
    pool: DbPool,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("pool_max_size", &self.pool.max_size())
            .finish()
    }
}

impl LocalStore {
    /// Opens (creating if needed) the store at `path` and applies pending
    /// migrations. Use `:memory:` for a throwaway store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the pool cannot be built or migrations fail.
    pub fn open(path: &str, settings: DbRuntimeSettings) -> Result<Self, StoreError> {
        let pool = create_pool(path, settings)?;
        {
            let conn = pool.get()?;
            let applied = run_migrations(&conn)?;
            if applied > 0 {
                tracing::info!(count = applied, path, "applied store migrations");
            }
        }
        Ok(Self { pool })
    }

    /// Opens a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if SQLite cannot be initialised.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(IN_MEMORY, DbRuntimeSettings::default())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// Removes `key`. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.set(key, &serde_json::to_string(value)?)
    }

    // -- credentials --

    /// Persists both halves of the token pair atomically.
    pub fn save_tokens(&self, tokens: &AuthTokens) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        for (key, value) in [
            (ACCESS_TOKEN_KEY, &tokens.access),
            (REFRESH_TOKEN_KEY, &tokens.refresh),
        ] {
            tx.execute(
                "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.get(REFRESH_TOKEN_KEY)
    }

    pub fn clear_tokens(&self) -> Result<(), StoreError> {
        self.remove(ACCESS_TOKEN_KEY)?;
        self.remove(REFRESH_TOKEN_KEY)
    }

    // -- child selection --

    pub fn select_child(&self, child: &Child) -> Result<(), StoreError> {
        tracing::debug!(child_id = %child.id, "selecting child");
        self.set_json(SELECTED_CHILD_KEY, child)
    }

    pub fn clear_selected_child(&self) -> Result<(), StoreError> {
        self.remove(SELECTED_CHILD_KEY)
    }

    // -- session log --

    pub fn record_session_started(&self, start: &SessionStart) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO session_log (session_id, child_id, livekit_room, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                start.session_id,
                start.child_id.to_string(),
                start.livekit_room,
                start.started_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn record_session_ended(&self, session_id: i64) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE session_log SET ended_at = datetime('now') WHERE session_id = ?1",
            [session_id],
        )?;
        Ok(())
    }

    /// Sessions started here that were never recorded as ended, oldest first.
    pub fn open_sessions(&self) -> Result<Vec<OpenSession>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, child_id, livekit_room, started_at
             FROM session_log WHERE ended_at IS NULL ORDER BY started_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OpenSession {
                session_id: row.get(0)?,
                child_id: row.get(1)?,
                livekit_room: row.get(2)?,
                started_at: row.get(3)?,
            })
        })?;
        let sessions = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}

impl ChildSelection for LocalStore {
    fn selected_child(&self) -> Result<Option<Child>, StoreError> {
        self.get_json(SELECTED_CHILD_KEY)
    }
}
