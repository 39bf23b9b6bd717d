//! Client-local persisted state for the LLE client.
//!
//! Holds what a browser build would keep in local storage: the auth token
//! pair, the currently selected child, and a log of sessions this client
//! started. Backed by SQLite through an `r2d2` pool, with embedded
//! migrations applied when the store is opened.

mod migrations;
mod pool;
mod store;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use store::{ChildSelection, LocalStore, OpenSession, StoreError};
