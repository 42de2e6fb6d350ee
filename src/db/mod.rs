//! Database module for the blog server
//!
//! Owns the SQLite pool and migrations, and exposes the two stores
//! built on top of it: credentials and posts.

pub mod credentials;
pub mod models;
pub mod posts;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{error, info};

use crate::error::{AppError, DatabaseError};

pub use credentials::{CredentialStore, SqliteCredentialStore};
pub use models::{NewPost, Post, PostQuery, User};
pub use posts::PostStore;

/// Handle to the persistent store. Opened once at startup and handed to
/// every component that needs it.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `url` and bring the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5));

        // Each in-memory connection is its own database, so keep exactly one alive.
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        info!("Database ready at {}", url);
        Ok(db)
    }

    /// Fresh private in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self, AppError> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn credentials(&self) -> SqliteCredentialStore {
        SqliteCredentialStore::new(self.pool.clone())
    }

    pub fn posts(&self) -> PostStore {
        PostStore::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Roll back a failed write and hand back the write's own error. A failing
/// rollback is only logged; the connection is discarded either way.
pub(crate) async fn rollback_after(transaction: Transaction<'_, Sqlite>, cause: AppError) -> AppError {
    if let Err(e) = transaction.rollback().await {
        error!("Rollback failed after \"{}\": {}", cause, e);
    }
    cause
}
