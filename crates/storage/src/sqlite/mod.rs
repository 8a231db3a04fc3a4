use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lesson_core::Clock;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{SessionStore, Storage};

mod migrate;
mod session_store;

/// Session store persisting SCORM values in `SQLite`, scoped to one session id.
///
/// `set` stages values in memory; `commit` writes all staged values in a single
/// transaction.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    session_id: String,
    clock: Clock,
    staged: Arc<Mutex<BTreeMap<String, String>>>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error("session id cannot be empty")]
    EmptySessionId,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteSessionStore {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the session id is blank, the connection
    /// cannot be established, or connection setup pragmas fail.
    pub async fn connect(
        database_url: &str,
        session_id: impl Into<String>,
    ) -> Result<Self, SqliteInitError> {
        let session_id = session_id.into().trim().to_owned();
        if session_id.is_empty() {
            return Err(SqliteInitError::EmptySessionId);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        Ok(Self {
            pool,
            session_id,
            clock: Clock::default_clock(),
            staged: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    /// Use a specific clock for `updated_at` stamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite` for one learner session.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str, session_id: &str) -> Result<Self, SqliteInitError> {
        let store = SqliteSessionStore::connect(database_url, session_id).await?;
        store.migrate().await?;
        let session: Arc<dyn SessionStore> = Arc::new(store);
        Ok(Self { session })
    }
}
