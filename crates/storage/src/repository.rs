use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by session store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// SCORM 1.2 data model keys written by the progress reporter.
pub mod cmi {
    pub const LESSON_STATUS: &str = "cmi.core.lesson_status";
    pub const SCORE_RAW: &str = "cmi.core.score.raw";
    pub const SCORE_MIN: &str = "cmi.core.score.min";
    pub const SCORE_MAX: &str = "cmi.core.score.max";
    pub const SESSION_TIME: &str = "cmi.core.session_time";
    pub const SUSPEND_DATA: &str = "cmi.suspend_data";
}

/// Key/value contract of a learning-management session.
///
/// `set` may stage values; only `commit` makes them durable. Adapters without
/// an active session report `has_session() == false` and callers skip writes.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whether a real session backs this store (false = preview mode).
    fn has_session(&self) -> bool;

    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write (or stage) a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value is rejected.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Persist everything set since the last commit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot persist the values.
    async fn commit(&self) -> Result<(), StorageError>;
}

/// Store used when no learning-management session exists. Every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewStore;

#[async_trait]
impl SessionStore for PreviewStore {
    fn has_session(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn commit(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    commits: usize,
    unavailable: bool,
}

/// Simple in-memory session store for testing and embedding.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner::default())),
        }
    }

    /// Simulate a backend outage: every call fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.unavailable = unavailable;
        }
    }

    /// Current value of `key`, bypassing the async contract.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|guard| guard.values.get(key).cloned())
    }

    /// Number of successful commits so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.inner.lock().map_or(0, |guard| guard.commits)
    }

    fn with_inner<T>(
        &self,
        f: impl FnOnce(&mut MemoryInner) -> T,
    ) -> Result<T, StorageError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.unavailable {
            return Err(StorageError::Connection("session store unavailable".into()));
        }
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn has_session(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_inner(|inner| inner.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_inner(|inner| {
            inner.values.insert(key.to_owned(), value.to_owned());
        })
    }

    async fn commit(&self) -> Result<(), StorageError> {
        self.with_inner(|inner| inner.commits += 1)
    }
}

/// Session store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub session: Arc<dyn SessionStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let session: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        Self { session }
    }

    /// Storage for running without a learning-management session.
    #[must_use]
    pub fn preview() -> Self {
        let session: Arc<dyn SessionStore> = Arc::new(PreviewStore);
        Self { session }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips_and_counts_commits() {
        let store = InMemorySessionStore::new();
        assert!(store.has_session());
        assert_eq!(store.get(cmi::LESSON_STATUS).await.unwrap(), None);

        store.set(cmi::LESSON_STATUS, "incomplete").await.unwrap();
        store.commit().await.unwrap();

        assert_eq!(
            store.get(cmi::LESSON_STATUS).await.unwrap().as_deref(),
            Some("incomplete")
        );
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemorySessionStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.set(cmi::SCORE_RAW, "10").await,
            Err(StorageError::Connection(_))
        ));
        assert!(store.commit().await.is_err());
        assert_eq!(store.commit_count(), 0);

        store.set_unavailable(false);
        assert!(store.set(cmi::SCORE_RAW, "10").await.is_ok());
    }

    #[tokio::test]
    async fn preview_store_reports_no_session() {
        let storage = Storage::preview();
        assert!(!storage.session.has_session());
        storage.session.set(cmi::SCORE_RAW, "50").await.unwrap();
        assert_eq!(storage.session.get(cmi::SCORE_RAW).await.unwrap(), None);
    }
}
