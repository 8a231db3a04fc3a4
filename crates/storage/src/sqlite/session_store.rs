use async_trait::async_trait;
use log::debug;
use sqlx::Row;

use crate::repository::{SessionStore, StorageError};

use super::SqliteSessionStore;

impl SqliteSessionStore {
    fn staged_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .staged
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn staged_snapshot(&self) -> Result<Vec<(String, String)>, StorageError> {
        let guard = self
            .staged
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    /// Drop staged entries that were committed and not overwritten meanwhile.
    fn clear_committed(&self, committed: &[(String, String)]) -> Result<(), StorageError> {
        let mut guard = self
            .staged
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for (key, value) in committed {
            if guard.get(key) == Some(value) {
                guard.remove(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn has_session(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(value) = self.staged_value(key)? {
            return Ok(Some(value));
        }

        let row = sqlx::query(
            r"
            SELECT value
            FROM cmi_values
            WHERE session_id = ?1 AND key = ?2
            ",
        )
        .bind(&self.session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        row.map(|row| {
            row.try_get::<String, _>("value")
                .map_err(|err| StorageError::Serialization(err.to_string()))
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .staged
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn commit(&self) -> Result<(), StorageError> {
        let staged = self.staged_snapshot()?;
        if staged.is_empty() {
            return Ok(());
        }

        let updated_at = self.clock.now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        for (key, value) in &staged {
            sqlx::query(
                r"
                INSERT INTO cmi_values (session_id, key, value, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(session_id, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                ",
            )
            .bind(&self.session_id)
            .bind(key)
            .bind(value)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        debug!(
            "committed {} value(s) for session `{}`",
            staged.len(),
            self.session_id
        );
        self.clear_committed(&staged)
    }
}
