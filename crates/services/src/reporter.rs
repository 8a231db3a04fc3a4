use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use lesson_core::progress::{CompletionStatus, ProgressRecord, SCORE_MAX, SCORE_MIN};
use lesson_core::time::format_timespan;
use storage::repository::{SessionStore, cmi};

use crate::Clock;
use crate::collaborators::SessionMode;

/// Best-effort writer of progress records into the session store.
///
/// Store failures are logged and never reach the learner.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn SessionStore>,
    clock: Clock,
    started_at: DateTime<Utc>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, clock: Clock) -> Self {
        let started_at = clock.now();
        Self {
            store,
            clock,
            started_at,
        }
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.store.has_session()
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        if self.has_session() {
            SessionMode::Connected
        } else {
            SessionMode::Preview
        }
    }

    /// Mark a fresh session as `incomplete`. Returns whether the commit succeeded.
    pub async fn init_session(&self) -> bool {
        if !self.has_session() {
            return false;
        }

        let current = self.read(cmi::LESSON_STATUS).await;
        if current.trim().is_empty() {
            self.write(cmi::LESSON_STATUS, CompletionStatus::Incomplete.as_str())
                .await;
        }
        self.commit().await
    }

    /// Write one progress record and commit. Returns whether the commit succeeded.
    pub async fn report(&self, record: &ProgressRecord) -> bool {
        if !self.has_session() {
            return false;
        }

        let session_time = format_timespan(self.clock.elapsed_since(self.started_at));
        self.write(cmi::SCORE_RAW, &record.percent().to_string())
            .await;
        self.write(cmi::SCORE_MIN, &SCORE_MIN.to_string()).await;
        self.write(cmi::SCORE_MAX, &SCORE_MAX.to_string()).await;
        self.write(cmi::LESSON_STATUS, record.status().as_str())
            .await;
        self.write(cmi::SESSION_TIME, &session_time).await;
        self.write(cmi::SUSPEND_DATA, record.resume_token().as_str())
            .await;

        let committed = self.commit().await;
        if committed {
            debug!(
                "reported {}% ({}) to the session",
                record.percent(),
                record.status()
            );
        }
        committed
    }

    /// Current value of `key`; empty when unset, unreadable, or in preview.
    pub async fn read(&self, key: &str) -> String {
        if !self.has_session() {
            return String::new();
        }
        match self.store.get(key).await {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                warn!("could not read `{key}` from the session: {err}");
                String::new()
            }
        }
    }

    async fn write(&self, key: &str, value: &str) -> bool {
        match self.store.set(key, value).await {
            Ok(()) => true,
            Err(err) => {
                warn!("could not write `{key}` to the session: {err}");
                false
            }
        }
    }

    async fn commit(&self) -> bool {
        match self.store.commit().await {
            Ok(()) => true,
            Err(err) => {
                warn!("could not commit progress to the session: {err}");
                false
            }
        }
    }
}
