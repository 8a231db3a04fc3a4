use std::fmt;

use serde::Serialize;

use crate::model::{ResumeToken, SessionState};

/// Lower bound reported alongside the raw score.
pub const SCORE_MIN: u8 = 0;
/// Upper bound reported alongside the raw score.
pub const SCORE_MAX: u8 = 100;

/// Lesson completion as reported to the learning-management session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Incomplete,
    Passed,
    Failed,
}

impl CompletionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Incomplete => "incomplete",
            CompletionStatus::Passed => "passed",
            CompletionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-way projection of the session state, pushed to the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    percent: u8,
    status: CompletionStatus,
    resume_token: ResumeToken,
}

impl ProgressRecord {
    /// Derive the record for the current attempt.
    ///
    /// The lesson is incomplete until every interaction has been asked; after
    /// that it is passed when `percent >= mastery_score`, failed otherwise.
    #[must_use]
    pub fn derive(
        state: &SessionState,
        total_interactions: usize,
        mastery_score: u8,
        resume_limit: usize,
    ) -> Self {
        let percent = score_percent(state.score(), total_interactions);
        let status = if state.asked_count() < total_interactions {
            CompletionStatus::Incomplete
        } else if percent >= mastery_score {
            CompletionStatus::Passed
        } else {
            CompletionStatus::Failed
        };
        let resume_token = ResumeToken::encode(state.asked(), state.score(), resume_limit);

        Self {
            percent,
            status,
            resume_token,
        }
    }

    #[must_use]
    pub fn percent(&self) -> u8 {
        self.percent
    }

    #[must_use]
    pub fn status(&self) -> CompletionStatus {
        self.status
    }

    #[must_use]
    pub fn resume_token(&self) -> &ResumeToken {
        &self.resume_token
    }
}

/// `round(score / total * 100)`, half rounding up; zero when there is nothing to score.
#[must_use]
pub fn score_percent(score: u32, total: usize) -> u8 {
    let Ok(total) = u64::try_from(total) else {
        return 0;
    };
    if total == 0 {
        return 0;
    }
    let score = u64::from(score).min(total);
    let rounded = (score * 200 + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(SCORE_MAX)
}
