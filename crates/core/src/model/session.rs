use indexmap::IndexSet;
use thiserror::Error;

use crate::model::ids::InteractionId;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("score ({score}) cannot exceed the number of asked interactions ({asked})")]
    ScoreExceedsAsked { score: u32, asked: usize },

    #[error("baseline must be a finite, non-negative position, got {provided}")]
    InvalidBaseline { provided: f64 },
}

/// Mutable state of one playback attempt.
///
/// Owned by the engine and threaded through every transition. A restart
/// returns it to the attempt-start shape via [`SessionState::reset_attempt`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    asked: IndexSet<InteractionId>,
    score: u32,
    in_question: bool,
    last_allowed_time: f64,
    block_seek: bool,
    pending_correction: Option<f64>,
}

impl SessionState {
    /// Fresh attempt state. `block_seek` is fixed for the whole session.
    #[must_use]
    pub fn new(block_seek: bool) -> Self {
        Self {
            asked: IndexSet::new(),
            score: 0,
            in_question: false,
            last_allowed_time: 0.0,
            block_seek,
            pending_correction: None,
        }
    }

    /// Rebuild an arbitrary state, e.g. for tests or diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if `score` exceeds the asked count or the
    /// baseline is negative or not finite.
    pub fn from_parts(
        asked: impl IntoIterator<Item = InteractionId>,
        score: u32,
        in_question: bool,
        last_allowed_time: f64,
        block_seek: bool,
    ) -> Result<Self, SessionStateError> {
        let asked: IndexSet<_> = asked.into_iter().collect();
        if usize::try_from(score).map_or(true, |score| score > asked.len()) {
            return Err(SessionStateError::ScoreExceedsAsked {
                score,
                asked: asked.len(),
            });
        }
        if !last_allowed_time.is_finite() || last_allowed_time < 0.0 {
            return Err(SessionStateError::InvalidBaseline {
                provided: last_allowed_time,
            });
        }
        Ok(Self {
            asked,
            score,
            in_question,
            last_allowed_time,
            block_seek,
            pending_correction: None,
        })
    }

    /// Interaction ids triggered this attempt, in trigger order.
    pub fn asked(&self) -> impl Iterator<Item = &InteractionId> {
        self.asked.iter()
    }

    #[must_use]
    pub fn asked_count(&self) -> usize {
        self.asked.len()
    }

    #[must_use]
    pub fn is_asked(&self, id: &InteractionId) -> bool {
        self.asked.contains(id)
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn in_question(&self) -> bool {
        self.in_question
    }

    /// High-water mark of legitimately reached playback position.
    #[must_use]
    pub fn last_allowed_time(&self) -> f64 {
        self.last_allowed_time
    }

    #[must_use]
    pub fn block_seek(&self) -> bool {
        self.block_seek
    }

    /// Position the guard is still trying to restore, if a correction did not apply.
    #[must_use]
    pub fn pending_correction(&self) -> Option<f64> {
        self.pending_correction
    }

    /// Returns false if the id was already asked.
    pub(crate) fn mark_asked(&mut self, id: InteractionId) -> bool {
        self.asked.insert(id)
    }

    pub(crate) fn record_correct(&mut self) {
        let next = self.score.saturating_add(1);
        if usize::try_from(next).is_ok_and(|next| next <= self.asked.len()) {
            self.score = next;
        }
    }

    pub(crate) fn enter_question(&mut self) {
        self.in_question = true;
    }

    pub(crate) fn leave_question(&mut self) {
        self.in_question = false;
    }

    pub(crate) fn set_last_allowed_time(&mut self, position: f64) {
        self.last_allowed_time = position;
    }

    pub(crate) fn set_pending_correction(&mut self, target: Option<f64>) {
        self.pending_correction = target;
    }

    /// Clears asked/score, leaves the question, and rewinds the baseline to zero.
    pub(crate) fn reset_attempt(&mut self) {
        self.asked.clear();
        self.score = 0;
        self.in_question = false;
        self.last_allowed_time = 0.0;
        self.pending_correction = None;
    }
}
