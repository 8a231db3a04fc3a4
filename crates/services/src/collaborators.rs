//! Seams between the lesson engine and its host: playback, presentation, timers.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use lesson_core::model::TimerId;

//
// ─── PLAYBACK ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("player rejected position {position}")]
    Rejected { position: f64 },
    #[error("player unavailable: {0}")]
    Unavailable(String),
}

/// The media player as seen by the engine.
pub trait PlaybackControl: Send {
    fn pause(&mut self);

    fn resume(&mut self);

    /// Move the playhead. The engine tags the resulting seek event as its own.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError` if the player refused the position; the engine
    /// keeps the correction pending and re-asserts it on the next update.
    fn force_position(&mut self, position: f64) -> Result<(), PlaybackError>;
}

//
// ─── PRESENTATION ──────────────────────────────────────────────────────────────
//

/// Question as handed to the presenter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuestionView<'a> {
    pub prompt: &'a str,
    pub choices: &'a [String],
    /// 1-based position in the catalog.
    pub ordinal: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackView<'a> {
    pub correct: bool,
    pub timed_out: bool,
    pub explanation: Option<&'a str>,
}

/// Whether progress is being recorded to a learning-management session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Connected,
    Preview,
}

/// The question overlay and its controls.
///
/// Title, session-mode and score rendering are optional for hosts.
pub trait Presenter: Send {
    fn render_title(&mut self, _title: &str) {}

    fn render_session_mode(&mut self, _mode: SessionMode) {}

    fn render_question(&mut self, view: &QuestionView<'_>);

    fn render_feedback(&mut self, view: &FeedbackView<'_>);

    fn set_choices_enabled(&mut self, enabled: bool);

    fn set_continue_visible(&mut self, visible: bool);

    fn show_countdown(&mut self, remaining_secs: u32);

    fn hide_countdown(&mut self);

    fn hide_question(&mut self);

    fn render_score(&mut self, _score: u32, _total: usize) {}

    fn clear_score(&mut self) {}
}

//
// ─── TIMERS ────────────────────────────────────────────────────────────────────
//

/// One-shot timers. A fired timer comes back to the engine as `timer_fired`.
pub trait TimerHost: Send {
    /// Arm `timer` to fire once after `after`. Re-arming replaces the previous deadline.
    fn schedule(&mut self, timer: TimerId, after: Duration);

    /// Disarm `timer`. Unknown or already fired timers are ignored.
    fn cancel(&mut self, timer: TimerId);
}

/// Everything the engine drives on its host.
pub struct Collaborators {
    pub playback: Box<dyn PlaybackControl>,
    pub presenter: Box<dyn Presenter>,
    pub timers: Box<dyn TimerHost>,
}
