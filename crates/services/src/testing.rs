//! Recording collaborators for tests and headless hosts.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lesson_core::model::TimerId;

use crate::collaborators::{
    Collaborators, FeedbackView, PlaybackControl, PlaybackError, Presenter, QuestionView,
    SessionMode, TimerHost,
};

/// One side effect the engine asked its host for.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Pause,
    Resume,
    ForcePosition(f64),
    Title(String),
    Mode(SessionMode),
    Question {
        prompt: String,
        choices: Vec<String>,
        ordinal: usize,
        total: usize,
    },
    Feedback {
        correct: bool,
        timed_out: bool,
        explanation: Option<String>,
    },
    ChoicesEnabled(bool),
    ContinueVisible(bool),
    Countdown(u32),
    CountdownHidden,
    QuestionHidden,
    Score { score: u32, total: usize },
    ScoreCleared,
    TimerScheduled { timer: TimerId, after: Duration },
    TimerCancelled(TimerId),
}

/// Shared, ordered log of effects.
#[derive(Debug, Clone, Default)]
pub struct EffectLog {
    effects: Arc<Mutex<Vec<Effect>>>,
}

impl EffectLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, effect: Effect) {
        if let Ok(mut guard) = self.effects.lock() {
            guard.push(effect);
        }
    }

    /// Drain everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<Effect> {
        self.effects
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Effect> {
        self.effects
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, effect: &Effect) -> bool {
        self.snapshot().contains(effect)
    }

    /// Timers scheduled so far, in order, including re-arms.
    #[must_use]
    pub fn scheduled_timers(&self) -> Vec<(TimerId, Duration)> {
        self.snapshot()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::TimerScheduled { timer, after } => Some((timer, after)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn last_scheduled(&self) -> Option<TimerId> {
        self.scheduled_timers().last().map(|(timer, _)| *timer)
    }
}

/// Playback double. Forced positions can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingPlayback {
    log: EffectLog,
    reject_forces: Arc<Mutex<bool>>,
}

impl RecordingPlayback {
    #[must_use]
    pub fn new(log: EffectLog) -> Self {
        Self {
            log,
            reject_forces: Arc::default(),
        }
    }

    /// While set, `force_position` fails and records nothing.
    pub fn set_reject_forces(&self, reject: bool) {
        if let Ok(mut guard) = self.reject_forces.lock() {
            *guard = reject;
        }
    }
}

impl PlaybackControl for RecordingPlayback {
    fn pause(&mut self) {
        self.log.push(Effect::Pause);
    }

    fn resume(&mut self) {
        self.log.push(Effect::Resume);
    }

    fn force_position(&mut self, position: f64) -> Result<(), PlaybackError> {
        if self.reject_forces.lock().map(|guard| *guard).unwrap_or(false) {
            return Err(PlaybackError::Rejected { position });
        }
        self.log.push(Effect::ForcePosition(position));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    log: EffectLog,
}

impl RecordingPresenter {
    #[must_use]
    pub fn new(log: EffectLog) -> Self {
        Self { log }
    }
}

impl Presenter for RecordingPresenter {
    fn render_title(&mut self, title: &str) {
        self.log.push(Effect::Title(title.to_owned()));
    }

    fn render_session_mode(&mut self, mode: SessionMode) {
        self.log.push(Effect::Mode(mode));
    }

    fn render_question(&mut self, view: &QuestionView<'_>) {
        self.log.push(Effect::Question {
            prompt: view.prompt.to_owned(),
            choices: view.choices.to_vec(),
            ordinal: view.ordinal,
            total: view.total,
        });
    }

    fn render_feedback(&mut self, view: &FeedbackView<'_>) {
        self.log.push(Effect::Feedback {
            correct: view.correct,
            timed_out: view.timed_out,
            explanation: view.explanation.map(str::to_owned),
        });
    }

    fn set_choices_enabled(&mut self, enabled: bool) {
        self.log.push(Effect::ChoicesEnabled(enabled));
    }

    fn set_continue_visible(&mut self, visible: bool) {
        self.log.push(Effect::ContinueVisible(visible));
    }

    fn show_countdown(&mut self, remaining_secs: u32) {
        self.log.push(Effect::Countdown(remaining_secs));
    }

    fn hide_countdown(&mut self) {
        self.log.push(Effect::CountdownHidden);
    }

    fn hide_question(&mut self) {
        self.log.push(Effect::QuestionHidden);
    }

    fn render_score(&mut self, score: u32, total: usize) {
        self.log.push(Effect::Score { score, total });
    }

    fn clear_score(&mut self) {
        self.log.push(Effect::ScoreCleared);
    }
}

/// Timer host that only records; tests fire timers by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualTimers {
    log: EffectLog,
}

impl ManualTimers {
    #[must_use]
    pub fn new(log: EffectLog) -> Self {
        Self { log }
    }
}

impl TimerHost for ManualTimers {
    fn schedule(&mut self, timer: TimerId, after: Duration) {
        self.log.push(Effect::TimerScheduled { timer, after });
    }

    fn cancel(&mut self, timer: TimerId) {
        self.log.push(Effect::TimerCancelled(timer));
    }
}

/// Recording collaborators sharing one log, plus a handle on the playback double.
#[must_use]
pub fn recording_collaborators() -> (Collaborators, EffectLog, RecordingPlayback) {
    let log = EffectLog::new();
    let playback = RecordingPlayback::new(log.clone());
    let collaborators = Collaborators {
        playback: Box::new(playback.clone()),
        presenter: Box::new(RecordingPresenter::new(log.clone())),
        timers: Box::new(ManualTimers::new(log.clone())),
    };
    (collaborators, log, playback)
}
