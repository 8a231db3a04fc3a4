use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use lesson_core::Clock;
use lesson_core::model::{
    DEFAULT_RESUME_TOKEN_LIMIT, DEFAULT_TITLE, LessonConfig, LessonSettings, ResumeHint,
    ResumeToken, SessionState, TimerId,
};
use lesson_core::progress::ProgressRecord;
use lesson_core::quiz::{
    ActiveAttempt, AnswerOutcome, Countdown, FollowUp, QuizMachine, QuizPhase, TickOutcome,
};
use lesson_core::scheduler::InteractionScheduler;
use lesson_core::seek_guard::{AdvanceVerdict, SeekGuard, SeekSource, SeekVerdict};
use storage::repository::{SessionStore, cmi};

use crate::collaborators::{
    Collaborators, FeedbackView, PlaybackControl, Presenter, QuestionView, TimerHost,
};
use crate::error::LessonError;
use crate::reporter::ProgressReporter;

/// Characters of suspend data shown in a snapshot.
const SNAPSHOT_SUSPEND_CHARS: usize = 120;

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

/// Engine timings and limits that are not part of the lesson configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Delay before choices re-enable under the retry policy.
    pub retry_delay: Duration,
    /// Delay before the attempt rewinds under the restart policy.
    pub restart_delay: Duration,
    pub countdown_tick: Duration,
    pub resume_token_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(300),
            restart_delay: Duration::from_millis(600),
            countdown_tick: Duration::from_secs(1),
            resume_token_limit: DEFAULT_RESUME_TOKEN_LIMIT,
        }
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Debug view of the engine and the session it reports to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub has_session: bool,
    pub lesson_status: String,
    pub score_raw: String,
    /// First 120 characters of the stored suspend data.
    pub suspend_data: String,
    pub disable_seeking: bool,
    /// Rounded to two decimals.
    pub last_allowed_time: f64,
    pub asked: Vec<String>,
    pub score: u32,
    pub in_question: bool,
    pub phase: QuizPhase,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelayedAction {
    UnlockRetry,
    FinishRestart,
}

#[derive(Debug, Clone, Copy)]
struct PendingDelay {
    timer: TimerId,
    action: DelayedAction,
}

/// Drives one lesson: seek guarding, question scheduling, answers, and reporting.
///
/// Without a configuration the engine stays disabled: the video plays freely,
/// no question is shown and nothing is reported.
pub struct LessonEngine {
    config: Option<LessonConfig>,
    state: SessionState,
    quiz: QuizMachine,
    playback: Box<dyn PlaybackControl>,
    presenter: Box<dyn Presenter>,
    timers: Box<dyn TimerHost>,
    reporter: ProgressReporter,
    options: EngineOptions,
    next_timer: u64,
    pending: Option<PendingDelay>,
}

impl LessonEngine {
    #[must_use]
    pub fn new(
        config: Option<LessonConfig>,
        collaborators: Collaborators,
        store: Arc<dyn SessionStore>,
        clock: Clock,
    ) -> Self {
        let settings = config
            .as_ref()
            .map(|config| config.settings().clone())
            .unwrap_or_default();

        Self {
            state: SessionState::new(settings.disable_seeking()),
            quiz: QuizMachine::new(&settings),
            config,
            playback: collaborators.playback,
            presenter: collaborators.presenter,
            timers: collaborators.timers,
            reporter: ProgressReporter::new(store, clock),
            options: EngineOptions::default(),
            next_timer: 1,
            pending: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn config(&self) -> Option<&LessonConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Settings in effect; defaults when disabled.
    #[must_use]
    pub fn settings(&self) -> LessonSettings {
        self.config
            .as_ref()
            .map(|config| config.settings().clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.quiz.phase()
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&ActiveAttempt> {
        self.quiz.attempt()
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Render the chrome, initialise the session and report the starting record.
    pub async fn start(&mut self) {
        let title = self
            .config
            .as_ref()
            .map_or(DEFAULT_TITLE, LessonConfig::title);
        self.presenter.render_title(title);
        self.presenter.render_session_mode(self.reporter.mode());

        let Some(config) = self.config.as_ref() else {
            warn!("no lesson configuration loaded; questions and reporting are disabled");
            self.presenter.clear_score();
            return;
        };
        info!(
            "lesson `{}` started with {} interaction(s), session: {:?}",
            config.title(),
            config.total_interactions(),
            self.reporter.mode()
        );

        self.refresh_score();
        self.reporter.init_session().await;
        self.report().await;
    }

    /// The playhead moved during normal playback.
    ///
    /// A pending correction is re-asserted before anything else; otherwise the
    /// baseline advances and the first due interaction, if any, is presented.
    pub fn position_advanced(&mut self, position: f64) {
        match SeekGuard::on_position_advanced(&mut self.state, position) {
            AdvanceVerdict::Reassert { position } => self.force_position(position),
            AdvanceVerdict::Held => {}
            AdvanceVerdict::Advanced => self.present_due(position),
        }
    }

    /// The player reports a seek. User seeks are undone while seeking is disabled.
    pub fn seek_attempted(&mut self, target: f64, source: SeekSource) {
        if let SeekVerdict::Reject { position } =
            SeekGuard::on_seek_attempted(&mut self.state, target, source)
        {
            debug!("rejected seek to {target}, returning to {position}");
            self.force_position(position);
        }
    }

    /// Answer the active question.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::NoLesson` when disabled and `LessonError::Quiz` when
    /// no answer is awaited or the choice is out of range.
    pub async fn submit_answer(&mut self, choice: usize) -> Result<AnswerOutcome, LessonError> {
        if self.config.is_none() {
            return Err(LessonError::NoLesson);
        }
        let outcome = self.quiz.submit(&mut self.state, choice)?;
        self.apply_outcome(&outcome).await;
        Ok(outcome)
    }

    /// Dismiss the feedback and resume playback.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Quiz` when continue is not offered.
    pub fn continue_playback(&mut self) -> Result<(), LessonError> {
        self.quiz.continue_playback(&mut self.state)?;
        self.presenter.hide_question();
        self.presenter.set_continue_visible(false);
        self.presenter.hide_countdown();
        self.playback.resume();
        Ok(())
    }

    /// Learner-initiated restart. Cancels any pending delay and countdown.
    pub async fn restart(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.timers.cancel(pending.timer);
        }
        if let Some(timer) = self.quiz.restart(&mut self.state) {
            self.timers.cancel(timer);
        }
        info!("attempt restarted by the learner");
        self.after_restart().await;
    }

    /// A timer scheduled through the `TimerHost` fired. Stale timers are ignored.
    pub async fn timer_fired(&mut self, timer: TimerId) {
        if let Some(pending) = self.pending.filter(|pending| pending.timer == timer) {
            self.pending = None;
            match pending.action {
                DelayedAction::UnlockRetry => self.unlock_retry(),
                DelayedAction::FinishRestart => self.finish_restart().await,
            }
            return;
        }

        match self.quiz.countdown_tick(&mut self.state, timer) {
            TickOutcome::Stale => debug!("ignoring stale timer {timer}"),
            TickOutcome::Remaining(secs) => {
                self.presenter.show_countdown(secs);
                self.timers.schedule(timer, self.options.countdown_tick);
            }
            TickOutcome::Expired(outcome) => {
                info!("time limit reached");
                self.apply_outcome(&outcome).await;
            }
        }
    }

    /// Snapshot of the engine plus what the session store currently holds.
    pub async fn snapshot(&mut self) -> EngineSnapshot {
        let has_session = self.reporter.has_session();
        let (lesson_status, score_raw, suspend_data) = if has_session {
            let suspend = self.reporter.read(cmi::SUSPEND_DATA).await;
            (
                self.reporter.read(cmi::LESSON_STATUS).await,
                self.reporter.read(cmi::SCORE_RAW).await,
                suspend.chars().take(SNAPSHOT_SUSPEND_CHARS).collect(),
            )
        } else {
            let preview = String::from("(preview)");
            (preview.clone(), preview.clone(), preview)
        };

        EngineSnapshot {
            has_session,
            lesson_status,
            score_raw,
            suspend_data,
            disable_seeking: self
                .config
                .as_ref()
                .is_some_and(|config| config.settings().disable_seeking()),
            last_allowed_time: (self.state.last_allowed_time() * 100.0).round() / 100.0,
            asked: self.state.asked().map(|id| id.as_str().to_owned()).collect(),
            score: self.state.score(),
            in_question: self.state.in_question(),
            phase: self.quiz.phase(),
        }
    }

    /// Decode the resume token last stored in the session, if any.
    ///
    /// The engine never restores from it; hosts may offer it to the learner.
    pub async fn resume_hint(&mut self) -> Option<ResumeHint> {
        let raw = self.reporter.read(cmi::SUSPEND_DATA).await;
        match ResumeToken::from_raw(raw).parse() {
            Ok(hint) => Some(hint),
            Err(err) => {
                debug!("no usable resume token: {err}");
                None
            }
        }
    }

    // ─── internals ─────────────────────────────────────────────────────────────

    fn present_due(&mut self, position: f64) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        let scheduler = InteractionScheduler::new(config.catalog());
        let Some(due) = scheduler.next_due(&mut self.state, position) else {
            return;
        };

        let limit = config.settings().time_limit_secs();
        let countdown = if limit > 0 {
            let timer = TimerId::new(self.next_timer);
            self.next_timer += 1;
            Some(Countdown::new(timer, limit))
        } else {
            None
        };

        let attempt = match self.quiz.present(&mut self.state, due, countdown) {
            Ok(attempt) => attempt,
            Err(err) => {
                warn!("could not present interaction: {err}");
                return;
            }
        };

        self.playback.pause();
        let interaction = attempt.interaction();
        self.presenter.render_question(&QuestionView {
            prompt: interaction.prompt(),
            choices: interaction.choices(),
            ordinal: attempt.ordinal(),
            total: attempt.total(),
        });
        self.presenter.set_continue_visible(false);
        self.presenter.set_choices_enabled(true);
        match attempt.countdown() {
            Some(countdown) => {
                self.presenter.show_countdown(countdown.remaining_secs());
                self.timers
                    .schedule(countdown.timer(), self.options.countdown_tick);
            }
            None => self.presenter.hide_countdown(),
        }
    }

    async fn apply_outcome(&mut self, outcome: &AnswerOutcome) {
        self.presenter.set_choices_enabled(false);
        if let Some(timer) = outcome.cancelled_timer {
            self.timers.cancel(timer);
        }
        self.presenter.hide_countdown();
        self.presenter.render_feedback(&FeedbackView {
            correct: outcome.correct,
            timed_out: outcome.timed_out(),
            explanation: outcome.explanation.as_deref(),
        });

        match outcome.follow_up {
            FollowUp::OfferContinue => self.presenter.set_continue_visible(true),
            FollowUp::RetryAfterDelay => {
                self.presenter.set_continue_visible(false);
                self.defer(DelayedAction::UnlockRetry, self.options.retry_delay);
            }
            FollowUp::RestartAfterDelay => {
                self.presenter.set_continue_visible(false);
                self.defer(DelayedAction::FinishRestart, self.options.restart_delay);
            }
        }

        if outcome.correct {
            self.refresh_score();
        }
        self.report().await;
    }

    fn defer(&mut self, action: DelayedAction, after: Duration) {
        let timer = self.allocate_timer();
        if let Some(previous) = self.pending.replace(PendingDelay { timer, action }) {
            self.timers.cancel(previous.timer);
        }
        self.timers.schedule(timer, after);
    }

    fn unlock_retry(&mut self) {
        match self.quiz.unlock_retry() {
            Ok(_) => self.presenter.set_choices_enabled(true),
            Err(err) => debug!("retry unlock skipped: {err}"),
        }
    }

    async fn finish_restart(&mut self) {
        match self.quiz.finish_restart(&mut self.state) {
            Ok(()) => {
                info!("attempt restarted after a wrong answer");
                self.after_restart().await;
            }
            Err(err) => debug!("delayed restart skipped: {err}"),
        }
    }

    async fn after_restart(&mut self) {
        self.presenter.hide_countdown();
        self.presenter.set_continue_visible(false);
        self.presenter.hide_question();
        self.refresh_score();
        SeekGuard::request_position(&mut self.state, 0.0);
        self.force_position(0.0);
        self.playback.resume();
        self.report().await;
    }

    fn force_position(&mut self, position: f64) {
        match self.playback.force_position(position) {
            Ok(()) => SeekGuard::correction_applied(&mut self.state),
            Err(err) => {
                warn!("could not move playback to {position}: {err}; retrying on next update");
            }
        }
    }

    fn refresh_score(&mut self) {
        match self.config.as_ref() {
            Some(config) if config.settings().show_score() => self
                .presenter
                .render_score(self.state.score(), config.total_interactions()),
            _ => self.presenter.clear_score(),
        }
    }

    async fn report(&mut self) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        let record = ProgressRecord::derive(
            &self.state,
            config.total_interactions(),
            config.settings().mastery_score(),
            self.options.resume_token_limit,
        );
        self.reporter.report(&record).await;
    }

    fn allocate_timer(&mut self) -> TimerId {
        let timer = TimerId::new(self.next_timer);
        self.next_timer += 1;
        timer
    }
}
