use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::model::{Interaction, LessonSettings, SessionState, TimerId, WrongAction};
use crate::scheduler::DueInteraction;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("a question is already active (phase: {phase:?})")]
    AlreadyActive { phase: QuizPhase },

    #[error("no question is awaiting an answer (phase: {phase:?})")]
    NotPresented { phase: QuizPhase },

    #[error("choice {index} is outside the {len} available choices")]
    ChoiceOutOfRange { index: usize, len: usize },

    #[error("continue is not offered (phase: {phase:?})")]
    ContinueUnavailable { phase: QuizPhase },

    #[error("question is not locked for retry (phase: {phase:?})")]
    NotLockedForRetry { phase: QuizPhase },

    #[error("no restart is pending (phase: {phase:?})")]
    NotRestarting { phase: QuizPhase },
}

//
// ─── STATES ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of the single active question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    #[default]
    Idle,
    /// Choices are enabled and an answer is awaited.
    Presented,
    /// Answered correctly; waiting for continue.
    Correct,
    /// Answered incorrectly without a required correct answer; waiting for continue.
    Incorrect,
    /// Wrong answer under the retry policy; choices re-enable after a delay.
    LockedRetry,
    /// Wrong answer under the restart policy; the attempt rewinds after a delay.
    Restarting,
}

/// Countdown owned by the active attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    timer: TimerId,
    remaining_secs: u32,
}

impl Countdown {
    #[must_use]
    pub fn new(timer: TimerId, secs: u32) -> Self {
        Self {
            timer,
            remaining_secs: secs,
        }
    }

    #[must_use]
    pub fn timer(&self) -> TimerId {
        self.timer
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    fn tick(&mut self) -> u32 {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        self.remaining_secs
    }
}

/// The question currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAttempt {
    interaction: Interaction,
    index: usize,
    total: usize,
    countdown: Option<Countdown>,
}

impl ActiveAttempt {
    #[must_use]
    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// One-based question number.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }
}

/// What the caller must do after an answer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// Show the continue action; playback resumes on continue.
    OfferContinue,
    /// Re-enable the same choices after the retry delay.
    RetryAfterDelay,
    /// Rewind the attempt after the restart delay.
    RestartAfterDelay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// `None` when the countdown expired.
    pub chosen: Option<usize>,
    pub explanation: Option<String>,
    pub follow_up: FollowUp,
    /// Countdown timer stopped by this answer, to be cancelled by the host.
    pub cancelled_timer: Option<TimerId>,
}

impl AnswerOutcome {
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.chosen.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick does not belong to the live countdown; ignore it.
    Stale,
    Remaining(u32),
    Expired(AnswerOutcome),
}

enum Answer {
    Choice(usize),
    TimedOut,
}

//
// ─── MACHINE ───────────────────────────────────────────────────────────────────
//

/// Question lifecycle and wrong-answer policy.
#[derive(Debug, Clone)]
pub struct QuizMachine {
    phase: QuizPhase,
    attempt: Option<ActiveAttempt>,
    require_correct: bool,
    wrong_action: WrongAction,
}

impl QuizMachine {
    #[must_use]
    pub fn new(settings: &LessonSettings) -> Self {
        Self {
            phase: QuizPhase::Idle,
            attempt: None,
            require_correct: settings.require_correct_to_continue(),
            wrong_action: settings.wrong_action().clone(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&ActiveAttempt> {
        self.attempt.as_ref()
    }

    /// `IDLE -> PRESENTED`. Marks the session as in-question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyActive` unless the machine is idle.
    pub fn present(
        &mut self,
        state: &mut SessionState,
        due: DueInteraction<'_>,
        countdown: Option<Countdown>,
    ) -> Result<&ActiveAttempt, QuizError> {
        if self.phase != QuizPhase::Idle {
            return Err(QuizError::AlreadyActive { phase: self.phase });
        }

        state.enter_question();
        self.phase = QuizPhase::Presented;
        debug!("presenting `{}` ({}/{})", due.interaction.id(), due.ordinal(), due.total);

        Ok(&*self.attempt.insert(ActiveAttempt {
            interaction: due.interaction.clone(),
            index: due.index,
            total: due.total,
            countdown,
        }))
    }

    /// `PRESENTED -> CORRECT | INCORRECT | LOCKED_RETRY | RESTARTING`.
    ///
    /// Stops the countdown; a later tick for it is reported as stale.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotPresented` if no answer is awaited and
    /// `QuizError::ChoiceOutOfRange` for an index outside the choice list.
    pub fn submit(
        &mut self,
        state: &mut SessionState,
        choice: usize,
    ) -> Result<AnswerOutcome, QuizError> {
        let len = match (&self.attempt, self.phase) {
            (Some(attempt), QuizPhase::Presented) => attempt.interaction.choices().len(),
            _ => return Err(QuizError::NotPresented { phase: self.phase }),
        };
        if choice >= len {
            return Err(QuizError::ChoiceOutOfRange { index: choice, len });
        }
        self.resolve(state, Answer::Choice(choice))
    }

    /// Advance the countdown by one tick. Expiry resolves the question as a wrong
    /// answer and always applies the wrong-answer policy.
    pub fn countdown_tick(&mut self, state: &mut SessionState, timer: TimerId) -> TickOutcome {
        if self.phase != QuizPhase::Presented {
            return TickOutcome::Stale;
        }
        let remaining = match self.attempt.as_mut().and_then(|a| a.countdown.as_mut()) {
            Some(countdown) if countdown.timer == timer => countdown.tick(),
            _ => return TickOutcome::Stale,
        };
        if remaining > 0 {
            return TickOutcome::Remaining(remaining);
        }
        match self.resolve(state, Answer::TimedOut) {
            Ok(outcome) => TickOutcome::Expired(outcome),
            Err(_) => TickOutcome::Stale,
        }
    }

    /// `CORRECT | INCORRECT -> IDLE`. Leaves the baseline untouched.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ContinueUnavailable` when continue is not offered.
    pub fn continue_playback(&mut self, state: &mut SessionState) -> Result<(), QuizError> {
        if !matches!(self.phase, QuizPhase::Correct | QuizPhase::Incorrect) {
            return Err(QuizError::ContinueUnavailable { phase: self.phase });
        }
        state.leave_question();
        self.attempt = None;
        self.phase = QuizPhase::Idle;
        Ok(())
    }

    /// `LOCKED_RETRY -> PRESENTED`, same attempt, nothing reset.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotLockedForRetry` outside the retry lock.
    pub fn unlock_retry(&mut self) -> Result<&ActiveAttempt, QuizError> {
        match (self.phase, self.attempt.as_ref()) {
            (QuizPhase::LockedRetry, Some(attempt)) => {
                self.phase = QuizPhase::Presented;
                Ok(attempt)
            }
            _ => Err(QuizError::NotLockedForRetry { phase: self.phase }),
        }
    }

    /// `RESTARTING -> IDLE`, rewinding the attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotRestarting` when no restart is pending.
    pub fn finish_restart(&mut self, state: &mut SessionState) -> Result<(), QuizError> {
        if self.phase != QuizPhase::Restarting {
            return Err(QuizError::NotRestarting { phase: self.phase });
        }
        self.restart(state);
        Ok(())
    }

    /// Manual restart from any phase. Returns the countdown timer that was running, if any.
    pub fn restart(&mut self, state: &mut SessionState) -> Option<TimerId> {
        let cancelled = self
            .attempt
            .take()
            .and_then(|attempt| attempt.countdown)
            .map(|countdown| countdown.timer);
        state.reset_attempt();
        self.phase = QuizPhase::Idle;
        cancelled
    }

    fn resolve(
        &mut self,
        state: &mut SessionState,
        answer: Answer,
    ) -> Result<AnswerOutcome, QuizError> {
        let Some(attempt) = self.attempt.as_mut() else {
            return Err(QuizError::NotPresented { phase: self.phase });
        };

        let (correct, chosen) = match answer {
            Answer::Choice(index) => (attempt.interaction.is_correct(index), Some(index)),
            Answer::TimedOut => (false, None),
        };
        let stopped = attempt.countdown.take().map(|countdown| countdown.timer);
        let cancelled_timer = if chosen.is_some() { stopped } else { None };
        let explanation = attempt.interaction.explain().map(str::to_owned);

        let follow_up = if correct {
            state.record_correct();
            self.phase = QuizPhase::Correct;
            FollowUp::OfferContinue
        } else if chosen.is_none() || self.require_correct {
            if self.wrong_action.restarts_attempt() {
                self.phase = QuizPhase::Restarting;
                FollowUp::RestartAfterDelay
            } else {
                self.phase = QuizPhase::LockedRetry;
                FollowUp::RetryAfterDelay
            }
        } else {
            self.phase = QuizPhase::Incorrect;
            FollowUp::OfferContinue
        };

        debug!("answer resolved: correct={correct} chosen={chosen:?} -> {:?}", self.phase);

        Ok(AnswerOutcome {
            correct,
            chosen,
            explanation,
            follow_up,
            cancelled_timer,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InteractionCatalog, InteractionId};
    use crate::scheduler::InteractionScheduler;

    fn catalog() -> InteractionCatalog {
        InteractionCatalog::new(vec![
            Interaction::new(
                "q1",
                10.0,
                "Pick b",
                vec!["a".into(), "b".into(), "c".into()],
                1,
                Some("b is right".into()),
            )
            .unwrap(),
            Interaction::new("q2", 20.0, "Pick a", vec!["a".into(), "b".into()], 0, None).unwrap(),
        ])
        .unwrap()
    }

    fn settings(require_correct: bool, wrong_action: WrongAction) -> LessonSettings {
        LessonSettings::default()
            .with_require_correct(require_correct)
            .with_wrong_action(wrong_action)
    }

    fn presented(
        settings: &LessonSettings,
        catalog: &InteractionCatalog,
        countdown: Option<Countdown>,
    ) -> (QuizMachine, SessionState) {
        let mut state = SessionState::new(true);
        let mut quiz = QuizMachine::new(settings);
        let due = InteractionScheduler::new(catalog)
            .next_due(&mut state, 10.0)
            .unwrap();
        quiz.present(&mut state, due, countdown).unwrap();
        (quiz, state)
    }

    #[test]
    fn present_enters_question() {
        let catalog = catalog();
        let (quiz, state) = presented(&settings(false, WrongAction::Restart), &catalog, None);
        assert_eq!(quiz.phase(), QuizPhase::Presented);
        assert!(state.in_question());
        let attempt = quiz.attempt().unwrap();
        assert_eq!(attempt.interaction().id().as_str(), "q1");
        assert_eq!(attempt.ordinal(), 1);
        assert_eq!(attempt.total(), 2);
    }

    #[test]
    fn present_twice_is_rejected() {
        let catalog = catalog();
        let (mut quiz, mut state) =
            presented(&settings(false, WrongAction::Restart), &catalog, None);
        let second = catalog.get(1).unwrap();
        let due = DueInteraction {
            index: 1,
            total: 2,
            interaction: second,
        };
        assert_eq!(
            quiz.present(&mut state, due, None).unwrap_err(),
            QuizError::AlreadyActive {
                phase: QuizPhase::Presented
            }
        );
    }

    #[test]
    fn correct_answer_scores_and_offers_continue() {
        let catalog = catalog();
        let (mut quiz, mut state) =
            presented(&settings(true, WrongAction::Restart), &catalog, None);
        let outcome = quiz.submit(&mut state, 1).unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.follow_up, FollowUp::OfferContinue);
        assert_eq!(outcome.explanation.as_deref(), Some("b is right"));
        assert_eq!(state.score(), 1);
        assert!(state.in_question());

        quiz.continue_playback(&mut state).unwrap();
        assert_eq!(quiz.phase(), QuizPhase::Idle);
        assert!(!state.in_question());
        assert_eq!(state.last_allowed_time(), 0.0);
    }

    #[test]
    fn wrong_answer_without_requirement_offers_continue_without_score() {
        let catalog = catalog();
        let (mut quiz, mut state) =
            presented(&settings(false, WrongAction::Restart), &catalog, None);
        let outcome = quiz.submit(&mut state, 0).unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.follow_up, FollowUp::OfferContinue);
        assert_eq!(quiz.phase(), QuizPhase::Incorrect);
        assert_eq!(state.score(), 0);
    }

    #[test]
    fn second_submit_is_rejected() {
        let catalog = catalog();
        let (mut quiz, mut state) =
            presented(&settings(false, WrongAction::Restart), &catalog, None);
        quiz.submit(&mut state, 1).unwrap();
        assert_eq!(
            quiz.submit(&mut state, 1).unwrap_err(),
            QuizError::NotPresented {
                phase: QuizPhase::Correct
            }
        );
        assert_eq!(state.score(), 1);
    }

    #[test]
    fn out_of_range_choice_keeps_question_open() {
        let catalog = catalog();
        let (mut quiz, mut state) =
            presented(&settings(false, WrongAction::Restart), &catalog, None);
        assert_eq!(
            quiz.submit(&mut state, 3).unwrap_err(),
            QuizError::ChoiceOutOfRange { index: 3, len: 3 }
        );
        assert_eq!(quiz.phase(), QuizPhase::Presented);
    }

    #[test]
    fn retry_policy_preserves_attempt() {
        let catalog = catalog();
        let (mut quiz, mut state) = presented(&settings(true, WrongAction::Retry), &catalog, None);
        let before = state.clone();

        let outcome = quiz.submit(&mut state, 2).unwrap();
        assert_eq!(outcome.follow_up, FollowUp::RetryAfterDelay);
        assert_eq!(quiz.phase(), QuizPhase::LockedRetry);
        assert!(quiz.submit(&mut state, 1).is_err());

        let attempt = quiz.unlock_retry().unwrap();
        assert_eq!(attempt.interaction().id().as_str(), "q1");
        assert_eq!(quiz.phase(), QuizPhase::Presented);
        assert_eq!(state, before);

        assert!(quiz.submit(&mut state, 1).unwrap().correct);
        assert_eq!(state.score(), 1);
    }

    #[test]
    fn restart_policy_and_unknown_action_rewind_attempt() {
        for action in [WrongAction::Restart, WrongAction::Other("reload".into())] {
            let catalog = catalog();
            let (mut quiz, mut state) = presented(&settings(true, action), &catalog, None);
            let outcome = quiz.submit(&mut state, 0).unwrap();
            assert_eq!(outcome.follow_up, FollowUp::RestartAfterDelay);
            assert_eq!(quiz.phase(), QuizPhase::Restarting);

            quiz.finish_restart(&mut state).unwrap();
            assert_eq!(quiz.phase(), QuizPhase::Idle);
            assert_eq!(state.asked_count(), 0);
            assert_eq!(state.score(), 0);
            assert!(!state.in_question());
            assert_eq!(state.last_allowed_time(), 0.0);
        }
    }

    #[test]
    fn answer_cancels_countdown_and_late_tick_is_stale() {
        let catalog = catalog();
        let timer = TimerId::new(7);
        let (mut quiz, mut state) = presented(
            &settings(true, WrongAction::Restart),
            &catalog,
            Some(Countdown::new(timer, 1)),
        );
        let outcome = quiz.submit(&mut state, 1).unwrap();
        assert_eq!(outcome.cancelled_timer, Some(timer));
        assert_eq!(quiz.countdown_tick(&mut state, timer), TickOutcome::Stale);
        assert_eq!(quiz.phase(), QuizPhase::Correct);
        assert_eq!(state.score(), 1);
    }

    #[test]
    fn expiry_applies_wrong_policy_even_without_requirement() {
        let catalog = catalog();
        let timer = TimerId::new(3);
        let (mut quiz, mut state) = presented(
            &settings(false, WrongAction::Retry),
            &catalog,
            Some(Countdown::new(timer, 2)),
        );
        assert_eq!(
            quiz.countdown_tick(&mut state, TimerId::new(99)),
            TickOutcome::Stale
        );
        assert_eq!(quiz.countdown_tick(&mut state, timer), TickOutcome::Remaining(1));
        let TickOutcome::Expired(outcome) = quiz.countdown_tick(&mut state, timer) else {
            panic!("countdown should expire");
        };
        assert!(outcome.timed_out());
        assert!(!outcome.correct);
        assert_eq!(outcome.follow_up, FollowUp::RetryAfterDelay);
        assert_eq!(outcome.cancelled_timer, None);
        assert_eq!(quiz.phase(), QuizPhase::LockedRetry);
        assert!(quiz.attempt().unwrap().countdown().is_none());
    }

    #[test]
    fn manual_restart_resets_from_any_phase() {
        let catalog = catalog();
        let timer = TimerId::new(1);
        let (mut quiz, mut state) = presented(
            &settings(false, WrongAction::Retry),
            &catalog,
            Some(Countdown::new(timer, 30)),
        );
        assert_eq!(quiz.restart(&mut state), Some(timer));
        assert_eq!(quiz.phase(), QuizPhase::Idle);
        assert_eq!(state, SessionState::new(true));

        let mut idle = QuizMachine::new(&LessonSettings::default());
        let mut fresh =
            SessionState::from_parts([InteractionId::new("q1")], 1, false, 15.0, false).unwrap();
        assert_eq!(idle.restart(&mut fresh), None);
        assert_eq!(fresh, SessionState::new(false));
    }

    #[test]
    fn continue_requires_answered_phase() {
        let catalog = catalog();
        let (mut quiz, mut state) = presented(&settings(true, WrongAction::Retry), &catalog, None);
        assert_eq!(
            quiz.continue_playback(&mut state).unwrap_err(),
            QuizError::ContinueUnavailable {
                phase: QuizPhase::Presented
            }
        );
        quiz.submit(&mut state, 0).unwrap();
        assert!(quiz.continue_playback(&mut state).is_err());
        assert!(quiz.finish_restart(&mut state).is_err());
    }
}
