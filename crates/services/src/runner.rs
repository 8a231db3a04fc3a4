use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use lesson_core::Clock;
use lesson_core::model::{LessonConfig, TimerId};
use lesson_core::seek_guard::SeekSource;
use storage::repository::SessionStore;

use crate::collaborators::{Collaborators, PlaybackControl, Presenter, TimerHost};
use crate::engine::{EngineOptions, LessonEngine};
use crate::error::RunnerError;

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Everything that can happen to a running lesson, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LessonEvent {
    PositionAdvanced { position: f64 },
    SeekAttempted { target: f64, source: SeekSource },
    SubmitAnswer { choice: usize },
    Continue,
    Restart,
    TimerFired { timer: TimerId },
    Shutdown,
}

//
// ─── TIMERS ────────────────────────────────────────────────────────────────────
//

/// `TimerHost` backed by tokio sleeps that post `TimerFired` into the event queue.
pub struct TokioTimerHost {
    events: UnboundedSender<LessonEvent>,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioTimerHost {
    #[must_use]
    pub fn new(events: UnboundedSender<LessonEvent>) -> Self {
        Self {
            events,
            tasks: HashMap::new(),
        }
    }

    /// Number of timers still armed.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl TimerHost for TokioTimerHost {
    fn schedule(&mut self, timer: TimerId, after: Duration) {
        self.tasks.retain(|_, task| !task.is_finished());

        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if events.send(LessonEvent::TimerFired { timer }).is_err() {
                debug!("timer {timer} fired after the runner stopped");
            }
        });
        if let Some(previous) = self.tasks.insert(timer, task) {
            previous.abort();
        }
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(task) = self.tasks.remove(&timer) {
            task.abort();
        }
    }
}

impl Drop for TokioTimerHost {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

//
// ─── HANDLE ────────────────────────────────────────────────────────────────────
//

/// Cloneable sender side of a running lesson.
#[derive(Debug, Clone)]
pub struct LessonHandle {
    events: UnboundedSender<LessonEvent>,
}

impl LessonHandle {
    /// Queue an event.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Closed` once the runner has stopped.
    pub fn send(&self, event: LessonEvent) -> Result<(), RunnerError> {
        self.events.send(event).map_err(|_| RunnerError::Closed)
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Closed` once the runner has stopped.
    pub fn position_advanced(&self, position: f64) -> Result<(), RunnerError> {
        self.send(LessonEvent::PositionAdvanced { position })
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Closed` once the runner has stopped.
    pub fn seek_attempted(&self, target: f64, source: SeekSource) -> Result<(), RunnerError> {
        self.send(LessonEvent::SeekAttempted { target, source })
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Closed` once the runner has stopped.
    pub fn submit_answer(&self, choice: usize) -> Result<(), RunnerError> {
        self.send(LessonEvent::SubmitAnswer { choice })
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Closed` once the runner has stopped.
    pub fn shutdown(&self) -> Result<(), RunnerError> {
        self.send(LessonEvent::Shutdown)
    }
}

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// Owns a `LessonEngine` and feeds it events one at a time.
pub struct LessonRunner {
    engine: LessonEngine,
    events: UnboundedReceiver<LessonEvent>,
}

impl LessonRunner {
    /// Build a runner whose timers are tokio tasks.
    ///
    /// Timers are spawned lazily, so this may be called outside a runtime.
    #[must_use]
    pub fn new(
        config: Option<LessonConfig>,
        playback: Box<dyn PlaybackControl>,
        presenter: Box<dyn Presenter>,
        store: Arc<dyn SessionStore>,
        clock: Clock,
        options: EngineOptions,
    ) -> (Self, LessonHandle) {
        let (sender, events) = mpsc::unbounded_channel();
        let collaborators = Collaborators {
            playback,
            presenter,
            timers: Box::new(TokioTimerHost::new(sender.clone())),
        };
        let engine = LessonEngine::new(config, collaborators, store, clock).with_options(options);
        (Self { engine, events }, LessonHandle { events: sender })
    }

    /// Start the lesson and process events until `Shutdown` or until every
    /// handle is dropped. Returns the engine for inspection.
    pub async fn run(mut self) -> LessonEngine {
        self.engine.start().await;

        while let Some(event) = self.events.recv().await {
            if matches!(event, LessonEvent::Shutdown) {
                info!("lesson runner shutting down");
                break;
            }
            self.dispatch(event).await;
        }
        self.engine
    }

    async fn dispatch(&mut self, event: LessonEvent) {
        debug!("event: {event:?}");
        match event {
            LessonEvent::PositionAdvanced { position } => self.engine.position_advanced(position),
            LessonEvent::SeekAttempted { target, source } => {
                self.engine.seek_attempted(target, source);
            }
            LessonEvent::SubmitAnswer { choice } => {
                if let Err(err) = self.engine.submit_answer(choice).await {
                    warn!("answer ignored: {err}");
                }
            }
            LessonEvent::Continue => {
                if let Err(err) = self.engine.continue_playback() {
                    warn!("continue ignored: {err}");
                }
            }
            LessonEvent::Restart => self.engine.restart().await,
            LessonEvent::TimerFired { timer } => self.engine.timer_fired(timer).await,
            LessonEvent::Shutdown => {}
        }
    }
}
