#![forbid(unsafe_code)]

pub mod collaborators;
pub mod engine;
pub mod error;
pub mod reporter;
pub mod runner;
pub mod testing;

pub use lesson_core::Clock;

pub use collaborators::{
    Collaborators, FeedbackView, PlaybackControl, PlaybackError, Presenter, QuestionView,
    SessionMode, TimerHost,
};
pub use engine::{EngineOptions, EngineSnapshot, LessonEngine};
pub use error::{LessonError, RunnerError};
pub use reporter::ProgressReporter;
pub use runner::{LessonEvent, LessonHandle, LessonRunner, TokioTimerHost};
