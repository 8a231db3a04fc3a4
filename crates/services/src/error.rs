//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::quiz::QuizError;

/// Errors emitted by `LessonEngine` for learner input that cannot be applied.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonError {
    #[error("no lesson configuration is loaded")]
    NoLesson,
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

/// Errors emitted while talking to a running `LessonRunner`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    #[error("lesson runner has stopped")]
    Closed,
}
