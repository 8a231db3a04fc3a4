use thiserror::Error;

use crate::model::{ConfigError, ResumeTokenError, SessionStateError};
use crate::quiz::QuizError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    ResumeToken(#[from] ResumeTokenError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
}
