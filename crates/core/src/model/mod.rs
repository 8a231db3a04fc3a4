mod config;
mod ids;
mod interaction;
mod resume;
mod session;
mod settings;

pub use ids::{InteractionId, ParseIdError, TimerId};

pub use config::{
    ConfigError, DEFAULT_TITLE, InteractionCatalog, LessonConfig, LessonConfigDraft,
    SkippedInteraction,
};
pub use interaction::{Interaction, InteractionDraft, InteractionError};
pub use resume::{DEFAULT_RESUME_TOKEN_LIMIT, ResumeHint, ResumeToken, ResumeTokenError};
pub use session::{SessionState, SessionStateError};
pub use settings::{
    DEFAULT_MASTERY_SCORE, LessonSettings, LessonSettingsDraft, SettingsError, WrongAction,
};
