use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("mastery score must be between 0 and 100, got {provided}")]
    InvalidMasteryScore { provided: u32 },
}

//
// ─── WRONG ACTION ──────────────────────────────────────────────────────────────
//

/// What happens after a wrong answer when a correct one is required.
///
/// Unknown values are preserved as `Other` and recover exactly like `Restart`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WrongAction {
    #[default]
    Restart,
    Retry,
    Other(String),
}

impl WrongAction {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            WrongAction::Restart => "restart",
            WrongAction::Retry => "retry",
            WrongAction::Other(raw) => raw,
        }
    }

    /// True when a wrong answer rewinds the whole attempt.
    #[must_use]
    pub fn restarts_attempt(&self) -> bool {
        !matches!(self, WrongAction::Retry)
    }
}

impl From<String> for WrongAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "restart" => WrongAction::Restart,
            "retry" => WrongAction::Retry,
            _ => WrongAction::Other(value),
        }
    }
}

impl From<WrongAction> for String {
    fn from(value: WrongAction) -> Self {
        match value {
            WrongAction::Other(raw) => raw,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for WrongAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Default mastery percentage when the lesson document does not set one.
pub const DEFAULT_MASTERY_SCORE: u8 = 70;

/// Playback and grading policy for one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct LessonSettings {
    disable_seeking: bool,
    time_limit_secs: u32,
    require_correct_to_continue: bool,
    wrong_action: WrongAction,
    show_score: bool,
    mastery_score: u8,
}

/// Raw settings as they appear in the lesson document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonSettingsDraft {
    pub disable_seeking: bool,
    pub time_limit_sec: u32,
    pub require_correct_to_continue: bool,
    pub wrong_action: Option<WrongAction>,
    pub show_score: bool,
    pub mastery_score: Option<u32>,
}

impl LessonSettingsDraft {
    /// Validate the draft into settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidMasteryScore` if the mastery score exceeds 100.
    pub fn validate(self) -> Result<LessonSettings, SettingsError> {
        let mastery_score = match self.mastery_score {
            None => DEFAULT_MASTERY_SCORE,
            Some(raw) => u8::try_from(raw)
                .ok()
                .filter(|score| *score <= 100)
                .ok_or(SettingsError::InvalidMasteryScore { provided: raw })?,
        };

        Ok(LessonSettings {
            disable_seeking: self.disable_seeking,
            time_limit_secs: self.time_limit_sec,
            require_correct_to_continue: self.require_correct_to_continue,
            wrong_action: self.wrong_action.unwrap_or_default(),
            show_score: self.show_score,
            mastery_score,
        })
    }
}

impl LessonSettings {
    #[must_use]
    pub fn disable_seeking(&self) -> bool {
        self.disable_seeking
    }

    /// Countdown length per question; zero disables the countdown.
    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn require_correct_to_continue(&self) -> bool {
        self.require_correct_to_continue
    }

    #[must_use]
    pub fn wrong_action(&self) -> &WrongAction {
        &self.wrong_action
    }

    #[must_use]
    pub fn show_score(&self) -> bool {
        self.show_score
    }

    #[must_use]
    pub fn mastery_score(&self) -> u8 {
        self.mastery_score
    }

    #[must_use]
    pub fn with_disable_seeking(mut self, value: bool) -> Self {
        self.disable_seeking = value;
        self
    }

    #[must_use]
    pub fn with_time_limit_secs(mut self, value: u32) -> Self {
        self.time_limit_secs = value;
        self
    }

    #[must_use]
    pub fn with_require_correct(mut self, value: bool) -> Self {
        self.require_correct_to_continue = value;
        self
    }

    #[must_use]
    pub fn with_wrong_action(mut self, value: WrongAction) -> Self {
        self.wrong_action = value;
        self
    }

    #[must_use]
    pub fn with_show_score(mut self, value: bool) -> Self {
        self.show_score = value;
        self
    }

    /// Override the mastery score, clamped to 100.
    #[must_use]
    pub fn with_mastery_score(mut self, value: u8) -> Self {
        self.mastery_score = value.min(100);
        self
    }
}

impl Default for LessonSettings {
    fn default() -> Self {
        Self {
            disable_seeking: false,
            time_limit_secs: 0,
            require_correct_to_continue: false,
            wrong_action: WrongAction::Restart,
            show_score: false,
            mastery_score: DEFAULT_MASTERY_SCORE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_wrong_action_is_preserved_and_restarts() {
        let action: WrongAction = serde_json::from_str("\"reload\"").unwrap();
        assert_eq!(action, WrongAction::Other("reload".into()));
        assert!(action.restarts_attempt());
        assert!(!WrongAction::Retry.restarts_attempt());
    }

    #[test]
    fn draft_defaults_match_lesson_defaults() {
        let draft: LessonSettingsDraft = serde_json::from_str("{}").unwrap();
        assert_eq!(draft.validate().unwrap(), LessonSettings::default());
    }

    #[test]
    fn draft_reads_camel_case_fields() {
        let draft: LessonSettingsDraft = serde_json::from_str(
            r#"{"disableSeeking":true,"timeLimitSec":15,"requireCorrectToContinue":true,
                "wrongAction":"retry","showScore":true,"masteryScore":80}"#,
        )
        .unwrap();
        let settings = draft.validate().unwrap();
        assert!(settings.disable_seeking());
        assert_eq!(settings.time_limit_secs(), 15);
        assert!(settings.require_correct_to_continue());
        assert_eq!(settings.wrong_action(), &WrongAction::Retry);
        assert!(settings.show_score());
        assert_eq!(settings.mastery_score(), 80);
    }

    #[test]
    fn mastery_above_hundred_is_rejected() {
        let draft = LessonSettingsDraft {
            mastery_score: Some(101),
            ..LessonSettingsDraft::default()
        };
        assert_eq!(
            draft.validate().unwrap_err(),
            SettingsError::InvalidMasteryScore { provided: 101 }
        );
    }
}
