use std::collections::HashSet;

use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::InteractionId;
use crate::model::interaction::{Interaction, InteractionDraft, InteractionError};
use crate::model::settings::{LessonSettings, LessonSettingsDraft, SettingsError};

/// Title used when the lesson document does not provide one.
pub const DEFAULT_TITLE: &str = "Interactive video lesson";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Fatal configuration problems. A lesson with one of these cannot schedule questions.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("lesson document is malformed: {0}")]
    Malformed(String),

    #[error("interaction id `{id}` appears more than once")]
    DuplicateId { id: InteractionId },

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Malformed(err.to_string())
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Ordered, id-unique collection of presentable interactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionCatalog {
    interactions: Vec<Interaction>,
}

impl InteractionCatalog {
    /// Build a catalog, preserving order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateId` if two interactions share an id.
    pub fn new(interactions: Vec<Interaction>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(interactions.len());
        for interaction in &interactions {
            if !seen.insert(interaction.id()) {
                return Err(ConfigError::DuplicateId {
                    id: interaction.id().clone(),
                });
            }
        }
        Ok(Self { interactions })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Interaction> {
        self.interactions.get(index)
    }

    #[must_use]
    pub fn contains(&self, id: &InteractionId) -> bool {
        self.interactions.iter().any(|q| q.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter()
    }
}

//
// ─── LESSON CONFIG ─────────────────────────────────────────────────────────────
//

/// An interaction dropped during validation, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInteraction {
    pub id: String,
    pub reason: InteractionError,
}

/// Lesson document exactly as deserialized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonConfigDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub settings: LessonSettingsDraft,
    #[serde(default)]
    pub interactions: Vec<InteractionDraft>,
}

impl LessonConfigDraft {
    /// Validate the document into an immutable lesson configuration.
    ///
    /// Interactions that cannot be presented are skipped and recorded; duplicate
    /// non-blank ids (among all interactions, including skipped ones) are fatal.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid settings or duplicate interaction ids.
    pub fn validate(self) -> Result<LessonConfig, ConfigError> {
        let settings = self.settings.validate()?;

        let mut seen = HashSet::with_capacity(self.interactions.len());
        let mut valid = Vec::with_capacity(self.interactions.len());
        let mut skipped = Vec::new();

        for draft in self.interactions {
            let raw_id = draft.id.clone().unwrap_or_default();
            if !raw_id.trim().is_empty() && !seen.insert(raw_id.clone()) {
                return Err(ConfigError::DuplicateId {
                    id: InteractionId::new(raw_id),
                });
            }
            match draft.validate() {
                Ok(interaction) => valid.push(interaction),
                Err(reason) => {
                    warn!("skipping interaction `{raw_id}`: {reason}");
                    skipped.push(SkippedInteraction { id: raw_id, reason });
                }
            }
        }

        let title = self
            .title
            .map(|title| title.trim().to_owned())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_owned());

        Ok(LessonConfig {
            title,
            settings,
            catalog: InteractionCatalog::new(valid)?,
            skipped,
        })
    }
}

/// Immutable lesson configuration, loaded once per session.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonConfig {
    title: String,
    settings: LessonSettings,
    catalog: InteractionCatalog,
    skipped: Vec<SkippedInteraction>,
}

impl LessonConfig {
    /// Parse and validate a lesson document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Malformed` if the JSON does not match the document
    /// shape, or any validation error from [`LessonConfigDraft::validate`].
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let draft: LessonConfigDraft = serde_json::from_str(raw)?;
        draft.validate()
    }

    /// Build a configuration from already validated parts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateId` if interaction ids collide.
    pub fn new(
        title: impl Into<String>,
        settings: LessonSettings,
        interactions: Vec<Interaction>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            title: title.into(),
            settings,
            catalog: InteractionCatalog::new(interactions)?,
            skipped: Vec::new(),
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn settings(&self) -> &LessonSettings {
        &self.settings
    }

    #[must_use]
    pub fn catalog(&self) -> &InteractionCatalog {
        &self.catalog
    }

    /// Number of interactions that can fire; the denominator for scoring.
    #[must_use]
    pub fn total_interactions(&self) -> usize {
        self.catalog.len()
    }

    #[must_use]
    pub fn skipped(&self) -> &[SkippedInteraction] {
        &self.skipped
    }
}
