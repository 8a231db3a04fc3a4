use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::ids::InteractionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons an interaction cannot be presented.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum InteractionError {
    #[error("interaction id cannot be empty")]
    EmptyId,

    #[error("interaction is missing `{field}`")]
    MissingField { field: &'static str },

    #[error("trigger time must be a finite, non-negative number of seconds, got {provided}")]
    InvalidTime { provided: f64 },

    #[error("interaction needs at least two choices, got {len}")]
    TooFewChoices { len: usize },

    #[error("correct index must be a whole number, got {provided}")]
    NonIntegralCorrectIndex { provided: String },

    #[error("correct index {index} is outside the {len} available choices")]
    CorrectIndexOutOfRange { index: i64, len: usize },
}

//
// ─── INTERACTION ───────────────────────────────────────────────────────────────
//

/// A multiple-choice question pinned to a playback timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    id: InteractionId,
    time: f64,
    prompt: String,
    choices: Vec<String>,
    correct_index: usize,
    explain: Option<String>,
}

/// Raw interaction record from the lesson document.
///
/// Fields a single record can get wrong are kept loose so that one bad record
/// is skipped instead of rejecting the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub choices: Vec<String>,
    /// Any JSON value; `1` and `1.0` are both accepted.
    #[serde(default)]
    pub correct_index: Option<Value>,
    #[serde(default)]
    pub explain: Option<String>,
}

impl InteractionDraft {
    /// Validate the draft into a presentable interaction.
    ///
    /// # Errors
    ///
    /// Returns `InteractionError` when the id, time or correct index is missing,
    /// the id is blank, the time is negative or not finite, fewer than two
    /// choices exist, or the correct index is fractional or out of bounds.
    pub fn validate(self) -> Result<Interaction, InteractionError> {
        let id = self
            .id
            .ok_or(InteractionError::MissingField { field: "id" })?;
        let time = self
            .time
            .ok_or(InteractionError::MissingField { field: "time" })?;
        let correct_index = match self.correct_index {
            None | Some(Value::Null) => {
                return Err(InteractionError::MissingField {
                    field: "correctIndex",
                });
            }
            Some(value) => integral_index(&value)?,
        };

        build(id, time, self.prompt, self.choices, correct_index, self.explain)
    }
}

/// Whole-number JSON value as `i64`; `2.0` counts as `2`.
fn integral_index(value: &Value) -> Result<i64, InteractionError> {
    let non_integral = || InteractionError::NonIntegralCorrectIndex {
        provided: value.to_string(),
    };
    let Value::Number(number) = value else {
        return Err(non_integral());
    };
    if let Some(index) = number.as_i64() {
        return Ok(index);
    }
    match number.as_f64() {
        #[allow(clippy::cast_possible_truncation)]
        Some(float) if float.fract() == 0.0 && float.abs() < 9.0e15 => Ok(float as i64),
        _ => Err(non_integral()),
    }
}

fn build(
    id: String,
    time: f64,
    prompt: String,
    choices: Vec<String>,
    correct_index: i64,
    explain: Option<String>,
) -> Result<Interaction, InteractionError> {
    let id = InteractionId::new(id);
    if id.is_blank() {
        return Err(InteractionError::EmptyId);
    }
    if !time.is_finite() || time < 0.0 {
        return Err(InteractionError::InvalidTime { provided: time });
    }
    if choices.len() < 2 {
        return Err(InteractionError::TooFewChoices { len: choices.len() });
    }
    let index = usize::try_from(correct_index)
        .ok()
        .filter(|index| *index < choices.len())
        .ok_or(InteractionError::CorrectIndexOutOfRange {
            index: correct_index,
            len: choices.len(),
        })?;

    let explain = explain
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty());

    Ok(Interaction {
        id,
        time,
        prompt,
        choices,
        correct_index: index,
        explain,
    })
}

impl Interaction {
    /// Build an interaction directly.
    ///
    /// # Errors
    ///
    /// Same rules as [`InteractionDraft::validate`].
    pub fn new(
        id: impl Into<String>,
        time: f64,
        prompt: impl Into<String>,
        choices: Vec<String>,
        correct_index: usize,
        explain: Option<String>,
    ) -> Result<Self, InteractionError> {
        build(
            id.into(),
            time,
            prompt.into(),
            choices,
            i64::try_from(correct_index).unwrap_or(i64::MAX),
            explain,
        )
    }

    #[must_use]
    pub fn id(&self) -> &InteractionId {
        &self.id
    }

    /// Trigger position in seconds.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn explain(&self) -> Option<&str> {
        self.explain.as_deref()
    }

    #[must_use]
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> InteractionDraft {
        InteractionDraft {
            id: Some("q1".into()),
            time: Some(10.0),
            prompt: "2 + 2?".into(),
            choices: vec!["3".into(), "4".into()],
            correct_index: Some(Value::from(1)),
            explain: Some("  basic arithmetic ".into()),
        }
    }

    #[test]
    fn valid_draft_trims_explanation() {
        let interaction = draft().validate().unwrap();
        assert_eq!(interaction.explain(), Some("basic arithmetic"));
        assert!(interaction.is_correct(1));
        assert!(!interaction.is_correct(0));
    }

    #[test]
    fn out_of_range_correct_index_is_rejected() {
        let mut bad = draft();
        bad.correct_index = Some(Value::from(2));
        assert_eq!(
            bad.validate().unwrap_err(),
            InteractionError::CorrectIndexOutOfRange { index: 2, len: 2 }
        );

        let mut negative = draft();
        negative.correct_index = Some(Value::from(-1));
        assert!(matches!(
            negative.validate(),
            Err(InteractionError::CorrectIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn empty_choices_are_rejected() {
        let mut bad = draft();
        bad.choices.clear();
        assert_eq!(
            bad.validate().unwrap_err(),
            InteractionError::TooFewChoices { len: 0 }
        );
    }

    #[test]
    fn negative_time_is_rejected() {
        let mut bad = draft();
        bad.time = Some(-0.5);
        assert!(matches!(
            bad.validate(),
            Err(InteractionError::InvalidTime { .. })
        ));
    }

    #[test]
    fn blank_id_is_rejected() {
        let mut bad = draft();
        bad.id = Some(" ".into());
        assert_eq!(bad.validate().unwrap_err(), InteractionError::EmptyId);
    }

    #[test]
    fn whole_float_correct_index_is_accepted() {
        let mut draft = draft();
        draft.correct_index = Some(serde_json::json!(1.0));
        assert_eq!(draft.validate().unwrap().correct_index(), 1);
    }

    #[test]
    fn fractional_or_non_numeric_correct_index_is_rejected() {
        let mut fractional = draft();
        fractional.correct_index = Some(serde_json::json!(0.5));
        assert_eq!(
            fractional.validate().unwrap_err(),
            InteractionError::NonIntegralCorrectIndex {
                provided: "0.5".into()
            }
        );

        let mut text = draft();
        text.correct_index = Some(serde_json::json!("1"));
        assert!(matches!(
            text.validate(),
            Err(InteractionError::NonIntegralCorrectIndex { .. })
        ));
    }

    #[test]
    fn missing_fields_are_named() {
        let mut no_index = draft();
        no_index.correct_index = None;
        assert_eq!(
            no_index.validate().unwrap_err(),
            InteractionError::MissingField {
                field: "correctIndex"
            }
        );

        let mut null_index = draft();
        null_index.correct_index = Some(Value::Null);
        assert_eq!(
            null_index.validate().unwrap_err(),
            InteractionError::MissingField {
                field: "correctIndex"
            }
        );

        let mut no_id = draft();
        no_id.id = None;
        assert_eq!(
            no_id.validate().unwrap_err(),
            InteractionError::MissingField { field: "id" }
        );

        let mut no_time = draft();
        no_time.time = None;
        assert_eq!(
            no_time.validate().unwrap_err(),
            InteractionError::MissingField { field: "time" }
        );
    }
}
