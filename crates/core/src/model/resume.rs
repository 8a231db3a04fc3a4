use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::InteractionId;

/// Default upper bound for serialized resume data, in characters.
pub const DEFAULT_RESUME_TOKEN_LIMIT: usize = 3_500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResumeTokenError {
    #[error("resume token is empty")]
    Empty,

    #[error("resume token cannot be decoded (possibly truncated): {0}")]
    Undecodable(String),
}

#[derive(Serialize)]
struct Payload<'a> {
    asked: Vec<&'a str>,
    score: u32,
}

/// Decoded contents of an intact resume token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResumeHint {
    pub asked: Vec<InteractionId>,
    pub score: u32,
}

/// Bounded serialized snapshot of `{asked, score}`.
///
/// Best-effort only: anything past the limit is cut off, so a long asked list
/// may not decode again.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResumeToken(String);

impl ResumeToken {
    /// Serialize and truncate to at most `max_chars` characters. Never fails.
    #[must_use]
    pub fn encode<'a>(
        asked: impl IntoIterator<Item = &'a InteractionId>,
        score: u32,
        max_chars: usize,
    ) -> Self {
        let payload = Payload {
            asked: asked.into_iter().map(InteractionId::as_str).collect(),
            score,
        };
        let mut encoded = match serde_json::to_string(&payload) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("resume token could not be serialized: {err}");
                String::new()
            }
        };
        if let Some((cut, _)) = encoded.char_indices().nth(max_chars) {
            encoded.truncate(cut);
        }
        Self(encoded)
    }

    /// Wrap a raw value read back from a session store.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// Decode the token if it is intact.
    ///
    /// # Errors
    ///
    /// Returns `ResumeTokenError::Empty` for an empty token and
    /// `ResumeTokenError::Undecodable` for truncated or foreign data.
    pub fn parse(&self) -> Result<ResumeHint, ResumeTokenError> {
        if self.0.trim().is_empty() {
            return Err(ResumeTokenError::Empty);
        }
        serde_json::from_str(&self.0).map_err(|err| ResumeTokenError::Undecodable(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<InteractionId> {
        raw.iter().map(|id| InteractionId::new(*id)).collect()
    }

    #[test]
    fn encodes_asked_in_order_with_score() {
        let asked = ids(&["q2", "q1"]);
        let token = ResumeToken::encode(&asked, 1, DEFAULT_RESUME_TOKEN_LIMIT);
        assert_eq!(token.as_str(), r#"{"asked":["q2","q1"],"score":1}"#);
        assert_eq!(
            token.parse().unwrap(),
            ResumeHint {
                asked: asked.clone(),
                score: 1
            }
        );
    }

    #[test]
    fn truncation_respects_limit_and_char_boundaries() {
        let asked = ids(&["ünïcødé-question", "another-long-id", "and-one-more"]);
        for limit in [0, 1, 7, 15, 16, 17, 40] {
            let token = ResumeToken::encode(&asked, 3, limit);
            assert!(token.char_len() <= limit);
        }
    }

    #[test]
    fn truncated_token_fails_to_parse_without_panicking() {
        let asked = ids(&["q1", "q2", "q3"]);
        let token = ResumeToken::encode(&asked, 2, 12);
        assert!(matches!(
            token.parse(),
            Err(ResumeTokenError::Undecodable(_))
        ));
        assert_eq!(ResumeToken::default().parse(), Err(ResumeTokenError::Empty));
    }
}
