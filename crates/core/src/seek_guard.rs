//! No-skip policy over the playback position stream.
//!
//! The guard keeps `last_allowed_time` at the latest position reached by natural
//! playback and, when seeking is blocked, answers every user seek with a forced
//! return to that baseline.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::SessionState;

/// Who moved the playhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekSource {
    /// A correction or restart the engine performed itself.
    Engine,
    User,
}

/// Outcome of a seek attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekVerdict {
    Allow,
    /// Force playback back to `position`.
    Reject { position: f64 },
}

/// Outcome of a natural position update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdvanceVerdict {
    /// Baseline moved to the reported position.
    Advanced,
    /// A question is open; the baseline stays where it is.
    Held,
    /// An earlier correction never applied; force playback to `position` again.
    Reassert { position: f64 },
}

/// Seek guard transitions over a [`SessionState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SeekGuard;

impl SeekGuard {
    /// Handle a position-advanced event.
    pub fn on_position_advanced(state: &mut SessionState, position: f64) -> AdvanceVerdict {
        if let Some(target) = state.pending_correction() {
            return AdvanceVerdict::Reassert { position: target };
        }
        if state.in_question() {
            return AdvanceVerdict::Held;
        }
        if !position.is_finite() || position < 0.0 {
            debug!("ignoring invalid playback position {position}");
            return AdvanceVerdict::Held;
        }
        state.set_last_allowed_time(position);
        AdvanceVerdict::Advanced
    }

    /// Handle a seek-attempted event.
    ///
    /// Engine seeks always pass. With the guard armed, every user seek is
    /// rejected in either direction, question open or not.
    pub fn on_seek_attempted(
        state: &mut SessionState,
        target: f64,
        source: SeekSource,
    ) -> SeekVerdict {
        if !state.block_seek() || source == SeekSource::Engine {
            return SeekVerdict::Allow;
        }
        let baseline = state.last_allowed_time();
        debug!("rejecting user seek to {target}, restoring {baseline}");
        state.set_pending_correction(Some(baseline));
        SeekVerdict::Reject { position: baseline }
    }

    /// Ask for the playhead to be moved to `position` by the engine.
    ///
    /// While the guard is armed the request stays pending until
    /// [`SeekGuard::correction_applied`] confirms it.
    pub fn request_position(state: &mut SessionState, position: f64) {
        if state.block_seek() {
            state.set_pending_correction(Some(position));
        }
    }

    /// The playback resource accepted the forced position.
    pub fn correction_applied(state: &mut SessionState) {
        state.set_pending_correction(None);
    }
}
