use log::debug;

use crate::model::{Interaction, InteractionCatalog, SessionState};

/// An interaction whose trigger time has been reached, ready to present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueInteraction<'a> {
    /// Zero-based position in the catalog.
    pub index: usize,
    pub total: usize,
    pub interaction: &'a Interaction,
}

impl DueInteraction<'_> {
    /// One-based question number for display.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }
}

/// Fires catalog interactions against the live playback position.
///
/// At most one interaction fires per position update. When a jump crosses
/// several thresholds at once, catalog order decides which fires first; the
/// rest fire on later updates.
#[derive(Debug, Clone, Copy)]
pub struct InteractionScheduler<'a> {
    catalog: &'a InteractionCatalog,
}

impl<'a> InteractionScheduler<'a> {
    #[must_use]
    pub fn new(catalog: &'a InteractionCatalog) -> Self {
        Self { catalog }
    }

    /// Find the first not-yet-asked interaction with `time <= position` and mark it asked.
    ///
    /// Returns `None` while a question is open.
    pub fn next_due(&self, state: &mut SessionState, position: f64) -> Option<DueInteraction<'a>> {
        if state.in_question() {
            return None;
        }

        let total = self.catalog.len();
        let (index, interaction) = self
            .catalog
            .iter()
            .enumerate()
            .find(|(_, q)| !state.is_asked(q.id()) && q.time() <= position)?;

        state.mark_asked(interaction.id().clone());
        debug!(
            "interaction `{}` due at {position} ({}/{total})",
            interaction.id(),
            index + 1
        );

        Some(DueInteraction {
            index,
            total,
            interaction,
        })
    }

    /// True once every interaction in the catalog has been asked this attempt.
    #[must_use]
    pub fn exhausted(&self, state: &SessionState) -> bool {
        self.catalog.iter().all(|q| state.is_asked(q.id()))
    }
}
