//! Round tracker: turns successive snapshots into transition events.

use tracing::{info, warn};

use crate::types::{Phase, RoundSnapshot, TransitionEvent};

/// Remembers the last `(round_id, phase)` seen by the poll loop.
#[derive(Debug, Default)]
pub struct RoundTracker {
    last: Option<(u64, Phase)>,
}

impl RoundTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `snapshot` against the previous observation.
    ///
    /// The first observation only seeds the tracker. A new round id wins
    /// over a phase change reported in the same poll.
    pub fn observe(&mut self, snapshot: &RoundSnapshot) -> Option<TransitionEvent> {
        let current = (snapshot.round_id, snapshot.phase);
        let previous = self.last.replace(current)?;

        let (last_round, last_phase) = previous;
        if snapshot.round_id != last_round {
            if snapshot.round_id < last_round {
                warn!(
                    old_round = last_round,
                    new_round = snapshot.round_id,
                    "Round id went backwards"
                );
            }
            info!(
                old_round = last_round,
                new_round = snapshot.round_id,
                phase = %snapshot.phase,
                "Round advanced"
            );
            return Some(TransitionEvent::RoundAdvanced {
                old_round: last_round,
                new_round: snapshot.round_id,
            });
        }

        if snapshot.phase != last_phase {
            if !last_phase.precedes(snapshot.phase) {
                warn!(
                    round = snapshot.round_id,
                    from = %last_phase,
                    to = %snapshot.phase,
                    "Out-of-order phase transition"
                );
            }
            info!(
                round = snapshot.round_id,
                from = %last_phase,
                to = %snapshot.phase,
                "Phase changed"
            );
            return Some(TransitionEvent::PhaseChanged {
                from: last_phase,
                to: snapshot.phase,
            });
        }

        None
    }

    /// The last observed round id, if any.
    pub fn round_id(&self) -> Option<u64> {
        self.last.map(|(round, _)| round)
    }

    pub fn phase(&self) -> Option<Phase> {
        self.last.map(|(_, phase)| phase)
    }
}
