//! Position ledger.
//!
//! # Invariants
//! - `long_count` / `short_count` equal the number of positions in the
//!   last applied live set that fall inside the scope, partitioned by side.
//! - Counts are recomputed from scratch on every call. Nothing is
//!   incremented or decremented speculatively.
//! - A live set whose `seq` is older than the last applied one is ignored,
//!   so a slow recompute can never overwrite a newer count.

use tcx_identity::ScopeKey;
use tcx_schemas::{Position, PositionSet, PositionSide};
use tracing::debug;

/// Long/short counts for one scope.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionCounts {
    pub long: u32,
    pub short: u32,
}

impl PositionCounts {
    pub fn total(&self) -> u32 {
        self.long + self.short
    }

    pub fn is_flat(&self) -> bool {
        self.total() == 0
    }
}

/// Whether a recompute applied the given set or kept the newer snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecomputeOutcome {
    Applied,
    Stale { last_seq: u64, got_seq: u64 },
}

/// Positions of `live` that belong to `scope`, in backend order.
pub fn scoped_positions<'a>(scope: &ScopeKey, live: &'a PositionSet) -> Vec<&'a Position> {
    live.positions
        .iter()
        .filter(|p| scope.contains(&p.instrument, &p.account))
        .collect()
}

/// Last-known position counts for a scope.
#[derive(Clone, Debug, Default)]
pub struct PositionLedger {
    counts: PositionCounts,
    last_seq: Option<u64>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive fresh counts from the live position set.
    ///
    /// Returns the counts now held by the ledger: the fresh ones, or the
    /// retained snapshot when `live` is older than what was already applied.
    pub fn recompute(&mut self, scope: &ScopeKey, live: &PositionSet) -> PositionCounts {
        self.recompute_with_outcome(scope, live).0
    }

    pub fn recompute_with_outcome(
        &mut self,
        scope: &ScopeKey,
        live: &PositionSet,
    ) -> (PositionCounts, RecomputeOutcome) {
        if let Some(last_seq) = self.last_seq {
            if live.seq < last_seq {
                debug!(
                    "[{}] ignoring stale position set seq={} (applied seq={})",
                    scope.instrument().name,
                    live.seq,
                    last_seq
                );
                return (
                    self.counts,
                    RecomputeOutcome::Stale {
                        last_seq,
                        got_seq: live.seq,
                    },
                );
            }
        }

        let mut counts = PositionCounts::default();
        for p in scoped_positions(scope, live) {
            match p.side {
                PositionSide::Long => counts.long += 1,
                PositionSide::Short => counts.short += 1,
            }
        }

        self.counts = counts;
        self.last_seq = Some(live.seq);
        (counts, RecomputeOutcome::Applied)
    }

    pub fn counts(&self) -> PositionCounts {
        self.counts
    }

    pub fn long_positions_count(&self) -> u32 {
        self.counts.long
    }

    pub fn short_positions_count(&self) -> u32 {
        self.counts.short
    }

    /// Drop the snapshot. Used on teardown.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcx_identity::{AccountHandle, InstrumentHandle};

    fn scope() -> ScopeKey {
        ScopeKey::new(
            InstrumentHandle::live("ESZ5|sim", "ESZ5", "sim"),
            AccountHandle::live("acc-1", "Sim101", "sim"),
        )
        .unwrap()
    }

    fn pos(id: &str, side: PositionSide) -> Position {
        Position {
            id: id.to_string(),
            instrument: InstrumentHandle::live("ESZ5|sim", "ESZ5", "sim"),
            account: AccountHandle::live("acc-1", "Sim101", "sim"),
            side,
            open_price_micros: 5_000_000_000,
            quantity: 1,
        }
    }

    #[test]
    fn stale_set_does_not_overwrite_newer_counts() {
        let s = scope();
        let mut ledger = PositionLedger::new();

        let newer = PositionSet {
            seq: 7,
            positions: vec![pos("p1", PositionSide::Long), pos("p2", PositionSide::Long)],
        };
        let older = PositionSet {
            seq: 5,
            positions: vec![],
        };

        assert_eq!(ledger.recompute(&s, &newer).long, 2);
        let (counts, outcome) = ledger.recompute_with_outcome(&s, &older);
        assert_eq!(counts.long, 2);
        assert_eq!(
            outcome,
            RecomputeOutcome::Stale {
                last_seq: 7,
                got_seq: 5
            }
        );
    }

    #[test]
    fn equal_seq_is_reapplied() {
        let s = scope();
        let mut ledger = PositionLedger::new();
        let set = PositionSet {
            seq: 3,
            positions: vec![pos("p1", PositionSide::Short)],
        };
        ledger.recompute(&s, &set);
        let (_, outcome) = ledger.recompute_with_outcome(&s, &set);
        assert_eq!(outcome, RecomputeOutcome::Applied);
        assert_eq!(ledger.short_positions_count(), 1);
    }

    #[test]
    fn clear_resets_snapshot_and_watermark() {
        let s = scope();
        let mut ledger = PositionLedger::new();
        ledger.recompute(
            &s,
            &PositionSet {
                seq: 9,
                positions: vec![pos("p1", PositionSide::Long)],
            },
        );
        ledger.clear();
        assert!(ledger.counts().is_flat());

        // After clear, a lower seq is accepted again.
        ledger.recompute(&s, &PositionSet { seq: 1, positions: vec![] });
        assert!(ledger.counts().is_flat());
    }
}
