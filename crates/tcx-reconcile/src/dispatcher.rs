use tcx_identity::ScopeKey;
use tcx_portfolio::{PositionCounts, PositionLedger, TradeStatistics};
use tcx_schemas::{BackendEvent, OrderRecord, OrderStatus, Position, PositionSet, Trade};
use tracing::{debug, info, warn};

use crate::{DomainEvent, OrderRefusal};

/// Result of dispatching one backend event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dispatched {
    /// Domain events in the order they must be applied.
    pub events: Vec<DomainEvent>,
    /// Counts after a recompute, when the event triggered one.
    pub counts: Option<PositionCounts>,
    /// Whether the event matched the scope.
    pub in_scope: bool,
}

/// Owns the ledger and trade statistics of one scope and keeps them in
/// step with confirmed backend events.
#[derive(Debug)]
pub struct ReconciliationDispatcher {
    scope: ScopeKey,
    ledger: PositionLedger,
    stats: TradeStatistics,
    // True while the scope is flat and that state has already been signalled
    // (or was the starting state).
    flat_signalled: bool,
}

impl ReconciliationDispatcher {
    pub fn new(scope: ScopeKey) -> Self {
        Self {
            scope,
            ledger: PositionLedger::new(),
            stats: TradeStatistics::new(),
            flat_signalled: true,
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &TradeStatistics {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut TradeStatistics {
        &mut self.stats
    }

    /// Seed counts from positions that existed before the session started.
    /// Starting flat is not a transition, so no signal is owed for it.
    pub fn seed(&mut self, live: &PositionSet) -> PositionCounts {
        let counts = self.ledger.recompute(&self.scope, live);
        self.flat_signalled = counts.is_flat();
        info!(
            "[{}] seeded position counts long={} short={}",
            self.name(),
            counts.long,
            counts.short
        );
        counts
    }

    /// Route one backend event. `live` is only called for position events.
    pub fn dispatch<F>(&mut self, event: &BackendEvent, live: F) -> Dispatched
    where
        F: FnOnce() -> PositionSet,
    {
        match event {
            BackendEvent::PositionAdded(p) => self.on_position_added(p, &live()),
            BackendEvent::PositionRemoved(p) => self.on_position_removed(p, &live()),
            BackendEvent::OrderHistoryAdded(r) => {
                let mut out = Dispatched::default();
                if let Some(refusal) = self.on_order_history_added(r) {
                    out.in_scope = true;
                    out.events.push(DomainEvent::OrderRefused(refusal));
                }
                out
            }
            BackendEvent::TradeAdded(t) => self.on_trade_added(t),
        }
    }

    pub fn on_position_added(&mut self, position: &Position, live: &PositionSet) -> Dispatched {
        if !self.in_scope(position) {
            debug!(
                "[{}] ignoring out-of-scope position added id={}",
                self.name(),
                position.id
            );
            return Dispatched::default();
        }

        let counts = self.ledger.recompute(&self.scope, live);
        self.track_flat(counts);
        info!(
            "[{}] position opened id={} side={:?} long={} short={}",
            self.name(),
            position.id,
            position.side,
            counts.long,
            counts.short
        );

        Dispatched {
            events: vec![DomainEvent::PositionOpened {
                position: position.clone(),
                counts,
            }],
            counts: Some(counts),
            in_scope: true,
        }
    }

    pub fn on_position_removed(&mut self, position: &Position, live: &PositionSet) -> Dispatched {
        let mut out = Dispatched::default();

        if self.in_scope(position) {
            info!("[{}] position closed id={}", self.name(), position.id);
            out.in_scope = true;
            out.events.push(DomainEvent::PositionClosed {
                position: position.clone(),
            });
        }

        // Counts must reflect the post-removal set even for foreign removals.
        let counts = self.ledger.recompute(&self.scope, live);
        out.counts = Some(counts);

        if self.track_flat(counts) {
            info!("[{}] all positions closed", self.name());
            out.events.push(DomainEvent::AllPositionsClosed);
        }
        out
    }

    /// Returns the refusal when `record` is a scoped `Refused` entry.
    pub fn on_order_history_added(&mut self, record: &OrderRecord) -> Option<OrderRefusal> {
        if record.status != OrderStatus::Refused {
            return None;
        }
        if !self.scope.contains(&record.instrument, &record.account) {
            debug!(
                "[{}] ignoring out-of-scope refusal order_id={}",
                self.name(),
                record.order_id
            );
            return None;
        }

        let refusal = OrderRefusal::from_record(record);
        warn!("[{}] {}", self.name(), refusal);
        Some(refusal)
    }

    pub fn on_trade_added(&mut self, trade: &Trade) -> Dispatched {
        let mut out = Dispatched::default();

        if self.scope.contains(&trade.instrument, &trade.account) {
            self.stats.on_trade(trade);
            debug!(
                "[{}] trade recorded id={} gross={:?} net={:?} fee={:?}",
                self.name(),
                trade.id,
                trade.gross_pnl_micros,
                trade.net_pnl_micros,
                trade.fee_micros
            );
            out.in_scope = true;
            out.events.push(DomainEvent::TradeRecorded {
                trade: trade.clone(),
            });
        }

        out.events.push(DomainEvent::TradeAdded {
            trade: trade.clone(),
        });
        out
    }

    /// Drop ledger snapshot and all statistics. Used on teardown.
    pub fn clear(&mut self) {
        self.ledger.clear();
        self.stats.clear();
        self.flat_signalled = true;
    }

    // ------------------------------------------------------------------

    fn name(&self) -> &str {
        &self.scope.instrument().name
    }

    fn in_scope(&self, position: &Position) -> bool {
        self.scope.contains(&position.instrument, &position.account)
    }

    /// Returns true exactly when `counts` is a fresh transition into flat.
    fn track_flat(&mut self, counts: PositionCounts) -> bool {
        if !counts.is_flat() {
            self.flat_signalled = false;
            return false;
        }
        if self.flat_signalled {
            return false;
        }
        self.flat_signalled = true;
        true
    }
}
