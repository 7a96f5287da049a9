use std::fmt;

use serde::{Deserialize, Serialize};
use tcx_portfolio::PositionCounts;
use tcx_schemas::{OrderRecord, Position, Side, Trade};

/// Typed notification produced by the dispatcher for one scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainEvent {
    /// A scoped position was confirmed open; carries the counts after recompute.
    PositionOpened {
        position: Position,
        counts: PositionCounts,
    },
    /// A scoped position was confirmed closed.
    PositionClosed { position: Position },
    /// The scope just became flat.
    AllPositionsClosed,
    /// A scoped trade was applied to the statistics.
    TradeRecorded { trade: Trade },
    /// Any trade, scoped or not.
    TradeAdded { trade: Trade },
    /// A scoped order was refused by the venue. Fatal to the session.
    OrderRefused(OrderRefusal),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::PositionOpened { .. } => "position_opened",
            DomainEvent::PositionClosed { .. } => "position_closed",
            DomainEvent::AllPositionsClosed => "all_positions_closed",
            DomainEvent::TradeRecorded { .. } => "trade_recorded",
            DomainEvent::TradeAdded { .. } => "trade_added",
            DomainEvent::OrderRefused(_) => "order_refused",
        }
    }
}

/// Description of an asynchronous venue refusal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefusal {
    pub instrument: String,
    pub account: String,
    pub order_id: String,
    pub side: Side,
    pub quantity: i64,
    pub message: Option<String>,
}

impl OrderRefusal {
    pub(crate) fn from_record(record: &OrderRecord) -> Self {
        Self {
            instrument: record.instrument.name.clone(),
            account: record.account.name.clone(),
            order_id: record.order_id.clone(),
            side: record.side,
            quantity: record.quantity,
            message: record.message.clone(),
        }
    }
}

impl fmt::Display for OrderRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ORDER_REFUSED: [{}] order {} {} x{} on account {} refused",
            self.instrument, self.order_id, self.side, self.quantity, self.account
        )?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for OrderRefusal {}
