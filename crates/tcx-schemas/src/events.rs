use serde::{Deserialize, Serialize};

use crate::{OrderRecord, Position, Trade};

/// The four backend notification kinds a session subscribes to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    PositionAdded,
    PositionRemoved,
    OrderHistoryAdded,
    TradeAdded,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::PositionAdded,
        EventKind::PositionRemoved,
        EventKind::OrderHistoryAdded,
        EventKind::TradeAdded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PositionAdded => "position_added",
            EventKind::PositionRemoved => "position_removed",
            EventKind::OrderHistoryAdded => "order_history_added",
            EventKind::TradeAdded => "trade_added",
        }
    }
}

/// Push notification from the backend. Delivered at-least-once, ordered
/// within one connection's stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    PositionAdded(Position),
    PositionRemoved(Position),
    OrderHistoryAdded(OrderRecord),
    TradeAdded(Trade),
}

impl BackendEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BackendEvent::PositionAdded(_) => EventKind::PositionAdded,
            BackendEvent::PositionRemoved(_) => EventKind::PositionRemoved,
            BackendEvent::OrderHistoryAdded(_) => EventKind::OrderHistoryAdded,
            BackendEvent::TradeAdded(_) => EventKind::TradeAdded,
        }
    }
}
