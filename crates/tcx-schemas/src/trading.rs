use std::fmt;

use serde::{Deserialize, Serialize};
use tcx_identity::{AccountHandle, InstrumentHandle};

/// Order / trade direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Direction of an open position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// The order side that opens a position of this direction.
    pub fn opening_side(&self) -> Side {
        match self {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        }
    }
}

impl From<Side> for PositionSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        }
    }
}

/// An open position as reported by the backend.
///
/// Created and destroyed only by confirmed backend events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub instrument: InstrumentHandle,
    pub account: AccountHandle,
    pub side: PositionSide,
    pub open_price_micros: i64,
    pub quantity: i64,
}

/// The live position set at one point of the backend's stream.
///
/// `seq` increases with every change on the backend side, which lets the
/// ledger discard a set that is older than the one it already applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionSet {
    pub seq: u64,
    pub positions: Vec<Position>,
}

/// A settled trade. Arrives exactly once per settlement.
///
/// `gross_pnl_micros` presence marks a countable trade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub instrument: InstrumentHandle,
    pub account: AccountHandle,
    pub side: Side,
    pub net_pnl_micros: Option<i64>,
    pub gross_pnl_micros: Option<i64>,
    pub fee_micros: Option<i64>,
}

/// Order status as written to order history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Opened,
    PartiallyFilled,
    Filled,
    Cancelled,
    Refused,
    /// Any status string the backend sends that is not modelled here.
    Other(String),
}

impl OrderStatus {
    /// Exact, case-sensitive parse of the backend's status label.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "Opened" => OrderStatus::Opened,
            "PartiallyFilled" => OrderStatus::PartiallyFilled,
            "Filled" => OrderStatus::Filled,
            "Cancelled" => OrderStatus::Cancelled,
            "Refused" => OrderStatus::Refused,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

/// An entry added to order history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub instrument: InstrumentHandle,
    pub account: AccountHandle,
    pub side: Side,
    pub quantity: i64,
    pub status: OrderStatus,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_status_parse_is_exact() {
        assert_eq!(OrderStatus::from_wire("Refused"), OrderStatus::Refused);
        assert_eq!(
            OrderStatus::from_wire("refused"),
            OrderStatus::Other("refused".to_string())
        );
        assert_eq!(
            OrderStatus::from_wire("Refused "),
            OrderStatus::Other("Refused ".to_string())
        );
    }

    #[test]
    fn position_side_maps_from_order_side() {
        assert_eq!(PositionSide::from(Side::Buy), PositionSide::Long);
        assert_eq!(PositionSide::from(Side::Sell), PositionSide::Short);
        assert_eq!(PositionSide::Short.opening_side(), Side::Sell);
    }
}
