//! Backend adapter traits and request/response types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tcx_identity::{AccountHandle, InstrumentHandle};
use tcx_schemas::{EventKind, Position, PositionSet, Side};

use crate::OrderBehavior;

/// `Err` is a transport-layer failure: the request may not have reached
/// the venue at all. A venue-side failure is an `Ok` with
/// [`OperationStatus::Failure`].
pub type BackendResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Connection-specific order-type identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderTypeId(pub String);

impl OrderTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An order type offered by some connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTypeInfo {
    pub id: OrderTypeId,
    pub connection_id: String,
    pub behavior: OrderBehavior,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

impl FromStr for TimeInForce {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(TimeInForce::Day),
            "gtc" => Ok(TimeInForce::Gtc),
            "ioc" => Ok(TimeInForce::Ioc),
            "fok" => Ok(TimeInForce::Fok),
            other => Err(format!("unknown time-in-force '{other}'")),
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeInForce::Day => "DAY",
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
        };
        write!(f, "{s}")
    }
}

/// Place-order command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceOrderRequest {
    pub client_order_id: String,
    pub instrument: InstrumentHandle,
    pub account: AccountHandle,
    pub side: Side,
    pub order_type_id: OrderTypeId,
    /// Always positive.
    pub quantity: i64,
    pub time_in_force: TimeInForce,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Success,
    Failure,
}

/// Synchronous answer to a place-order / close-position command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradingOperationResult {
    pub status: OperationStatus,
    pub message: Option<String>,
}

impl TradingOperationResult {
    pub fn success() -> Self {
        Self {
            status: OperationStatus::Success,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failure,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}

/// Outbound commands and live-state queries against one backend.
pub trait TradingBackend: Send + Sync {
    fn place_order(&self, req: PlaceOrderRequest) -> BackendResult<TradingOperationResult>;

    fn close_position(&self, position: &Position) -> BackendResult<TradingOperationResult>;

    /// The authoritative open-position set, all scopes included.
    fn live_positions(&self) -> PositionSet;

    /// Every order type the backend knows about, across connections.
    fn order_types(&self) -> Vec<OrderTypeInfo>;
}

/// Subscription control for backend push notifications.
pub trait EventSource: Send + Sync {
    fn subscribe(&self, kind: EventKind) -> BackendResult<()>;

    fn unsubscribe(&self, kind: EventKind) -> BackendResult<()>;
}
