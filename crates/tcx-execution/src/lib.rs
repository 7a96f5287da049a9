//! tcx-execution
//!
//! The outbound half of the backend boundary plus order-type resolution.
//!
//! - [`TradingBackend`]: place-order / close-position commands and the live
//!   position set; implemented by backend adapters (paper, live, mocks)
//! - [`EventSource`]: subscribe/unsubscribe for the four push notification
//!   kinds
//! - [`OrderTypeTable`]: `OrderBehavior` -> connection-specific id, built once
//!   per session
//!
//! Order submission is fire-and-forget: outcomes arrive later as
//! separate backend events.

mod backend;
mod order_types;

pub use backend::{
    BackendResult, EventSource, OperationStatus, OrderTypeId, OrderTypeInfo, PlaceOrderRequest,
    TimeInForce, TradingBackend, TradingOperationResult,
};
pub use order_types::{OrderBehavior, OrderTypeTable, ResolveFailure};
