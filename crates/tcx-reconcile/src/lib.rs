//! tcx-reconcile
//!
//! Event intake for one scope. Raw backend notifications go in; the
//! ledger and trade statistics are updated; typed [`DomainEvent`]s come
//! out, in the order the state machine must see them.
//!
//! Rules:
//! - Out-of-scope position-added events have no side effects
//! - Position removals always recompute counts, scoped or not
//! - `AllPositionsClosed` fires once per transition into the flat state
//! - Only a scoped `Refused` order-history entry yields `OrderRefused`
//! - `TradeAdded` fires for every trade; `TradeRecorded` only for scoped ones
//!
//! Deterministic, pure logic. No IO. The caller supplies the live
//! position set.

mod dispatcher;
mod events;

pub use dispatcher::{Dispatched, ReconciliationDispatcher};
pub use events::{DomainEvent, OrderRefusal};
