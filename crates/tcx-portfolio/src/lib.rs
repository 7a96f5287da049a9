//! tcx-portfolio
//!
//! Confirmed-state bookkeeping for one scope:
//! - [`PositionLedger`]: long/short position counts, always derived from the
//!   live backend position set, never from submitted intent
//! - [`TradeStatistics`]: running P/L, fees and trade counts, fed only by
//!   settled trades
//!
//! Pure deterministic logic. No IO, no clock.

pub mod ledger;
pub mod stats;

pub use ledger::{scoped_positions, PositionCounts, PositionLedger, RecomputeOutcome};
pub use stats::TradeStatistics;
