//! tcx-strategy
//!
//! Entry/exit heuristics and the bar window they read.
//!
//! Contract:
//! - Signal models see a bounded window of completed bars, most recent first.
//! - Signal models are pure: no IO, no clock, no backend access.
//! - A model only answers "open which side?" and "close now?"; the
//!   session decides whether asking is allowed at all.

mod signal;
mod window;

pub use signal::{SignalModel, ThreeBarMomentum};
pub use window::{RecentBars, DEFAULT_WINDOW};
