//! tcx-runtime
//!
//! Session orchestration for one (instrument, account) scope.
//!
//! - [`TradingStateMachine`]: Idle / WaitingOpen / WaitingClose overlap guard
//! - [`TradingSession`]: init (scope, order types, subscriptions, seed),
//!   backend-event and bar handling, statistics reset, forced reset,
//!   teardown, metrics
//! - [`SessionRunner`]: async single-consumer loop over backend and bar
//!   channels
//!
//! Intent flows session -> backend; confirmation flows backend ->
//! dispatcher -> ledger/statistics -> state machine. Nothing is ever
//! counted from intent.

mod metrics;
mod runner;
mod session;
mod state_machine;

pub use metrics::MetricsSnapshot;
pub use runner::{RunExit, RunReport, SessionRunner};
pub use session::{SessionControl, SessionError, SessionInit, TradingSession};
pub use state_machine::{TradingStateMachine, TransitionError, WaitEvent, WaitState};
