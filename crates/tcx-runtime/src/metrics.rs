use serde::{Deserialize, Serialize};

use crate::WaitState;

/// Read-only, pull-based view of a session. Money in micros.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub symbol: String,
    pub account: String,
    pub period: String,
    pub state: WaitState,
    pub long_positions: u32,
    pub short_positions: u32,
    pub net_pnl_micros: i64,
    pub gross_pnl_micros: i64,
    pub total_fee_micros: i64,
    pub total_trades: u64,
    pub long_trades: u64,
    pub short_trades: u64,
}
