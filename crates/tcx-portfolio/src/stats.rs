//! Trade statistics accumulator.
//!
//! Append-only sums over settled trades. There is no correction path.
//!
//! - net P/L, gross P/L and fee are added when present on the trade
//! - gross P/L presence is what makes a trade countable: only then are
//!   the total and per-side trade counters incremented
//! - [`TradeStatistics::reset`] zeroes money only; counters survive until
//!   [`TradeStatistics::clear`] at teardown

use tcx_schemas::{Side, Trade};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TradeStatistics {
    net_pnl_micros: i64,
    gross_pnl_micros: i64,
    fee_micros: i64,
    total_trades: u64,
    long_trades: u64,
    short_trades: u64,
}

impl TradeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one in-scope settlement into the running totals.
    pub fn on_trade(&mut self, trade: &Trade) {
        if let Some(net) = trade.net_pnl_micros {
            self.net_pnl_micros = self.net_pnl_micros.saturating_add(net);
        }
        if let Some(fee) = trade.fee_micros {
            self.fee_micros = self.fee_micros.saturating_add(fee);
        }
        if let Some(gross) = trade.gross_pnl_micros {
            self.gross_pnl_micros = self.gross_pnl_micros.saturating_add(gross);
            self.total_trades += 1;
            match trade.side {
                Side::Buy => self.long_trades += 1,
                Side::Sell => self.short_trades += 1,
            }
        }
    }

    /// Zero the monetary totals. Trade counts are kept.
    pub fn reset(&mut self) {
        self.net_pnl_micros = 0;
        self.gross_pnl_micros = 0;
        self.fee_micros = 0;
    }

    /// Zero everything, counts included.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn net_pnl_micros(&self) -> i64 {
        self.net_pnl_micros
    }

    pub fn gross_pnl_micros(&self) -> i64 {
        self.gross_pnl_micros
    }

    pub fn fee_micros(&self) -> i64 {
        self.fee_micros
    }

    pub fn total_trades(&self) -> u64 {
        self.total_trades
    }

    pub fn long_trades(&self) -> u64 {
        self.long_trades
    }

    pub fn short_trades(&self) -> u64 {
        self.short_trades
    }
}
