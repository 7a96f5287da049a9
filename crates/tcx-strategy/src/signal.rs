use tcx_portfolio::PositionCounts;
use tcx_schemas::Side;

use crate::RecentBars;

/// Entry/exit heuristic consulted by the session on completed bars.
pub trait SignalModel: Send {
    fn name(&self) -> &str;

    /// Direction to open, if any. Only asked while flat.
    fn open_signal(&self, bars: &RecentBars) -> Option<Side>;

    /// Whether to close every open position. Only asked while not flat.
    fn close_signal(&self, bars: &RecentBars, counts: PositionCounts) -> bool;
}

/// Three-bar momentum.
///
/// Opens long after three consecutive bullish bars, short after three
/// bearish ones. Closes longs on a bearish bar and shorts on a bullish bar.
/// A long facing a bullish bar (or a short facing a bearish one) is left
/// alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreeBarMomentum;

impl ThreeBarMomentum {
    const LOOKBACK: usize = 3;
}

impl SignalModel for ThreeBarMomentum {
    fn name(&self) -> &str {
        "three_bar_momentum"
    }

    fn open_signal(&self, bars: &RecentBars) -> Option<Side> {
        if bars.len() < Self::LOOKBACK {
            return None;
        }
        if bars.newest_n(Self::LOOKBACK).all(|b| b.is_bullish()) {
            return Some(Side::Buy);
        }
        if bars.newest_n(Self::LOOKBACK).all(|b| b.is_bearish()) {
            return Some(Side::Sell);
        }
        None
    }

    fn close_signal(&self, bars: &RecentBars, counts: PositionCounts) -> bool {
        let Some(newest) = bars.newest() else {
            return false;
        };
        (counts.long > 0 && newest.is_bearish()) || (counts.short > 0 && newest.is_bullish())
    }
}
