use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar. Prices in micros.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub ts_close_utc: DateTime<Utc>,
    pub open_micros: i64,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub volume: i64,
}

impl Bar {
    /// Close strictly above open.
    pub fn is_bullish(&self) -> bool {
        self.close_micros > self.open_micros
    }

    /// Close strictly below open.
    pub fn is_bearish(&self) -> bool {
        self.close_micros < self.open_micros
    }
}

/// What the history feed pushes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "bar", rename_all = "snake_case")]
pub enum BarEvent {
    /// The bar still in progress changed.
    Update(Bar),
    /// A bar just completed.
    NewBar(Bar),
}
