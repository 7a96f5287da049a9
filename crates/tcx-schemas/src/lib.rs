//! tcx-schemas
//!
//! Records exchanged with the trading backend and the bar feed.
//! Prices and money are integer micros; `f64` only at the wire boundary
//! (see [`prices`]).

pub mod prices;

mod bars;
mod events;
mod trading;

pub use bars::{Bar, BarEvent};
pub use events::{BackendEvent, EventKind};
pub use prices::{price_to_micros, PricingError, MICROS_PER_UNIT};
pub use trading::{
    OrderRecord, OrderStatus, Position, PositionSet, PositionSide, Side, Trade,
};
