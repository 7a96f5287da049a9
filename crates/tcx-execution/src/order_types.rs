//! Order-type resolution.
//!
//! Abstract behaviors (`Market`, `Limit`, `Stop`) are a closed enum; only
//! the connection-specific id is discovered at runtime. The table is
//! rebuilt from empty on every [`OrderTypeTable::resolve`] call and is
//! read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{OrderTypeId, OrderTypeInfo};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderBehavior {
    Market,
    Limit,
    Stop,
}

impl OrderBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBehavior::Market => "Market",
            OrderBehavior::Limit => "Limit",
            OrderBehavior::Stop => "Stop",
        }
    }
}

impl fmt::Display for OrderBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderBehavior {
    type Err = ResolveFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(OrderBehavior::Market),
            "limit" => Ok(OrderBehavior::Limit),
            "stop" => Ok(OrderBehavior::Stop),
            _ => Err(ResolveFailure::UnknownBehavior {
                name: s.to_string(),
            }),
        }
    }
}

/// One requested name that did not resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveFailure {
    /// The name is not a known order behavior.
    UnknownBehavior { name: String },
    /// The connection offers no order type with this behavior.
    Unavailable {
        behavior: OrderBehavior,
        connection_id: String,
    },
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveFailure::UnknownBehavior { name } => {
                write!(f, "ORDER_TYPE_UNKNOWN: '{name}' is not an order behavior")
            }
            ResolveFailure::Unavailable {
                behavior,
                connection_id,
            } => write!(
                f,
                "ORDER_TYPE_UNAVAILABLE: connection '{connection_id}' offers no {behavior} order type"
            ),
        }
    }
}

impl std::error::Error for ResolveFailure {}

/// Behavior -> connection-specific order-type id for one session.
#[derive(Clone, Debug, Default)]
pub struct OrderTypeTable {
    ids: BTreeMap<OrderBehavior, OrderTypeId>,
    failures: Vec<ResolveFailure>,
}

impl OrderTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the table for `names` against the order types `available`
    /// on `connection_id`.
    ///
    /// Every name is attempted; a failure is recorded and the next name is
    /// tried. Returns `true` only if all names resolved.
    pub fn resolve<S: AsRef<str>>(
        &mut self,
        names: &[S],
        connection_id: &str,
        available: &[OrderTypeInfo],
    ) -> bool {
        self.ids.clear();
        self.failures.clear();

        for name in names {
            let behavior = match name.as_ref().parse::<OrderBehavior>() {
                Ok(b) => b,
                Err(failure) => {
                    self.failures.push(failure);
                    continue;
                }
            };

            let found = available
                .iter()
                .find(|t| t.connection_id == connection_id && t.behavior == behavior);

            match found {
                Some(t) => {
                    self.ids.insert(behavior, t.id.clone());
                }
                None => self.failures.push(ResolveFailure::Unavailable {
                    behavior,
                    connection_id: connection_id.to_string(),
                }),
            }
        }

        self.failures.is_empty()
    }

    pub fn lookup(&self, behavior: OrderBehavior) -> Option<&OrderTypeId> {
        self.ids.get(&behavior)
    }

    /// Lookup by name (case-insensitive). Unknown names yield `None`.
    pub fn lookup_name(&self, name: &str) -> Option<&OrderTypeId> {
        name.parse::<OrderBehavior>()
            .ok()
            .and_then(|b| self.lookup(b))
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.lookup_name(name).is_some()
    }

    /// Failures recorded by the last `resolve` call.
    pub fn failures(&self) -> &[ResolveFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.failures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behavior_parse_ignores_case() {
        assert_eq!("MARKET".parse::<OrderBehavior>().unwrap(), OrderBehavior::Market);
        assert_eq!("limit".parse::<OrderBehavior>().unwrap(), OrderBehavior::Limit);
        assert_eq!("Stop".parse::<OrderBehavior>().unwrap(), OrderBehavior::Stop);
        assert!("StopLimit".parse::<OrderBehavior>().is_err());
    }

    #[test]
    fn empty_request_resolves_trivially() {
        let mut t = OrderTypeTable::new();
        assert!(t.resolve::<&str>(&[], "sim", &[]));
        assert!(t.is_empty());
    }
}
