//! Typed session settings read from the merged config tree.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tcx_execution::TimeInForce;
use tcx_identity::{AccountHandle, CreationDescriptor, InstrumentHandle, ALTERNATE_ID_ATTRIBUTE};

/// The order behavior every session must be able to place.
pub const REQUIRED_ORDER_TYPE: &str = "Market";

const DEFAULT_PERIOD: &str = "1m";
const DEFAULT_QUANTITY: i64 = 1;

/// Per-session trading knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Bar period label, reported in metrics only.
    pub period: String,
    /// Order-type names to resolve. Always contains [`REQUIRED_ORDER_TYPE`].
    pub order_types: Vec<String>,
    /// Fixed unit quantity per open order. Positive.
    pub quantity: i64,
    pub time_in_force: TimeInForce,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD.to_string(),
            order_types: vec![REQUIRED_ORDER_TYPE.to_string()],
            quantity: DEFAULT_QUANTITY,
            time_in_force: TimeInForce::Day,
        }
    }
}

impl SessionSettings {
    /// Append the required order type when the list lacks it (case-insensitive).
    pub fn with_required_order_type(mut self) -> Self {
        let present = self
            .order_types
            .iter()
            .any(|n| n.trim().eq_ignore_ascii_case(REQUIRED_ORDER_TYPE));
        if !present {
            self.order_types.push(REQUIRED_ORDER_TYPE.to_string());
        }
        self
    }
}

/// Saved scope descriptors plus settings.
///
/// Instrument and account come back as placeholders; they are resolved
/// against the live connection when the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub instrument: CreationDescriptor,
    pub instrument_alternate_id: Option<String>,
    pub account: CreationDescriptor,
    pub settings: SessionSettings,
}

impl SessionConfig {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let mut instrument = descriptor_at(v, "/instrument")?;
        let instrument_alternate_id = opt_str(v, "/instrument/alternate_id")?;
        if let Some(alt) = &instrument_alternate_id {
            instrument = instrument.with_attribute(ALTERNATE_ID_ATTRIBUTE, alt.clone());
        }
        let account = descriptor_at(v, "/account")?;

        let mut settings = SessionSettings::default();

        if let Some(period) = opt_str(v, "/session/period")? {
            if period.trim().is_empty() {
                bail!("CONFIG_INVALID: /session/period must not be blank");
            }
            settings.period = period;
        }

        if let Some(types) = v.pointer("/session/order_types") {
            let arr = types
                .as_array()
                .context("CONFIG_INVALID: /session/order_types must be a list")?;
            let mut names = Vec::with_capacity(arr.len());
            for (i, item) in arr.iter().enumerate() {
                let name = item.as_str().with_context(|| {
                    format!("CONFIG_INVALID: /session/order_types/{i} must be a string")
                })?;
                names.push(name.to_string());
            }
            settings.order_types = names;
        }
        settings = settings.with_required_order_type();

        if let Some(q) = v.pointer("/session/quantity") {
            let q = q
                .as_i64()
                .context("CONFIG_INVALID: /session/quantity must be an integer")?;
            if q <= 0 {
                bail!("CONFIG_INVALID: /session/quantity must be > 0 (got {q})");
            }
            settings.quantity = q;
        }

        if let Some(tif) = opt_str(v, "/session/time_in_force")? {
            settings.time_in_force = tif
                .parse::<TimeInForce>()
                .map_err(|e| anyhow::anyhow!("CONFIG_INVALID: /session/time_in_force: {e}"))?;
        }

        Ok(Self {
            instrument,
            instrument_alternate_id,
            account,
            settings,
        })
    }

    /// The alternate id travels on the descriptor.
    pub fn instrument_placeholder(&self) -> InstrumentHandle {
        InstrumentHandle::placeholder(self.instrument.clone())
    }

    pub fn account_placeholder(&self) -> AccountHandle {
        AccountHandle::placeholder(self.account.clone())
    }
}

fn descriptor_at(v: &Value, section: &str) -> Result<CreationDescriptor> {
    let id = req_str(v, &format!("{section}/id"))?;
    let name = req_str(v, &format!("{section}/name"))?;
    let connection_id = req_str(v, &format!("{section}/connection_id"))?;
    Ok(CreationDescriptor::new(id, name, connection_id))
}

fn req_str(v: &Value, ptr: &str) -> Result<String> {
    match opt_str(v, ptr)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => bail!("CONFIG_MISSING: {ptr} is required"),
    }
}

fn opt_str(v: &Value, ptr: &str) -> Result<Option<String>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => bail!("CONFIG_INVALID: {ptr} must be a string"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_order_type_is_appended_once() {
        let s = SessionSettings {
            order_types: vec!["Limit".to_string()],
            ..SessionSettings::default()
        }
        .with_required_order_type();
        assert_eq!(s.order_types, vec!["Limit".to_string(), "Market".to_string()]);

        let again = s.clone().with_required_order_type();
        assert_eq!(again.order_types, s.order_types);
    }

    #[test]
    fn lowercase_market_counts_as_present() {
        let s = SessionSettings {
            order_types: vec!["market".to_string()],
            ..SessionSettings::default()
        }
        .with_required_order_type();
        assert_eq!(s.order_types.len(), 1);
    }
}
