//! CSV bar loading for replays.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tcx_schemas::{price_to_micros, Bar};

const COLUMNS: usize = 6;

/// Load `ts_close_utc,open,high,low,close,volume` rows (header required).
///
/// Timestamps are RFC 3339 and must be strictly increasing. Prices are
/// converted to micros at this boundary.
pub fn load_bars_csv(path: &str) -> Result<Vec<Bar>> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("open bars csv: {path}"))?;
    let mut out = Vec::new();

    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("read bars csv row {}", i + 1))?;
        if rec.len() < COLUMNS {
            bail!(
                "bars csv row {}: expected {COLUMNS} columns, got {}",
                i + 1,
                rec.len()
            );
        }
        let ts: DateTime<Utc> = rec[0]
            .trim()
            .parse()
            .with_context(|| format!("bars csv row {}: parse ts_close_utc", i + 1))?;
        out.push(Bar {
            ts_close_utc: ts,
            open_micros: price_field(&rec[1], "open", i)?,
            high_micros: price_field(&rec[2], "high", i)?,
            low_micros: price_field(&rec[3], "low", i)?,
            close_micros: price_field(&rec[4], "close", i)?,
            volume: rec[5]
                .trim()
                .parse()
                .with_context(|| format!("bars csv row {}: parse volume", i + 1))?,
        });
    }

    for w in out.windows(2) {
        if w[0].ts_close_utc >= w[1].ts_close_utc {
            bail!(
                "bars not strictly increasing at {} -> {}",
                w[0].ts_close_utc,
                w[1].ts_close_utc
            );
        }
    }

    Ok(out)
}

fn price_field(raw: &str, column: &str, row: usize) -> Result<i64> {
    let price: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("bars csv row {}: parse {column}", row + 1))?;
    price_to_micros(price).with_context(|| format!("bars csv row {}: {column}", row + 1))
}
