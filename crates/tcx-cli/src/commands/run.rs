//! `tcx run`: replay a bar file through one session on the paper backend.
//!
//! The saved scope is loaded as placeholders and resolved against the
//! paper connection, exactly as a live start would resolve it. Bars are
//! fed to the [`SessionRunner`] one at a time; the paper mark moves to a
//! bar's close only after the runner has taken the previous bar.

use std::sync::Arc;

use anyhow::{Context, Result};
use tcx_broker_paper::PaperBackend;
use tcx_config::{SessionConfig, UnusedKeyPolicy};
use tcx_execution::{EventSource, TradingBackend};
use tcx_identity::{AccountHandle, InstrumentHandle};
use tcx_runtime::{RunReport, SessionInit, SessionRunner, TradingSession};
use tcx_schemas::{price_to_micros, BarEvent};
use tcx_strategy::ThreeBarMomentum;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::bars::load_bars_csv;

pub struct ReplayArgs {
    pub config_paths: Vec<String>,
    pub bars_path: String,
    /// Per-trade fee in price units.
    pub fee: f64,
    pub strict_keys: bool,
}

pub struct ReplayOutcome {
    pub config_hash: String,
    pub run: RunReport,
}

pub async fn run_replay(args: ReplayArgs) -> Result<ReplayOutcome> {
    let loaded = tcx_config::load_layered_yaml(args.config_paths.as_slice())?;

    let policy = if args.strict_keys {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = tcx_config::report_unused_keys(&loaded.config_json, policy)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!("config key {ptr} is not read by anything");
    }

    let cfg = SessionConfig::from_config_json(&loaded.config_json)?;
    let fee_micros = price_to_micros(args.fee).context("invalid --fee")?;
    let bars = load_bars_csv(&args.bars_path)?;
    info!(
        "replaying {} bar(s) for {} config_hash={}",
        bars.len(),
        cfg.instrument.name,
        loaded.config_hash
    );

    let paper = Arc::new(paper_connection(&cfg, fee_micros));
    let backend: Arc<dyn TradingBackend> = paper.clone();
    let source: Arc<dyn EventSource> = paper.clone();

    let session = TradingSession::init(
        SessionInit {
            settings: cfg.settings.clone(),
            instrument: Some(cfg.instrument_placeholder()),
            account: Some(cfg.account_placeholder()),
            backend,
            source: Some(source),
            signal: Box::new(ThreeBarMomentum),
        },
        paper.as_ref(),
    )
    .context("session start refused")?;

    // Subscribe before any bar can trigger a fill.
    let events = paper.event_receiver();
    let (tx, rx) = mpsc::channel::<BarEvent>(1);

    let feeder = {
        let paper = paper.clone();
        let instrument_id = cfg.instrument.id.clone();
        tokio::spawn(async move {
            for bar in bars {
                // Capacity frees up once the runner has taken the previous bar.
                let Ok(permit) = tx.reserve().await else {
                    break;
                };
                paper.set_mark(&instrument_id, bar.close_micros);
                permit.send(BarEvent::NewBar(bar));
            }
        })
    };

    let run = SessionRunner::new(session).run(events, rx).await;
    feeder.await.context("bar feeder task failed")?;

    Ok(ReplayOutcome {
        config_hash: loaded.config_hash,
        run,
    })
}

/// A paper connection that knows the configured instrument and account.
fn paper_connection(cfg: &SessionConfig, fee_micros: i64) -> PaperBackend {
    let paper = PaperBackend::with_standard_order_types(&cfg.instrument.connection_id);

    let instrument = InstrumentHandle::live(
        cfg.instrument.id.clone(),
        cfg.instrument.name.clone(),
        cfg.instrument.connection_id.clone(),
    );
    let instrument = match &cfg.instrument_alternate_id {
        Some(alt) => instrument.with_alternate_id(alt),
        None => instrument,
    };
    paper.add_instrument(instrument);
    paper.add_account(AccountHandle::live(
        cfg.account.id.clone(),
        cfg.account.name.clone(),
        cfg.account.connection_id.clone(),
    ));
    paper.set_fee(fee_micros);
    paper
}
