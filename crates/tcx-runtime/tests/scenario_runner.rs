//! Async runner over the paper backend.
//!
//! - a full open/close cycle driven only by channels
//! - a scoped refusal ends the run with StopRequested and tears down

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tcx_broker_paper::{PaperBackend, ScriptedOutcome};
use tcx_config::SessionSettings;
use tcx_execution::{EventSource, TradingBackend};
use tcx_identity::{AccountHandle, InstrumentHandle};
use tcx_runtime::*;
use tcx_schemas::*;
use tcx_strategy::ThreeBarMomentum;
use tokio::sync::mpsc;

fn es() -> InstrumentHandle {
    InstrumentHandle::live("ESZ5|sim", "ESZ5", "sim")
}

fn acc() -> AccountHandle {
    AccountHandle::live("acc-1", "Sim101", "sim")
}

fn bar(i: i64, open: i64, close: i64) -> Bar {
    Bar {
        ts_close_utc: Utc.with_ymd_and_hms(2025, 6, 5, 14, 0, 0).unwrap() + Duration::minutes(i),
        open_micros: open * MICROS_PER_UNIT,
        high_micros: open.max(close) * MICROS_PER_UNIT,
        low_micros: open.min(close) * MICROS_PER_UNIT,
        close_micros: close * MICROS_PER_UNIT,
        volume: 10,
    }
}

fn session(paper: &Arc<PaperBackend>) -> TradingSession {
    let backend: Arc<dyn TradingBackend> = paper.clone();
    let source: Arc<dyn EventSource> = paper.clone();
    TradingSession::init(
        SessionInit {
            settings: SessionSettings::default(),
            instrument: Some(es()),
            account: Some(acc()),
            backend,
            source: Some(source),
            signal: Box::new(ThreeBarMomentum),
        },
        paper.as_ref(),
    )
    .unwrap()
}

fn paper() -> Arc<PaperBackend> {
    let p = Arc::new(PaperBackend::with_standard_order_types("sim"));
    p.add_instrument(es());
    p.add_account(acc());
    p.set_fee(MICROS_PER_UNIT / 2);
    p
}

#[tokio::test]
async fn replays_open_and_close_cycle() {
    let paper = paper();
    let events = paper.event_receiver();
    let runner = SessionRunner::new(session(&paper));
    let (tx, rx) = mpsc::channel(1);

    let feeder = {
        let paper = paper.clone();
        tokio::spawn(async move {
            // Long opened at 103, closed at 101 on the bearish bar.
            let shapes = [(100, 101), (101, 102), (102, 103), (103, 101)];
            for (i, (o, c)) in shapes.into_iter().enumerate() {
                paper.set_mark("ESZ5|sim", c * MICROS_PER_UNIT);
                tx.send(BarEvent::NewBar(bar(i as i64, o, c))).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let report = runner.run(events, rx).await;
    feeder.await.unwrap();

    assert_eq!(report.exit, RunExit::BarsExhausted);
    assert_eq!(report.bars_seen, 4);
    assert_eq!(report.metrics.total_trades, 1);
    assert_eq!(report.metrics.long_trades, 1);
    assert_eq!(report.metrics.gross_pnl_micros, -2 * MICROS_PER_UNIT);
    assert_eq!(report.metrics.total_fee_micros, MICROS_PER_UNIT / 2);
    assert_eq!(report.metrics.net_pnl_micros, -2 * MICROS_PER_UNIT - MICROS_PER_UNIT / 2);
    assert_eq!(report.metrics.state, WaitState::Idle);
    assert!(!paper.is_subscribed(EventKind::PositionAdded), "torn down");
}

#[tokio::test]
async fn refusal_stops_the_run() {
    let paper = paper();
    paper.set_mark("ESZ5|sim", 100 * MICROS_PER_UNIT);
    paper.script_order(ScriptedOutcome::Refuse("account disabled".to_string()));

    let events = paper.event_receiver();
    let runner = SessionRunner::new(session(&paper));
    let (tx, rx) = mpsc::channel(16);
    for i in 0..6 {
        tx.send(BarEvent::NewBar(bar(i, 100, 101))).await.unwrap();
    }
    drop(tx);

    let report = runner.run(events, rx).await;
    let RunExit::StopRequested { refusal } = &report.exit else {
        panic!("unexpected exit {:?}", report.exit);
    };
    assert_eq!(refusal.message.as_deref(), Some("account disabled"));
    assert_eq!(report.bars_seen, 3, "no bar after the refusal is consumed");
    assert_eq!(paper.placed_orders().len(), 1);
    assert!(!paper.is_subscribed(EventKind::OrderHistoryAdded));
}
