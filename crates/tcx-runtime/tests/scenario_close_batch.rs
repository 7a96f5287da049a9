//! Scenario C/D: closing open positions.
//!
//! - one long + bearish bar: one close command, Idle -> WaitingClose
//! - two positions closed one at a time: WaitingClose holds after the
//!   first, AllPositionsClosed fires once after the second, back to Idle
//! - a failing close does not abort the batch; WaitingClose persists
//! - a long facing a bullish bar is left alone

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tcx_broker_paper::{PaperBackend, ScriptedOutcome};
use tcx_config::SessionSettings;
use tcx_execution::{EventSource, TradingBackend};
use tcx_identity::{AccountHandle, InstrumentHandle};
use tcx_reconcile::DomainEvent;
use tcx_runtime::*;
use tcx_schemas::*;
use tcx_strategy::ThreeBarMomentum;

fn es() -> InstrumentHandle {
    InstrumentHandle::live("ESZ5|sim", "ESZ5", "sim")
}

fn acc() -> AccountHandle {
    AccountHandle::live("acc-1", "Sim101", "sim")
}

fn paper_with_longs(n: usize) -> Arc<PaperBackend> {
    let p = Arc::new(PaperBackend::with_standard_order_types("sim"));
    p.add_instrument(es());
    p.add_account(acc());
    p.set_mark("ESZ5|sim", 100 * MICROS_PER_UNIT);
    for _ in 0..n {
        p.open_external(es(), acc(), PositionSide::Long, 1, 100 * MICROS_PER_UNIT);
    }
    p
}

fn start(paper: &Arc<PaperBackend>) -> TradingSession {
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

fn bar(i: i64, open: i64, close: i64) -> BarEvent {
    BarEvent::NewBar(Bar {
        ts_close_utc: Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0).unwrap() + Duration::minutes(i),
        open_micros: open * MICROS_PER_UNIT,
        high_micros: open.max(close) * MICROS_PER_UNIT,
        low_micros: open.min(close) * MICROS_PER_UNIT,
        close_micros: close * MICROS_PER_UNIT,
        volume: 500,
    })
}

fn pump(session: &mut TradingSession, rx: &mut tokio::sync::broadcast::Receiver<BackendEvent>) {
    while let Ok(ev) = rx.try_recv() {
        session.handle_backend_event(&ev);
    }
}

#[test]
fn one_long_and_bearish_bar_submits_one_close() {
    let paper = paper_with_longs(1);
    let mut rx = paper.event_receiver();
    let mut session = start(&paper);
    assert_eq!(session.counts().long, 1, "seeded from pre-existing position");

    session.handle_bar(&bar(0, 101, 99));
    assert_eq!(paper.close_requests(), vec!["paper-pos-000001".to_string()]);
    assert_eq!(session.state(), WaitState::WaitingClose);

    pump(&mut session, &mut rx);
    assert_eq!(session.state(), WaitState::Idle);
    assert!(session.counts().is_flat());
    assert_eq!(session.metrics().total_trades, 1);
    assert_eq!(session.metrics().long_trades, 1);
}

#[test]
fn two_positions_closed_one_at_a_time() {
    let paper = paper_with_longs(2);
    let mut rx = paper.event_receiver();
    let mut session = start(&paper);
    let mut domain = session.subscribe_events();

    paper.script_close(ScriptedOutcome::Defer);
    paper.script_close(ScriptedOutcome::Defer);
    session.handle_bar(&bar(0, 101, 99));
    assert_eq!(paper.close_requests().len(), 2);
    assert_eq!(session.state(), WaitState::WaitingClose);

    assert!(paper.release_next());
    pump(&mut session, &mut rx);
    assert_eq!(session.counts().long, 1);
    assert_eq!(session.state(), WaitState::WaitingClose);

    // Bars while waiting are ignored.
    session.handle_bar(&bar(1, 101, 99));
    assert_eq!(paper.close_requests().len(), 2);

    assert!(paper.release_next());
    pump(&mut session, &mut rx);
    assert!(session.counts().is_flat());
    assert_eq!(session.state(), WaitState::Idle);

    let mut all_closed = 0;
    let mut closed = 0;
    while let Ok(ev) = domain.try_recv() {
        match ev {
            DomainEvent::AllPositionsClosed => all_closed += 1,
            DomainEvent::PositionClosed { .. } => closed += 1,
            _ => {}
        }
    }
    assert_eq!(closed, 2);
    assert_eq!(all_closed, 1);
}

#[test]
fn failed_close_does_not_abort_batch() {
    let paper = paper_with_longs(3);
    let mut rx = paper.event_receiver();
    let mut session = start(&paper);

    paper.script_close(ScriptedOutcome::TransportError("link down".to_string()));
    paper.script_close(ScriptedOutcome::Reject("locked".to_string()));
    session.handle_bar(&bar(0, 101, 99));

    assert_eq!(paper.close_requests().len(), 3, "every position attempted");
    assert_eq!(session.state(), WaitState::WaitingClose);

    pump(&mut session, &mut rx);
    assert_eq!(session.counts().long, 2);
    assert_eq!(
        session.state(),
        WaitState::WaitingClose,
        "only the all-closed signal releases the wait"
    );

    session.force_reset();
    assert_eq!(session.state(), WaitState::Idle);
}

#[test]
fn long_facing_bullish_bar_is_left_alone() {
    let paper = paper_with_longs(1);
    let mut session = start(&paper);

    session.handle_bar(&bar(0, 99, 101));
    assert!(paper.close_requests().is_empty());
    assert!(paper.placed_orders().is_empty(), "never open while not flat");
    assert_eq!(session.state(), WaitState::Idle);
}
