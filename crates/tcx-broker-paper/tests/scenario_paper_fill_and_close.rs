//! Paper backend round trip.
//!
//! - market order fills at the mark: PositionAdded + OrderHistoryAdded(Filled)
//! - close realizes gross P/L, fee is charged, TradeAdded carries the opening side
//! - scripted failures: sync reject, transport error, async refusal
//! - placeholder descriptors resolve to registered live handles

use tcx_broker_paper::{PaperBackend, ScriptedOutcome};
use tcx_execution::*;
use tcx_identity::{AccountHandle, CreationDescriptor, HandleDirectory, InstrumentHandle};
use tcx_schemas::*;

fn es() -> InstrumentHandle {
    InstrumentHandle::live("ESZ5|sim", "E-mini Dec", "sim")
}

fn acc() -> AccountHandle {
    AccountHandle::live("acc-1", "Sim101", "sim")
}

fn paper() -> PaperBackend {
    let p = PaperBackend::with_standard_order_types("sim");
    p.add_instrument(es());
    p.add_account(acc());
    for kind in EventKind::ALL {
        p.subscribe(kind).unwrap();
    }
    p
}

fn order(side: Side) -> PlaceOrderRequest {
    PlaceOrderRequest {
        client_order_id: "c-1".to_string(),
        instrument: es(),
        account: acc(),
        side,
        order_type_id: OrderTypeId::new("sim:Market"),
        quantity: 2,
        time_in_force: TimeInForce::Day,
    }
}

#[test]
fn fill_then_close_realizes_pnl() {
    let p = paper();
    p.set_fee(1_500_000);
    let mut rx = p.event_receiver();

    p.set_mark("ESZ5|sim", 100 * MICROS_PER_UNIT);
    let r = p.place_order(order(Side::Sell)).unwrap();
    assert!(r.is_success());

    let BackendEvent::PositionAdded(pos) = rx.try_recv().unwrap() else {
        panic!("expected PositionAdded first");
    };
    assert_eq!(pos.side, PositionSide::Short);
    assert_eq!(pos.quantity, 2);
    match rx.try_recv().unwrap() {
        BackendEvent::OrderHistoryAdded(rec) => assert_eq!(rec.status, OrderStatus::Filled),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(p.live_positions().seq, 1);

    // Short from 100 to 97: +3 per unit, 2 units.
    p.set_mark("ESZ5|sim", 97 * MICROS_PER_UNIT);
    assert!(p.close_position(&pos).unwrap().is_success());

    assert_eq!(rx.try_recv().unwrap(), BackendEvent::PositionRemoved(pos));
    let BackendEvent::TradeAdded(trade) = rx.try_recv().unwrap() else {
        panic!("expected TradeAdded");
    };
    assert_eq!(trade.side, Side::Sell);
    assert_eq!(trade.gross_pnl_micros, Some(6 * MICROS_PER_UNIT));
    assert_eq!(trade.fee_micros, Some(1_500_000));
    assert_eq!(trade.net_pnl_micros, Some(4_500_000));

    let live = p.live_positions();
    assert!(live.positions.is_empty());
    assert_eq!(live.seq, 2);
}

#[test]
fn scripted_failures() {
    let p = paper();
    p.set_mark("ESZ5|sim", 100 * MICROS_PER_UNIT);
    let mut rx = p.event_receiver();

    p.script_order(ScriptedOutcome::Reject("insufficient margin".to_string()));
    let r = p.place_order(order(Side::Buy)).unwrap();
    assert_eq!(r.status, OperationStatus::Failure);
    assert_eq!(r.message.as_deref(), Some("insufficient margin"));

    p.script_order(ScriptedOutcome::TransportError("socket closed".to_string()));
    let err = p.place_order(order(Side::Buy)).unwrap_err();
    assert_eq!(err.to_string(), "socket closed");

    p.script_order(ScriptedOutcome::Refuse("market closed".to_string()));
    assert!(p.place_order(order(Side::Buy)).unwrap().is_success());
    match rx.try_recv().unwrap() {
        BackendEvent::OrderHistoryAdded(rec) => {
            assert_eq!(rec.status, OrderStatus::Refused);
            assert_eq!(rec.message.as_deref(), Some("market closed"));
        }
        other => panic!("unexpected {other:?}"),
    }

    assert!(p.live_positions().positions.is_empty());
    assert_eq!(p.placed_orders().len(), 3);
}

#[test]
fn wrong_order_type_or_missing_mark_fails_synchronously() {
    let p = paper();
    let mut req = order(Side::Buy);
    req.order_type_id = OrderTypeId::new("sim:Limit");
    p.set_mark("ESZ5|sim", 1);
    assert!(!p.place_order(req).unwrap().is_success());

    let other = PaperBackend::with_standard_order_types("sim");
    assert!(!other.place_order(order(Side::Buy)).unwrap().is_success());
}

#[test]
fn directory_resolves_placeholders() {
    let p = paper();

    let desc = CreationDescriptor::new("ESZ5|sim", "E-mini Dec", "sim");
    let resolved = p.resolve_instrument(&desc).expect("instrument");
    assert!(!resolved.is_placeholder());
    assert_eq!(resolved.descriptor.as_ref(), Some(&desc));

    // Same name + connection, stale id.
    let acc_desc = CreationDescriptor::new("acc-OLD", "Sim101", "sim");
    assert_eq!(p.resolve_account(&acc_desc).map(|a| a.id), Some("acc-1".to_string()));

    assert!(p
        .resolve_account(&CreationDescriptor::new("x", "Live999", "sim"))
        .is_none());
}

#[test]
fn unsubscribe_failure_is_reported() {
    let p = paper();
    p.fail_unsubscribe(true);
    assert!(p.unsubscribe(EventKind::TradeAdded).is_err());
    assert!(p.is_subscribed(EventKind::TradeAdded));

    p.fail_unsubscribe(false);
    p.unsubscribe(EventKind::TradeAdded).unwrap();
    assert!(!p.is_subscribed(EventKind::TradeAdded));
}

#[test]
fn deferred_actions_settle_on_release() {
    let p = paper();
    p.set_mark("ESZ5|sim", 100 * MICROS_PER_UNIT);
    let mut rx = p.event_receiver();

    p.script_order(ScriptedOutcome::Defer);
    assert!(p.place_order(order(Side::Buy)).unwrap().is_success());
    assert!(rx.try_recv().is_err(), "nothing happens until release");
    assert!(p.live_positions().positions.is_empty());
    assert_eq!(p.pending_deferred(), 1);

    assert!(p.release_next());
    let BackendEvent::PositionAdded(pos) = rx.try_recv().unwrap() else {
        panic!("expected PositionAdded");
    };
    let _filled = rx.try_recv().unwrap();

    p.script_close(ScriptedOutcome::Defer);
    assert!(p.close_position(&pos).unwrap().is_success());
    assert_eq!(p.live_positions().positions.len(), 1);

    assert!(p.release_next());
    assert_eq!(rx.try_recv().unwrap(), BackendEvent::PositionRemoved(pos));
    assert!(!p.release_next());
}
