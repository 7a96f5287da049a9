//! Deterministic in-memory "paper" trading backend.
//!
//! Design decisions (kept simple/deterministic):
//! - Market orders fill immediately at the instrument's current mark,
//!   unless the call was scripted to [`ScriptedOutcome::Defer`].
//! - Every fill opens its own position; there is no netting.
//! - Position ids are `paper-pos-{n:06}`, order ids `paper-ord-{n:06}`.
//! - Every change to the position set bumps `seq`.
//! - Push events go out on a broadcast channel, only for subscribed kinds.
//! - Failures are scripted per call ([`ScriptedOutcome`]); nothing is random.
//! - No timestamps.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use tcx_execution::{
    BackendResult, EventSource, OrderBehavior, OrderTypeId, OrderTypeInfo, PlaceOrderRequest,
    TradingBackend, TradingOperationResult,
};
use tcx_identity::{
    same_account, same_instrument, AccountHandle, CreationDescriptor, HandleDirectory,
    InstrumentHandle,
};
use tcx_schemas::{
    BackendEvent, EventKind, OrderRecord, OrderStatus, Position, PositionSet, PositionSide, Trade,
};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 1024;

/// Outcome of the next scripted place-order or close-position call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Normal behavior.
    Fill,
    /// Synchronous `Failure` status with this message.
    Reject(String),
    /// `Err` from the call: the request never reached the venue.
    TransportError(String),
    /// `Success` now, then an asynchronous `Refused` order-history entry.
    /// Place-order only; treated as `Fill` for closes.
    Refuse(String),
    /// `Success` now; the fill or close happens on
    /// [`PaperBackend::release_next`].
    Defer,
}

#[derive(Clone, Debug)]
enum Deferred {
    Fill(PlaceOrderRequest),
    Close(String),
}

#[derive(Debug, Default)]
struct PaperState {
    instruments: Vec<InstrumentHandle>,
    accounts: Vec<AccountHandle>,
    order_types: Vec<OrderTypeInfo>,
    positions: BTreeMap<String, Position>,
    marks: BTreeMap<String, i64>,
    fee_micros: i64,
    seq: u64,
    next_position: u64,
    next_order: u64,
    next_trade: u64,
    subscribed: BTreeSet<EventKind>,
    order_script: VecDeque<ScriptedOutcome>,
    close_script: VecDeque<ScriptedOutcome>,
    deferred: VecDeque<Deferred>,
    fail_unsubscribe: bool,
    placed: Vec<PlaceOrderRequest>,
    close_requests: Vec<String>,
}

impl PaperState {
    fn live_set(&self) -> PositionSet {
        PositionSet {
            seq: self.seq,
            positions: self.positions.values().cloned().collect(),
        }
    }

    fn next_order_id(&mut self) -> String {
        self.next_order += 1;
        format!("paper-ord-{:06}", self.next_order)
    }

    fn next_position_id(&mut self) -> String {
        self.next_position += 1;
        format!("paper-pos-{:06}", self.next_position)
    }
}

/// In-memory backend. Share it as `Arc<PaperBackend>`; it implements
/// [`TradingBackend`], [`EventSource`] and [`HandleDirectory`].
#[derive(Debug)]
pub struct PaperBackend {
    state: Mutex<PaperState>,
    events: broadcast::Sender<BackendEvent>,
}

impl Default for PaperBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperBackend {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(PaperState::default()),
            events,
        }
    }

    /// A backend offering Market, Limit and Stop on `connection_id`, with
    /// ids `"{connection_id}:{behavior}"`.
    pub fn with_standard_order_types(connection_id: &str) -> Self {
        let paper = Self::new();
        for behavior in [OrderBehavior::Market, OrderBehavior::Limit, OrderBehavior::Stop] {
            paper.add_order_type(OrderTypeInfo {
                id: OrderTypeId::new(format!("{connection_id}:{behavior}")),
                connection_id: connection_id.to_string(),
                behavior,
            });
        }
        paper
    }

    fn lock(&self) -> MutexGuard<'_, PaperState> {
        // State is plain data; a panic mid-update cannot leave it unusable.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Receiver for push events. Only subscribed kinds are delivered.
    pub fn event_receiver(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }

    pub fn add_instrument(&self, handle: InstrumentHandle) {
        self.lock().instruments.push(handle);
    }

    pub fn add_account(&self, handle: AccountHandle) {
        self.lock().accounts.push(handle);
    }

    pub fn add_order_type(&self, info: OrderTypeInfo) {
        self.lock().order_types.push(info);
    }

    /// Current mark for an instrument, in micros.
    pub fn set_mark(&self, instrument_id: &str, price_micros: i64) {
        self.lock()
            .marks
            .insert(instrument_id.to_string(), price_micros);
    }

    /// Fee charged per closed trade, in micros.
    pub fn set_fee(&self, fee_micros: i64) {
        self.lock().fee_micros = fee_micros;
    }

    pub fn script_order(&self, outcome: ScriptedOutcome) {
        self.lock().order_script.push_back(outcome);
    }

    pub fn script_close(&self, outcome: ScriptedOutcome) {
        self.lock().close_script.push_back(outcome);
    }

    pub fn fail_unsubscribe(&self, fail: bool) {
        self.lock().fail_unsubscribe = fail;
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.lock().subscribed.contains(&kind)
    }

    /// Every place-order request received, in order.
    pub fn placed_orders(&self) -> Vec<PlaceOrderRequest> {
        self.lock().placed.clone()
    }

    /// Position ids of every close-position request received, in order.
    pub fn close_requests(&self) -> Vec<String> {
        self.lock().close_requests.clone()
    }

    /// Open a position outside any session (manual trade, other strategy).
    pub fn open_external(
        &self,
        instrument: InstrumentHandle,
        account: AccountHandle,
        side: PositionSide,
        quantity: i64,
        open_price_micros: i64,
    ) -> Position {
        let mut st = self.lock();
        let position = Position {
            id: st.next_position_id(),
            instrument,
            account,
            side,
            open_price_micros,
            quantity,
        };
        st.positions.insert(position.id.clone(), position.clone());
        st.seq += 1;
        self.emit(&st, BackendEvent::PositionAdded(position.clone()));
        position
    }

    /// Push an arbitrary event (if its kind is subscribed).
    pub fn publish(&self, event: BackendEvent) {
        let st = self.lock();
        self.emit(&st, event);
    }

    fn emit(&self, st: &PaperState, event: BackendEvent) {
        if !st.subscribed.contains(&event.kind()) {
            debug!("paper: dropping {} (not subscribed)", event.kind().as_str());
            return;
        }
        // No receivers is not an error for a paper venue.
        let _ = self.events.send(event);
    }

    /// Execute the oldest deferred fill or close. Returns false when none
    /// is pending.
    pub fn release_next(&self) -> bool {
        let mut st = self.lock();
        let Some(next) = st.deferred.pop_front() else {
            return false;
        };
        let result = match next {
            Deferred::Fill(req) => self.fill_locked(&mut st, &req),
            Deferred::Close(position_id) => self.close_locked(&mut st, &position_id),
        };
        if !result.is_success() {
            debug!(
                "paper: deferred action failed: {}",
                result.message.as_deref().unwrap_or("no message")
            );
        }
        true
    }

    pub fn pending_deferred(&self) -> usize {
        self.lock().deferred.len()
    }

    fn fill_locked(&self, st: &mut PaperState, req: &PlaceOrderRequest) -> TradingOperationResult {
        if req.quantity <= 0 {
            return TradingOperationResult::failure("quantity must be positive");
        }
        let known_type = st.order_types.iter().any(|t| {
            t.id == req.order_type_id
                && t.connection_id == req.instrument.connection_id
                && t.behavior == OrderBehavior::Market
        });
        if !known_type {
            return TradingOperationResult::failure(format!(
                "order type {} is not a market order on {}",
                req.order_type_id.as_str(),
                req.instrument.connection_id
            ));
        }
        let Some(mark) = st.marks.get(&req.instrument.id).copied() else {
            return TradingOperationResult::failure(format!("no mark for {}", req.instrument.name));
        };

        let order_id = st.next_order_id();
        let position = Position {
            id: st.next_position_id(),
            instrument: req.instrument.clone(),
            account: req.account.clone(),
            side: PositionSide::from(req.side),
            open_price_micros: mark,
            quantity: req.quantity,
        };
        st.positions.insert(position.id.clone(), position.clone());
        st.seq += 1;

        debug!(
            "paper: filled {} {} x{} @ {} -> {}",
            order_id, req.side, req.quantity, mark, position.id
        );
        self.emit(st, BackendEvent::PositionAdded(position));
        let rec = Self::record(req, order_id, OrderStatus::Filled, None);
        self.emit(st, BackendEvent::OrderHistoryAdded(rec));

        TradingOperationResult::success()
    }

    fn close_locked(&self, st: &mut PaperState, position_id: &str) -> TradingOperationResult {
        let Some(open) = st.positions.remove(position_id) else {
            return TradingOperationResult::failure(format!("unknown position {position_id}"));
        };
        st.seq += 1;

        let mark = st
            .marks
            .get(&open.instrument.id)
            .copied()
            .unwrap_or(open.open_price_micros);
        let per_unit = match open.side {
            PositionSide::Long => mark - open.open_price_micros,
            PositionSide::Short => open.open_price_micros - mark,
        };
        let gross = per_unit.saturating_mul(open.quantity);
        let fee = st.fee_micros;

        st.next_trade += 1;
        let trade = Trade {
            id: format!("paper-trd-{:06}", st.next_trade),
            instrument: open.instrument.clone(),
            account: open.account.clone(),
            side: open.side.opening_side(),
            net_pnl_micros: Some(gross.saturating_sub(fee)),
            gross_pnl_micros: Some(gross),
            fee_micros: Some(fee),
        };

        debug!("paper: closed {} gross={} fee={}", open.id, gross, fee);
        self.emit(st, BackendEvent::PositionRemoved(open));
        self.emit(st, BackendEvent::TradeAdded(trade));

        TradingOperationResult::success()
    }

    fn record(
        req: &PlaceOrderRequest,
        order_id: String,
        status: OrderStatus,
        message: Option<String>,
    ) -> OrderRecord {
        OrderRecord {
            order_id,
            instrument: req.instrument.clone(),
            account: req.account.clone(),
            side: req.side,
            quantity: req.quantity,
            status,
            message,
        }
    }
}

impl TradingBackend for PaperBackend {
    fn place_order(&self, req: PlaceOrderRequest) -> BackendResult<TradingOperationResult> {
        let mut st = self.lock();
        st.placed.push(req.clone());
        let outcome = st.order_script.pop_front().unwrap_or(ScriptedOutcome::Fill);

        match outcome {
            ScriptedOutcome::TransportError(msg) => Err(msg.into()),
            ScriptedOutcome::Reject(msg) => Ok(TradingOperationResult::failure(msg)),
            ScriptedOutcome::Refuse(msg) => {
                let order_id = st.next_order_id();
                let rec = Self::record(&req, order_id, OrderStatus::Refused, Some(msg));
                self.emit(&st, BackendEvent::OrderHistoryAdded(rec));
                Ok(TradingOperationResult::success())
            }
            ScriptedOutcome::Defer => {
                st.deferred.push_back(Deferred::Fill(req));
                Ok(TradingOperationResult::success())
            }
            ScriptedOutcome::Fill => Ok(self.fill_locked(&mut st, &req)),
        }
    }

    fn close_position(&self, position: &Position) -> BackendResult<TradingOperationResult> {
        let mut st = self.lock();
        st.close_requests.push(position.id.clone());
        let outcome = st.close_script.pop_front().unwrap_or(ScriptedOutcome::Fill);

        match outcome {
            ScriptedOutcome::TransportError(msg) => Err(msg.into()),
            ScriptedOutcome::Reject(msg) => Ok(TradingOperationResult::failure(msg)),
            ScriptedOutcome::Defer => {
                if !st.positions.contains_key(&position.id) {
                    return Ok(TradingOperationResult::failure(format!(
                        "unknown position {}",
                        position.id
                    )));
                }
                st.deferred.push_back(Deferred::Close(position.id.clone()));
                Ok(TradingOperationResult::success())
            }
            ScriptedOutcome::Fill | ScriptedOutcome::Refuse(_) => {
                Ok(self.close_locked(&mut st, &position.id))
            }
        }
    }

    fn live_positions(&self) -> PositionSet {
        self.lock().live_set()
    }

    fn order_types(&self) -> Vec<OrderTypeInfo> {
        self.lock().order_types.clone()
    }
}

impl EventSource for PaperBackend {
    fn subscribe(&self, kind: EventKind) -> BackendResult<()> {
        self.lock().subscribed.insert(kind);
        Ok(())
    }

    fn unsubscribe(&self, kind: EventKind) -> BackendResult<()> {
        let mut st = self.lock();
        if st.fail_unsubscribe {
            return Err(format!(
                "paper: connection dropped, cannot unsubscribe {}",
                kind.as_str()
            )
            .into());
        }
        st.subscribed.remove(&kind);
        Ok(())
    }
}

impl HandleDirectory for PaperBackend {
    fn resolve_instrument(&self, descriptor: &CreationDescriptor) -> Option<InstrumentHandle> {
        let probe = InstrumentHandle::placeholder(descriptor.clone());
        self.lock()
            .instruments
            .iter()
            .find(|h| same_instrument(Some(*h), Some(&probe)))
            .map(|h| h.clone().with_descriptor(descriptor.clone()))
    }

    fn resolve_account(&self, descriptor: &CreationDescriptor) -> Option<AccountHandle> {
        let probe = AccountHandle::placeholder(descriptor.clone());
        self.lock()
            .accounts
            .iter()
            .find(|h| same_account(Some(*h), Some(&probe)))
            .map(|h| h.clone().with_descriptor(descriptor.clone()))
    }
}
