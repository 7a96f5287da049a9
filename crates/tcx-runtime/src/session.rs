//! Trading session: one scope, one owner.
//!
//! The session owns the dispatcher (ledger + statistics), the wait-state
//! machine, the order-type table and the bar window. Every mutation goes
//! through `&mut self`; callers with concurrent inputs funnel them through
//! a single task (see [`crate::SessionRunner`]).

use std::fmt;
use std::sync::Arc;

use tcx_config::SessionSettings;
use tcx_execution::{
    EventSource, OrderBehavior, OrderTypeTable, PlaceOrderRequest, ResolveFailure, TradingBackend,
};
use tcx_identity::{
    resolve_scope, AccountHandle, HandleDirectory, InstrumentHandle, ScopeError, ScopeKey,
};
use tcx_portfolio::{scoped_positions, PositionCounts};
use tcx_reconcile::{DomainEvent, OrderRefusal, ReconciliationDispatcher};
use tcx_schemas::{BackendEvent, BarEvent, EventKind, Position, Side};
use tcx_strategy::{RecentBars, SignalModel};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{MetricsSnapshot, TradingStateMachine, WaitEvent, WaitState};

const DOMAIN_EVENT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Errors / control
// ---------------------------------------------------------------------------

/// Fatal session-start failures. A session that fails `init` never runs.
#[derive(Debug)]
pub enum SessionError {
    ScopeInvalid(ScopeError),
    InvalidSettings(String),
    /// The required order type is not offered by the scope's connection.
    OrderTypeUnavailable {
        connection_id: String,
        failures: Vec<ResolveFailure>,
    },
    EventSourceUnavailable,
    Subscribe {
        kind: EventKind,
        message: String,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ScopeInvalid(e) => write!(f, "{e}"),
            SessionError::InvalidSettings(msg) => write!(f, "SESSION_SETTINGS_INVALID: {msg}"),
            SessionError::OrderTypeUnavailable {
                connection_id,
                failures,
            } => {
                write!(
                    f,
                    "ORDER_TYPE_UNAVAILABLE: connection '{connection_id}' cannot place required order types"
                )?;
                for failure in failures {
                    write!(f, "; {failure}")?;
                }
                Ok(())
            }
            SessionError::EventSourceUnavailable => {
                write!(f, "EVENT_SOURCE_UNAVAILABLE: no event source to subscribe to")
            }
            SessionError::Subscribe { kind, message } => {
                write!(f, "SUBSCRIBE_FAILED: {}: {message}", kind.as_str())
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::ScopeInvalid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ScopeError> for SessionError {
    fn from(e: ScopeError) -> Self {
        SessionError::ScopeInvalid(e)
    }
}

/// What the caller should do after handing an input to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionControl {
    Continue,
    /// A scoped refusal arrived; the whole session must stop.
    StopRequested(OrderRefusal),
}

impl SessionControl {
    pub fn is_stop(&self) -> bool {
        matches!(self, SessionControl::StopRequested(_))
    }
}

/// Everything `init` needs besides the handle directory.
pub struct SessionInit {
    pub settings: SessionSettings,
    pub instrument: Option<InstrumentHandle>,
    pub account: Option<AccountHandle>,
    pub backend: Arc<dyn TradingBackend>,
    pub source: Option<Arc<dyn EventSource>>,
    pub signal: Box<dyn SignalModel>,
}

// ---------------------------------------------------------------------------
// TradingSession
// ---------------------------------------------------------------------------

pub struct TradingSession {
    settings: SessionSettings,
    backend: Arc<dyn TradingBackend>,
    source: Option<Arc<dyn EventSource>>,
    signal: Box<dyn SignalModel>,
    dispatcher: ReconciliationDispatcher,
    machine: TradingStateMachine,
    order_types: OrderTypeTable,
    bars: RecentBars,
    bus: broadcast::Sender<DomainEvent>,
    stopped: Option<OrderRefusal>,
    torn_down: bool,
}

impl fmt::Debug for TradingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradingSession")
            .field("scope", self.dispatcher.scope())
            .field("state", &self.machine.state())
            .field("signal", &self.signal.name())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl TradingSession {
    /// Resolve and validate the scope, resolve order types, subscribe to
    /// the four backend event kinds and seed the ledger.
    pub fn init(init: SessionInit, directory: &dyn HandleDirectory) -> Result<Self, SessionError> {
        let SessionInit {
            settings,
            instrument,
            account,
            backend,
            source,
            signal,
        } = init;

        let scope = resolve_scope(instrument, account, directory).map_err(|e| {
            error!("session start refused: {e}");
            SessionError::from(e)
        })?;
        let name = scope.instrument().name.clone();

        if settings.quantity <= 0 {
            return Err(SessionError::InvalidSettings(format!(
                "quantity must be > 0 (got {})",
                settings.quantity
            )));
        }
        let settings = settings.with_required_order_type();

        let order_types = resolve_order_types(&scope, &settings, backend.as_ref())?;

        let Some(src) = source.as_ref() else {
            error!("[{name}] no event source; cannot reconcile");
            return Err(SessionError::EventSourceUnavailable);
        };
        subscribe_all(&name, src.as_ref())?;

        let mut dispatcher = ReconciliationDispatcher::new(scope);
        dispatcher.seed(&backend.live_positions());

        let (bus, _rx) = broadcast::channel(DOMAIN_EVENT_CAPACITY);
        info!(
            "[{name}] session started account={} period={} signal={}",
            dispatcher.scope().account().name,
            settings.period,
            signal.name()
        );

        Ok(Self {
            settings,
            backend,
            source,
            signal,
            dispatcher,
            machine: TradingStateMachine::new(),
            order_types,
            bars: RecentBars::default(),
            bus,
            stopped: None,
            torn_down: false,
        })
    }

    // --- read side ---------------------------------------------------------

    pub fn scope(&self) -> &ScopeKey {
        self.dispatcher.scope()
    }

    pub fn state(&self) -> WaitState {
        self.machine.state()
    }

    pub fn counts(&self) -> PositionCounts {
        self.dispatcher.ledger().counts()
    }

    pub fn order_types(&self) -> &OrderTypeTable {
        &self.order_types
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Observe domain events as they are applied.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.bus.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let counts = self.counts();
        let stats = self.dispatcher.stats();
        MetricsSnapshot {
            symbol: self.scope().instrument().name.clone(),
            account: self.scope().account().name.clone(),
            period: self.settings.period.clone(),
            state: self.machine.state(),
            long_positions: counts.long,
            short_positions: counts.short,
            net_pnl_micros: stats.net_pnl_micros(),
            gross_pnl_micros: stats.gross_pnl_micros(),
            total_fee_micros: stats.fee_micros(),
            total_trades: stats.total_trades(),
            long_trades: stats.long_trades(),
            short_trades: stats.short_trades(),
        }
    }

    // --- inputs ------------------------------------------------------------

    /// Reconcile one backend push notification.
    pub fn handle_backend_event(&mut self, event: &BackendEvent) -> SessionControl {
        if let Some(control) = self.inactive_control() {
            return control;
        }

        let backend = Arc::clone(&self.backend);
        let dispatched = self.dispatcher.dispatch(event, || backend.live_positions());

        let mut control = SessionControl::Continue;
        for ev in dispatched.events {
            debug!("[{}] {} <- {}", self.name(), ev.name(), event.kind().as_str());
            if let SessionControl::StopRequested(r) = self.apply_domain_event(&ev) {
                control = SessionControl::StopRequested(r);
            }
            // No observers is fine.
            let _ = self.bus.send(ev);
        }
        control
    }

    /// Feed a bar event. Decisions are taken on completed bars only.
    pub fn handle_bar(&mut self, event: &BarEvent) -> SessionControl {
        if let Some(control) = self.inactive_control() {
            return control;
        }
        if !self.bars.apply(event) {
            return SessionControl::Continue;
        }

        if !self.machine.is_idle() {
            debug!(
                "[{}] {}: ignoring bar",
                self.name(),
                self.machine.state().as_str()
            );
            return SessionControl::Continue;
        }

        let counts = self.counts();
        if !counts.is_flat() {
            if self.signal.close_signal(&self.bars, counts) {
                self.submit_closes();
            }
        } else if let Some(side) = self.signal.open_signal(&self.bars) {
            self.submit_open(side);
        }
        SessionControl::Continue
    }

    /// Zero the monetary totals. Trade counts are kept.
    pub fn reset_statistics(&mut self) {
        self.dispatcher.stats_mut().reset();
        info!("[{}] statistics reset", self.name());
    }

    /// Return to Idle regardless of outstanding intents.
    pub fn force_reset(&mut self) {
        let from = self.machine.state();
        self.reset_all_records();
        if from != WaitState::Idle {
            warn!("[{}] forced reset from {}", self.name(), from.as_str());
        }
    }

    /// Unsubscribe from all four event kinds, then release ledger,
    /// statistics and order types. Never fails; safe to call twice.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        let name = self.name().to_string();

        match self.source.as_ref() {
            Some(src) => {
                for kind in EventKind::ALL {
                    if let Err(e) = src.unsubscribe(kind) {
                        warn!("[{name}] unsubscribe {} failed: {e}", kind.as_str());
                    }
                }
            }
            None => warn!("[{name}] no event source at teardown; skipping unsubscribe"),
        }

        self.dispatcher.clear();
        self.order_types.clear();
        self.bars.clear();
        self.machine = TradingStateMachine::new();
        self.torn_down = true;
        info!("[{name}] session torn down");
    }

    // --- internals ---------------------------------------------------------

    fn name(&self) -> &str {
        &self.dispatcher.scope().instrument().name
    }

    fn inactive_control(&self) -> Option<SessionControl> {
        if let Some(r) = &self.stopped {
            return Some(SessionControl::StopRequested(r.clone()));
        }
        if self.torn_down {
            return Some(SessionControl::Continue);
        }
        None
    }

    fn apply_domain_event(&mut self, event: &DomainEvent) -> SessionControl {
        match event {
            DomainEvent::PositionOpened { .. } => {
                self.transition(WaitEvent::PositionOpened);
            }
            DomainEvent::AllPositionsClosed => self.reset_all_records(),
            DomainEvent::OrderRefused(refusal) => {
                error!("[{}] stopping session: {refusal}", self.name());
                self.stopped = Some(refusal.clone());
                return SessionControl::StopRequested(refusal.clone());
            }
            DomainEvent::PositionClosed { .. }
            | DomainEvent::TradeRecorded { .. }
            | DomainEvent::TradeAdded { .. } => {}
        }
        SessionControl::Continue
    }

    /// Clears both wait flags.
    fn reset_all_records(&mut self) {
        self.transition(WaitEvent::ForceReset);
    }

    fn transition(&mut self, event: WaitEvent) -> bool {
        match self.machine.apply(event) {
            Ok(_) => true,
            Err(e) => {
                error!("[{}] {e}", self.name());
                false
            }
        }
    }

    fn submit_open(&mut self, side: Side) {
        let Some(order_type_id) = self.order_types.lookup(OrderBehavior::Market).cloned() else {
            error!("[{}] no market order type resolved; staying idle", self.name());
            return;
        };

        let scope = self.dispatcher.scope();
        let req = PlaceOrderRequest {
            client_order_id: Uuid::new_v4().to_string(),
            instrument: scope.instrument().clone(),
            account: scope.account().clone(),
            side,
            order_type_id,
            quantity: self.settings.quantity,
            time_in_force: self.settings.time_in_force,
        };
        let client_order_id = req.client_order_id.clone();

        // Set before the call so a confirmation delivered during it finds
        // the flag already up.
        if !self.transition(WaitEvent::OpenSubmitted) {
            return;
        }
        info!(
            "[{}] submitting {side} x{} client_order_id={client_order_id}",
            self.name(),
            self.settings.quantity
        );

        match self.backend.place_order(req) {
            Ok(result) if result.is_success() => {}
            Ok(result) => {
                warn!(
                    "[{}] open rejected: {}",
                    self.name(),
                    result.message.as_deref().unwrap_or("no message")
                );
                self.transition(WaitEvent::OpenFailed);
            }
            Err(e) => {
                error!("[{}] open submission failed: {e}", self.name());
                self.transition(WaitEvent::OpenFailed);
            }
        }
    }

    fn submit_closes(&mut self) {
        let live = self.backend.live_positions();
        let positions: Vec<Position> = scoped_positions(self.dispatcher.scope(), &live)
            .into_iter()
            .cloned()
            .collect();

        if positions.is_empty() {
            warn!(
                "[{}] close signal but no live positions in scope; staying idle",
                self.name()
            );
            return;
        }
        if !self.transition(WaitEvent::CloseSubmitted) {
            return;
        }

        info!("[{}] closing {} position(s)", self.name(), positions.len());
        for position in &positions {
            match self.backend.close_position(position) {
                Ok(result) if result.is_success() => {}
                Ok(result) => warn!(
                    "[{}] close {} rejected: {}",
                    self.name(),
                    position.id,
                    result.message.as_deref().unwrap_or("no message")
                ),
                Err(e) => error!("[{}] close {} failed: {e}", self.name(), position.id),
            }
        }
    }
}

impl Drop for TradingSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn resolve_order_types(
    scope: &ScopeKey,
    settings: &SessionSettings,
    backend: &dyn TradingBackend,
) -> Result<OrderTypeTable, SessionError> {
    let name = &scope.instrument().name;
    let connection_id = scope.connection_id();

    let mut table = OrderTypeTable::new();
    let all_ok = table.resolve(&settings.order_types, connection_id, &backend.order_types());
    for failure in table.failures() {
        warn!("[{name}] {failure}");
    }

    if table.lookup(OrderBehavior::Market).is_none() {
        error!("[{name}] market order type unavailable on '{connection_id}'");
        return Err(SessionError::OrderTypeUnavailable {
            connection_id: connection_id.to_string(),
            failures: table.failures().to_vec(),
        });
    }
    if !all_ok {
        warn!("[{name}] some optional order types did not resolve; continuing");
    }
    Ok(table)
}

fn subscribe_all(name: &str, source: &dyn EventSource) -> Result<(), SessionError> {
    for (i, kind) in EventKind::ALL.iter().enumerate() {
        if let Err(e) = source.subscribe(*kind) {
            error!("[{name}] subscribe {} failed: {e}", kind.as_str());
            for done in &EventKind::ALL[..i] {
                if let Err(e) = source.unsubscribe(*done) {
                    warn!("[{name}] rollback unsubscribe {} failed: {e}", done.as_str());
                }
            }
            return Err(SessionError::Subscribe {
                kind: *kind,
                message: e.to_string(),
            });
        }
    }
    Ok(())
}
