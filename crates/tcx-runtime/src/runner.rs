//! Single-consumer session loop.
//!
//! Backend notifications and bar events arrive on separate channels; the
//! runner is the only task touching the session, so ledger, statistics
//! and wait-state are mutated strictly one input at a time. Backend events
//! win ties so confirmations are applied before the next decision.

use serde::{Deserialize, Serialize};
use tcx_reconcile::OrderRefusal;
use tcx_schemas::{BackendEvent, BarEvent};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::{MetricsSnapshot, SessionControl, TradingSession};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunExit {
    /// The bar feed closed and pending backend events were drained.
    BarsExhausted,
    /// A scoped refusal stopped the session.
    StopRequested { refusal: OrderRefusal },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub exit: RunExit,
    pub bars_seen: u64,
    pub backend_events_seen: u64,
    /// Backend events lost to a lagging receiver.
    pub backend_events_lagged: u64,
    /// Metrics taken just before teardown.
    pub metrics: MetricsSnapshot,
}

#[derive(Debug)]
pub struct SessionRunner {
    session: TradingSession,
    bars_seen: u64,
    events_seen: u64,
    lagged: u64,
}

impl SessionRunner {
    pub fn new(session: TradingSession) -> Self {
        Self {
            session,
            bars_seen: 0,
            events_seen: 0,
            lagged: 0,
        }
    }

    /// Drive the session until the bar feed ends or a stop is requested,
    /// then tear it down.
    pub async fn run(
        mut self,
        mut backend_events: broadcast::Receiver<BackendEvent>,
        mut bars: mpsc::Receiver<BarEvent>,
    ) -> RunReport {
        let name = self.session.scope().instrument().name.clone();
        let mut backend_open = true;

        let exit = loop {
            tokio::select! {
                biased;

                ev = backend_events.recv(), if backend_open => match ev {
                    Ok(ev) => {
                        if let Some(exit) = self.on_backend_event(&ev) {
                            break exit;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("[{name}] backend event receiver lagged; {n} event(s) lost");
                        self.lagged += n;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("[{name}] backend event stream closed");
                        backend_open = false;
                    }
                },

                bar = bars.recv() => match bar {
                    Some(bar) => {
                        self.bars_seen += 1;
                        if let SessionControl::StopRequested(refusal) = self.session.handle_bar(&bar) {
                            break RunExit::StopRequested { refusal };
                        }
                    }
                    None => {
                        match self.drain(&mut backend_events, backend_open) {
                            Some(exit) => break exit,
                            None => break RunExit::BarsExhausted,
                        }
                    }
                },
            }
        };

        let metrics = self.session.metrics();
        self.session.teardown();
        info!(
            "[{name}] run finished: {:?} bars={} events={}",
            exit, self.bars_seen, self.events_seen
        );

        RunReport {
            exit,
            bars_seen: self.bars_seen,
            backend_events_seen: self.events_seen,
            backend_events_lagged: self.lagged,
            metrics,
        }
    }

    fn on_backend_event(&mut self, ev: &BackendEvent) -> Option<RunExit> {
        self.events_seen += 1;
        match self.session.handle_backend_event(ev) {
            SessionControl::StopRequested(refusal) => Some(RunExit::StopRequested { refusal }),
            SessionControl::Continue => None,
        }
    }

    /// Apply whatever backend events are already queued.
    fn drain(
        &mut self,
        backend_events: &mut broadcast::Receiver<BackendEvent>,
        backend_open: bool,
    ) -> Option<RunExit> {
        if !backend_open {
            return None;
        }
        loop {
            match backend_events.try_recv() {
                Ok(ev) => {
                    if let Some(exit) = self.on_backend_event(&ev) {
                        return Some(exit);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => self.lagged += n,
                Err(_) => return None,
            }
        }
    }
}
