//! Trading wait-state machine.
//!
//! # Design
//!
//! One machine per scope. It is the overlap guard: at most one open intent
//! or one batch of close intents is outstanding at a time. Every change
//! goes through [`TradingStateMachine::apply`], which only accepts legal
//! transitions.
//!
//! ```text
//!            OpenSubmitted               CloseSubmitted
//!   Idle ─────────────────► WaitingOpen   Idle ──────────► WaitingClose
//!    ▲                          │                               │
//!    │  PositionOpened          │                               │
//!    │  OpenFailed              │                               │
//!    ├──────────────────────────┘                               │
//!    │               AllPositionsClosed | ForceReset            │
//!    └──────────────────────────────────────────────────────────┘
//! ```
//!
//! `AllPositionsClosed` and `ForceReset` return to Idle from any state.
//! There is no timeout: a confirmation that never arrives leaves the
//! machine waiting until a caller applies `ForceReset`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitState {
    #[default]
    Idle,
    WaitingOpen,
    WaitingClose,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Idle => "idle",
            WaitState::WaitingOpen => "waiting_open",
            WaitState::WaitingClose => "waiting_close",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitEvent {
    /// An open order is about to be submitted. Applied before the call.
    OpenSubmitted,
    /// The open submission failed synchronously or never reached the venue.
    OpenFailed,
    /// A batch of close commands is about to be submitted.
    CloseSubmitted,
    /// A scoped position was confirmed open.
    PositionOpened,
    /// The scope became flat.
    AllPositionsClosed,
    /// External reset, e.g. a caller-side timeout policy.
    ForceReset,
}

/// Returned when an event is not legal in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: WaitState,
    pub event: WaitEvent,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal wait-state transition: {:?} + {:?}", self.from, self.event)
    }
}

impl std::error::Error for TransitionError {}

#[derive(Debug, Clone, Default)]
pub struct TradingStateMachine {
    state: WaitState,
}

impl TradingStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WaitState {
        self.state
    }

    /// Bars may only drive decisions while idle.
    pub fn is_idle(&self) -> bool {
        self.state == WaitState::Idle
    }

    /// Apply `event`, returning the new state.
    ///
    /// A `PositionOpened` outside `WaitingOpen` (a manual trade, a late
    /// duplicate) leaves the state unchanged.
    pub fn apply(&mut self, event: WaitEvent) -> Result<WaitState, TransitionError> {
        use WaitEvent::*;
        use WaitState::*;

        let next = match (self.state, event) {
            (Idle, OpenSubmitted) => WaitingOpen,
            (WaitingOpen, OpenFailed) => Idle,
            (Idle, CloseSubmitted) => WaitingClose,

            (WaitingOpen, PositionOpened) => Idle,
            (state @ (Idle | WaitingClose), PositionOpened) => state,

            (_, AllPositionsClosed | ForceReset) => Idle,

            (from, event) => return Err(TransitionError { from, event }),
        };

        self.state = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let mut m = TradingStateMachine::new();
        assert_eq!(m.apply(WaitEvent::OpenSubmitted), Ok(WaitState::WaitingOpen));
        assert_eq!(m.apply(WaitEvent::PositionOpened), Ok(WaitState::Idle));
    }

    #[test]
    fn open_failure_reverts_to_idle() {
        let mut m = TradingStateMachine::new();
        m.apply(WaitEvent::OpenSubmitted).unwrap();
        assert_eq!(m.apply(WaitEvent::OpenFailed), Ok(WaitState::Idle));
    }

    #[test]
    fn no_second_submission_while_waiting() {
        let mut m = TradingStateMachine::new();
        m.apply(WaitEvent::OpenSubmitted).unwrap();
        for ev in [WaitEvent::OpenSubmitted, WaitEvent::CloseSubmitted] {
            let err = m.apply(ev).unwrap_err();
            assert_eq!(err.from, WaitState::WaitingOpen);
        }

        let mut m = TradingStateMachine::new();
        m.apply(WaitEvent::CloseSubmitted).unwrap();
        assert!(m.apply(WaitEvent::OpenSubmitted).is_err());
        assert!(m.apply(WaitEvent::CloseSubmitted).is_err());
        assert!(m.apply(WaitEvent::OpenFailed).is_err());
        assert_eq!(m.state(), WaitState::WaitingClose);
    }

    #[test]
    fn position_opened_does_not_release_close_wait() {
        let mut m = TradingStateMachine::new();
        m.apply(WaitEvent::CloseSubmitted).unwrap();
        assert_eq!(m.apply(WaitEvent::PositionOpened), Ok(WaitState::WaitingClose));
        assert_eq!(m.apply(WaitEvent::AllPositionsClosed), Ok(WaitState::Idle));
    }

    #[test]
    fn force_reset_from_anywhere() {
        for setup in [WaitEvent::OpenSubmitted, WaitEvent::CloseSubmitted] {
            let mut m = TradingStateMachine::new();
            m.apply(setup).unwrap();
            assert_eq!(m.apply(WaitEvent::ForceReset), Ok(WaitState::Idle));
        }
    }
}
