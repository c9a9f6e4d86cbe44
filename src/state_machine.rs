//! Wake cycle state machine
//!
//! Tracks where one wake cycle is and decides how it ends. Every cycle starts
//! at `Idle` after boot and finishes in one of the two terminal states.

use crate::config::WAKE_INTERVAL;
use core::time::Duration;
use log::{info, warn};

/// Cycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    // Booted, settings loaded
    Idle,

    // Network bring-up
    Connecting,
    Resolving,

    // Work
    Querying,
    Rendering,

    // Terminal
    SleepPending,
    RestartPending,
}

/// Events reported by the cycle driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    ConfigLoaded,
    Connected,
    ConnectFailed,
    Resolved,
    ResolveFailed,
    QueryFinished,
    Rendered,
}

/// State transition result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    /// Event does not apply in the current state
    Stay,
    /// Moved to a new state
    Transition(CycleState),
}

/// What the board does once the cycle is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalAction {
    /// Arm the RTC timer and enter deep sleep
    DeepSleep { wake_after: Duration },
    /// Software reset straight away
    Restart,
}

/// Power state control for the terminal action
pub trait PowerControl {
    fn deep_sleep(&mut self, wake_after: Duration) -> !;
    fn restart(&mut self) -> !;
}

impl TerminalAction {
    /// Hand the board over to the power controller
    pub fn apply<P: PowerControl>(self, power: &mut P) -> ! {
        match self {
            TerminalAction::DeepSleep { wake_after } => {
                info!("[STATE] Deep sleep for {} ms", wake_after.as_millis());
                power.deep_sleep(wake_after)
            }
            TerminalAction::Restart => {
                warn!("[STATE] Restarting");
                power.restart()
            }
        }
    }
}

/// Upper bound on states visited in one cycle
pub const MAX_CYCLE_STATES: usize = 8;

/// Wake cycle state machine
pub struct CycleStateMachine {
    current_state: CycleState,
    history: heapless::Vec<CycleState, MAX_CYCLE_STATES>,
}

impl Default for CycleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStateMachine {
    pub fn new() -> Self {
        let mut history = heapless::Vec::new();
        history.push(CycleState::Idle).ok();
        Self {
            current_state: CycleState::Idle,
            history,
        }
    }

    pub fn get_current_state(&self) -> CycleState {
        self.current_state
    }

    /// States visited so far, starting with `Idle`
    pub fn history(&self) -> &[CycleState] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.current_state,
            CycleState::SleepPending | CycleState::RestartPending
        )
    }

    /// The terminal action, once the cycle has finished
    pub fn terminal_action(&self) -> Option<TerminalAction> {
        match self.current_state {
            CycleState::SleepPending => Some(TerminalAction::DeepSleep {
                wake_after: WAKE_INTERVAL,
            }),
            CycleState::RestartPending => Some(TerminalAction::Restart),
            _ => None,
        }
    }

    /// Feed an event
    pub fn handle_event(&mut self, event: CycleEvent) -> StateTransition {
        let transition = Self::get_state_transition(self.current_state, event);

        match transition {
            StateTransition::Transition(new_state) => self.transition_to_state(new_state),
            StateTransition::Stay => {
                warn!("[STATE] Ignoring {:?} in {:?}", event, self.current_state);
            }
        }

        transition
    }

    fn transition_to_state(&mut self, new_state: CycleState) {
        match new_state {
            CycleState::RestartPending => {
                warn!("[STATE] {:?} -> {:?}", self.current_state, new_state)
            }
            _ => info!("[STATE] {:?} -> {:?}", self.current_state, new_state),
        }
        self.current_state = new_state;
        self.history.push(new_state).ok();
    }

    fn get_state_transition(current_state: CycleState, event: CycleEvent) -> StateTransition {
        match (current_state, event) {
            (CycleState::Idle, CycleEvent::ConfigLoaded) => {
                StateTransition::Transition(CycleState::Connecting)
            }

            // Nothing is up yet, so a failed connect restarts directly
            (CycleState::Connecting, CycleEvent::Connected) => {
                StateTransition::Transition(CycleState::Resolving)
            }
            (CycleState::Connecting, CycleEvent::ConnectFailed) => {
                StateTransition::Transition(CycleState::RestartPending)
            }

            (CycleState::Resolving, CycleEvent::Resolved) => {
                StateTransition::Transition(CycleState::Querying)
            }
            (CycleState::Resolving, CycleEvent::ResolveFailed) => {
                StateTransition::Transition(CycleState::RestartPending)
            }

            // An absent value still renders, so the query step cannot fail
            (CycleState::Querying, CycleEvent::QueryFinished) => {
                StateTransition::Transition(CycleState::Rendering)
            }
            (CycleState::Rendering, CycleEvent::Rendered) => {
                StateTransition::Transition(CycleState::SleepPending)
            }

            _ => StateTransition::Stay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(events: &[CycleEvent]) -> CycleStateMachine {
        let mut sm = CycleStateMachine::new();
        for event in events {
            sm.handle_event(*event);
        }
        sm
    }

    #[test]
    fn happy_path_ends_in_sleep() {
        let sm = feed(&[
            CycleEvent::ConfigLoaded,
            CycleEvent::Connected,
            CycleEvent::Resolved,
            CycleEvent::QueryFinished,
            CycleEvent::Rendered,
        ]);
        assert_eq!(
            sm.history(),
            [
                CycleState::Idle,
                CycleState::Connecting,
                CycleState::Resolving,
                CycleState::Querying,
                CycleState::Rendering,
                CycleState::SleepPending,
            ]
        );
        assert!(sm.is_terminal());
        assert_eq!(
            sm.terminal_action(),
            Some(TerminalAction::DeepSleep {
                wake_after: Duration::from_secs(5)
            })
        );
    }

    #[test]
    fn connect_failure_restarts() {
        let sm = feed(&[CycleEvent::ConfigLoaded, CycleEvent::ConnectFailed]);
        assert_eq!(sm.get_current_state(), CycleState::RestartPending);
        assert_eq!(sm.terminal_action(), Some(TerminalAction::Restart));
    }

    #[test]
    fn resolve_failure_restarts() {
        let sm = feed(&[
            CycleEvent::ConfigLoaded,
            CycleEvent::Connected,
            CycleEvent::ResolveFailed,
        ]);
        assert_eq!(sm.get_current_state(), CycleState::RestartPending);
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let mut sm = CycleStateMachine::new();
        assert_eq!(sm.handle_event(CycleEvent::Rendered), StateTransition::Stay);
        assert_eq!(sm.get_current_state(), CycleState::Idle);
        assert_eq!(sm.terminal_action(), None);

        let mut sm = feed(&[CycleEvent::ConfigLoaded, CycleEvent::ConnectFailed]);
        assert_eq!(sm.handle_event(CycleEvent::Connected), StateTransition::Stay);
        assert_eq!(sm.get_current_state(), CycleState::RestartPending);
    }
}
