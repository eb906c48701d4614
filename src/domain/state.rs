use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineState {
    /// Between cycles, waiting for the next poll
    Idle,
    /// Fetching quotes and generating signals
    Polling,
    /// Evaluating one trade request against the risk gate
    Gating,
    /// Order submitted to the execution client
    Executing,
    /// Trading stopped; requires a restart
    Halted,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "IDLE",
            EngineState::Polling => "POLLING",
            EngineState::Gating => "GATING",
            EngineState::Executing => "EXECUTING",
            EngineState::Halted => "HALTED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: EngineState) -> bool {
        use EngineState::*;

        match (self, target) {
            (Idle, Polling) => true,

            // Cycle finished
            (Polling, Idle) => true,
            (Polling, Gating) => true,

            // Rejected request returns to the cycle
            (Gating, Polling) => true,
            (Gating, Executing) => true,

            (Executing, Polling) => true,

            // Breaker or stop request from anywhere but Halted
            (Idle | Polling | Gating | Executing, Halted) => true,

            _ => false,
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, EngineState::Halted)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
