//! Engine error types.

use thiserror::Error;

use super::history::Item;
use crate::tools::ToolError;

/// Errors that can occur while driving a turn.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The turn consumed its whole budget of handoffs and tool calls.
    /// Carries the history produced so far — the turn is abandoned, not
    /// silently truncated, and the caller decides whether to retry with a
    /// larger budget.
    #[error("turn budget of {budget} exhausted")]
    TurnBudgetExceeded { budget: u32, history: Vec<Item> },

    /// An agent name that is not part of the topology.
    #[error("unknown agent: '{name}'")]
    UnknownAgent { name: String },

    /// A handoff to an agent the current one has no edge to.
    #[error("agent '{from}' has no handoff edge to '{to}'")]
    UnknownHandoff { from: String, to: String },

    /// Resume was attempted while an interruption still lacked a decision.
    #[error("no decision recorded for call '{call_id}'")]
    MissingDecision { call_id: String },

    /// The model client failed to produce an action.
    #[error("model error for agent '{agent}': {reason}")]
    Model { agent: String, reason: String },

    /// Tool set or topology construction failed.
    #[error("tool setup failed: {0}")]
    Tools(#[from] ToolError),

    /// Serialization error.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// Broken internal state, e.g. a poisoned lock.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization {
            reason: e.to_string(),
        }
    }
}
