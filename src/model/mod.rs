//! Model client boundary.
//!
//! The engine never talks to a provider directly; it asks a `ModelClient`
//! for the next action given an agent and the history so far. The client
//! decides between finishing with text, handing off, or calling tools.
//!
//! Submodules:
//! - `scripted`: deterministic clients for tests and the offline demo

pub mod scripted;

pub use scripted::{KeywordModel, ScriptedModel};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::engine::history::{Item, ToolCallRequest};
use crate::engine::topology::Agent;

/// What the model wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelAction {
    /// Finish the turn with assistant text.
    FinalMessage(String),
    /// Transfer control to another agent in the topology.
    Handoff { target: String },
    /// Invoke one or more tools. An empty list is treated as a no-op
    /// round by the runner (it still consumes budget).
    ToolCalls(Vec<ToolCallRequest>),
}

/// Failure to obtain the next action from the provider.
#[derive(Debug, Error)]
#[error("model request failed: {reason}")]
pub struct ModelError {
    pub reason: String,
}

impl ModelError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Produces the next action for an agent. Object-safe so the engine can
/// hold `Arc<dyn ModelClient>`.
pub trait ModelClient: Send + Sync {
    /// Decide the next action given the agent (instructions, tools,
    /// handoff edges) and the full history so far.
    fn next_action<'a>(
        &'a self,
        agent: &'a Agent,
        history: &'a [Item],
    ) -> BoxFuture<'a, Result<ModelAction, ModelError>>;
}
