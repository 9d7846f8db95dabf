//! Orchestration engine — agents, turns, approvals, and conversation state.
//!
//! Submodules:
//! - `topology`: the fixed agent graph, full-mesh handoff wiring, per-user
//!   cache
//! - `runner`: the turn loop — settle, hand off, call tools, or suspend
//! - `approvals`: human decisions for suspended turns
//! - `history`: conversation items and the interruption type
//! - `store`: settled histories keyed by `(user, conversation)`
//! - `errors`: engine-level error types

pub mod approvals;
pub mod errors;
pub mod history;
pub mod runner;
pub mod store;
pub mod topology;

// Re-exports for convenience
pub use approvals::{ApprovalCoordinator, Decision, DecisionMap};
pub use errors::EngineError;
pub use history::{Item, PendingInterruption, ToolCallRequest};
pub use runner::{RunState, TurnOutcome, TurnRunner};
pub use store::ConversationStore;
pub use topology::{
    slack_gmail_topology, Agent, AgentTopology, RouterTools, TopologyBuilder, TopologyCache,
};
