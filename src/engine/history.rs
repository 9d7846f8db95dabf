//! Conversation history items and the interruption type.
//!
//! A history is an ordered `Vec<Item>`: user and assistant messages plus
//! function-call requests and results. Histories are append-only within a
//! turn — the runner always returns a fresh list that strictly extends its
//! input, and the caller replaces its prior copy wholesale.

use serde::{Deserialize, Serialize};

/// A single item in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Item {
    /// A message typed by the human.
    User { content: String },
    /// Final text produced by an agent.
    Assistant { content: String },
    /// A tool call requested by an agent. Appended before the call runs
    /// (or suspends); the matching result arrives as a separate item.
    #[serde(rename_all = "camelCase")]
    FunctionCall {
        call_id: String,
        /// The agent that requested the call.
        agent: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// The outcome of a tool call, matched to its request by `call_id`.
    /// Rejected calls get a synthetic result here instead of an output.
    #[serde(rename_all = "camelCase")]
    FunctionResult {
        call_id: String,
        name: String,
        output: serde_json::Value,
    },
}

/// Build a user message item.
pub fn user(content: impl Into<String>) -> Item {
    Item::User {
        content: content.into(),
    }
}

/// Build an assistant message item.
pub fn assistant(content: impl Into<String>) -> Item {
    Item::Assistant {
        content: content.into(),
    }
}

/// The synthetic result recorded for a call the human refused. The agent
/// sees it in place of the tool's output and can react to the refusal.
pub fn rejected_result(call_id: impl Into<String>, name: impl Into<String>) -> Item {
    Item::FunctionResult {
        call_id: call_id.into(),
        name: name.into(),
        output: serde_json::json!({
            "rejected": true,
            "message": "Tool call rejected by the user.",
        }),
    }
}

/// A tool call as requested by the model, before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    /// Correlation id, unique within a turn.
    pub call_id: String,
    /// Fully-qualified tool name.
    pub name: String,
    /// JSON arguments.
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    /// Build a request with a fresh correlation id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            call_id: format!("call_{}", uuid::Uuid::new_v4()),
            name: name.into(),
            arguments,
        }
    }
}

/// A tool call that was suspended for human approval.
///
/// Exists only between a turn suspending and every interruption in that
/// turn being resolved; never persisted across process restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInterruption {
    /// The agent that requested the call.
    pub agent: String,
    /// Correlation id matching the `FunctionCall` item already in history.
    pub call_id: String,
    /// Fully-qualified tool name.
    pub tool_name: String,
    /// The arguments the tool would run with.
    pub arguments: serde_json::Value,
}

// ─── Tests ──────────────────────────────────────────────────────────────────
