//! Shared types for the tool layer.
//!
//! Definitions as the catalog describes them, descriptors as the engine
//! consumes them, and the grant types used by the authorization handshake.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::errors::ToolError;

// ─── Catalog Definitions ────────────────────────────────────────────────────

/// A tool as described by the external catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Fully-qualified name, e.g. `"Gmail_SendEmail"`.
    pub qualified_name: String,
    /// Human-readable description (shown to the model and in approvals).
    pub description: String,
    /// JSON schema for the tool's input.
    pub input_schema: serde_json::Value,
}

/// Which tools to fetch when building a tool set.
///
/// Toolkits are expanded to their member tools; individually-named tools are
/// fetched one by one. At least one of the two lists must be non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSelection {
    /// Toolkit names to expand (e.g. `"Gmail"`).
    pub toolkits: Vec<String>,
    /// Fully-qualified tool names to fetch individually.
    pub tools: Vec<String>,
}

impl ToolSelection {
    /// Select individually-named tools only.
    pub fn tools<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            toolkits: Vec::new(),
            tools: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Select whole toolkits only.
    pub fn toolkits<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            toolkits: names.into_iter().map(Into::into).collect(),
            tools: Vec::new(),
        }
    }

    /// Whether nothing at all was selected.
    pub fn is_empty(&self) -> bool {
        self.toolkits.is_empty() && self.tools.is_empty()
    }
}

// ─── Executors and Descriptors ──────────────────────────────────────────────

/// An invokable tool action.
///
/// Implemented by the `AuthBridge`, which wraps the catalog's raw execution
/// with the grant-and-retry handshake, and by test doubles.
pub trait ToolExecutor: Send + Sync {
    /// Execute the tool with the given JSON input.
    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value, ToolError>>;
}

/// A tool as bound to an agent: definition plus executor plus the static
/// human-approval requirement.
///
/// Built once per topology; never mutated afterwards. Shared across agents
/// via `Arc` (the triage agent holds the union of specialist tools).
#[derive(Clone)]
pub struct ToolDescriptor {
    /// Fully-qualified name (dedup key during registry build).
    pub qualified_name: String,
    /// Description forwarded from the catalog definition.
    pub description: String,
    /// JSON schema for the tool's input.
    pub input_schema: serde_json::Value,
    /// Whether invoking this tool must first suspend the turn for a human
    /// decision. Evaluated by the turn runner before execution.
    pub needs_approval: bool,
    /// The wrapped executor (authorization handshake included).
    pub executor: Arc<dyn ToolExecutor>,
}

impl ToolDescriptor {
    /// Invoke the underlying executor.
    pub async fn execute(
        &self,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        self.executor.execute(input).await
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("qualified_name", &self.qualified_name)
            .field("needs_approval", &self.needs_approval)
            .finish()
    }
}

// ─── Authorization Grants ───────────────────────────────────────────────────

/// A one-time grant request issued by the consent provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    /// Opaque id used to poll the grant's status.
    pub grant_id: String,
    /// Human-facing consent reference (e.g. an OAuth URL).
    pub consent_url: String,
    /// When the grant was requested (RFC 3339).
    pub requested_at: String,
}

impl GrantRequest {
    /// Build a grant request stamped with the current time.
    pub fn new(grant_id: impl Into<String>, consent_url: impl Into<String>) -> Self {
        Self {
            grant_id: grant_id.into(),
            consent_url: consent_url.into(),
            requested_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Terminal and non-terminal grant states reported by the consent provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// The human has not acted yet — keep polling.
    Pending,
    /// Consent given; the action may be re-invoked exactly once.
    Completed,
    /// Consent refused or the grant flow broke; terminal.
    Failed,
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_is_empty() {
        assert!(ToolSelection::default().is_empty());
        assert!(!ToolSelection::tools(["Gmail_SendEmail"]).is_empty());
        assert!(!ToolSelection::toolkits(["Slack"]).is_empty());
    }

    #[test]
    fn test_grant_status_serialization() {
        let json = serde_json::to_string(&GrantStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let status: GrantStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, GrantStatus::Pending);
    }

    #[test]
    fn test_grant_request_timestamps() {
        let grant = GrantRequest::new("g1", "https://consent.example/g1");
        assert_eq!(grant.grant_id, "g1");
        // RFC 3339 timestamps parse back.
        assert!(chrono::DateTime::parse_from_rfc3339(&grant.requested_at).is_ok());
    }
}
