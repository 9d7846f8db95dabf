//! External collaborator boundaries: the tool catalog and the consent
//! provider, plus offline in-memory implementations for the demo CLI.
//!
//! The engine never talks to a tool platform directly — everything goes
//! through these traits so tests and the demo can substitute deterministic
//! implementations.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde_json::json;

use super::errors::ToolError;
use super::types::{GrantRequest, GrantStatus, ToolDefinition};

// ─── Boundaries ─────────────────────────────────────────────────────────────

/// The external tool platform: resolves toolkits and tools, and executes
/// tool calls on behalf of a user.
///
/// Execution may fail with `ToolError::AuthorizationRequired` when the
/// platform discovers, at call time, that the user has not yet granted the
/// tool access to the underlying account. That signal is handled by the
/// `AuthBridge`, never by callers of this trait.
pub trait ToolCatalog: Send + Sync {
    /// List every tool in a toolkit.
    fn list_toolkit<'a>(
        &'a self,
        toolkit: &'a str,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ToolDefinition>, ToolError>>;

    /// Fetch one tool by its fully-qualified name.
    fn get_tool<'a>(
        &'a self,
        name: &'a str,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<ToolDefinition, ToolError>>;

    /// Execute a tool for a user.
    fn execute<'a>(
        &'a self,
        name: &'a str,
        input: serde_json::Value,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<serde_json::Value, ToolError>>;
}

/// The external consent provider for one-time authorization grants.
pub trait ConsentProvider: Send + Sync {
    /// Start a grant flow for `(tool, user)`; returns the consent reference
    /// the human must visit.
    fn request_grant<'a>(
        &'a self,
        tool: &'a str,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<GrantRequest, ToolError>>;

    /// Check the status of a previously requested grant.
    fn poll_grant<'a>(
        &'a self,
        grant_id: &'a str,
    ) -> BoxFuture<'a, Result<GrantStatus, ToolError>>;
}

// ─── Offline Demo Implementations ───────────────────────────────────────────

/// In-memory catalog with canned results, used by the demo CLI and tests.
///
/// Holds toolkit membership, per-tool definitions, and a fixed JSON result
/// per tool. Unknown tools fail with `ToolError::UnknownTool`.
pub struct StaticCatalog {
    toolkits: HashMap<String, Vec<String>>,
    definitions: HashMap<String, ToolDefinition>,
    results: HashMap<String, serde_json::Value>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            toolkits: HashMap::new(),
            definitions: HashMap::new(),
            results: HashMap::new(),
        }
    }

    /// Register a tool with its canned execution result.
    pub fn register(
        &mut self,
        toolkit: &str,
        definition: ToolDefinition,
        result: serde_json::Value,
    ) {
        self.toolkits
            .entry(toolkit.to_string())
            .or_default()
            .push(definition.qualified_name.clone());
        self.results
            .insert(definition.qualified_name.clone(), result);
        self.definitions
            .insert(definition.qualified_name.clone(), definition);
    }

    /// The Slack/Gmail catalog the demo topology is built against.
    pub fn slack_gmail_demo() -> Self {
        let mut catalog = Self::new();

        let string_arg = |name: &str, desc: &str| {
            json!({
                "type": "object",
                "properties": { name: { "type": "string", "description": desc } },
                "required": [name]
            })
        };

        catalog.register(
            "Gmail",
            ToolDefinition {
                qualified_name: "Gmail_ListEmails".to_string(),
                description: "List recent emails from the user's inbox".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": { "n": { "type": "integer", "description": "How many emails" } }
                }),
            },
            json!({ "emails": [
                { "from": "ana@example.com", "subject": "Quarterly numbers" },
                { "from": "sam@example.com", "subject": "Lunch on Friday?" }
            ]}),
        );
        catalog.register(
            "Gmail",
            ToolDefinition {
                qualified_name: "Gmail_SendEmail".to_string(),
                description: "Send an email on the user's behalf".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "recipient": { "type": "string" },
                        "subject": { "type": "string" },
                        "body": { "type": "string" }
                    },
                    "required": ["recipient", "subject", "body"]
                }),
            },
            json!({ "status": "sent" }),
        );
        catalog.register(
            "Slack",
            ToolDefinition {
                qualified_name: "Slack_ListUsers".to_string(),
                description: "List the members of the user's Slack workspace".to_string(),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            json!({ "users": ["ana", "sam", "taylor"] }),
        );
        catalog.register(
            "Slack",
            ToolDefinition {
                qualified_name: "Slack_GetUsersInfo".to_string(),
                description: "Look up profile details for Slack users".to_string(),
                input_schema: string_arg("user_name", "Slack user to look up"),
            },
            json!({ "user": { "name": "ana", "tz": "Europe/Madrid" } }),
        );
        catalog.register(
            "Slack",
            ToolDefinition {
                qualified_name: "Slack_SendDmToUser".to_string(),
                description: "Send a direct message to a Slack user".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "user_name": { "type": "string" },
                        "message": { "type": "string" }
                    },
                    "required": ["user_name", "message"]
                }),
            },
            json!({ "status": "sent" }),
        );
        catalog.register(
            "Slack",
            ToolDefinition {
                qualified_name: "Slack_SendMessageToChannel".to_string(),
                description: "Post a message to a Slack channel".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "channel_name": { "type": "string" },
                        "message": { "type": "string" }
                    },
                    "required": ["channel_name", "message"]
                }),
            },
            json!({ "status": "sent" }),
        );

        catalog
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCatalog for StaticCatalog {
    fn list_toolkit<'a>(
        &'a self,
        toolkit: &'a str,
        _user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ToolDefinition>, ToolError>> {
        Box::pin(async move {
            let names = self.toolkits.get(toolkit).ok_or_else(|| {
                ToolError::CatalogUnavailable {
                    subject: toolkit.to_string(),
                    reason: "toolkit not found".to_string(),
                }
            })?;
            Ok(names
                .iter()
                .filter_map(|n| self.definitions.get(n).cloned())
                .collect())
        })
    }

    fn get_tool<'a>(
        &'a self,
        name: &'a str,
        _user_id: &'a str,
    ) -> BoxFuture<'a, Result<ToolDefinition, ToolError>> {
        Box::pin(async move {
            self.definitions
                .get(name)
                .cloned()
                .ok_or_else(|| ToolError::UnknownTool {
                    name: name.to_string(),
                })
        })
    }

    fn execute<'a>(
        &'a self,
        name: &'a str,
        _input: serde_json::Value,
        _user_id: &'a str,
    ) -> BoxFuture<'a, Result<serde_json::Value, ToolError>> {
        Box::pin(async move {
            self.results
                .get(name)
                .cloned()
                .ok_or_else(|| ToolError::UnknownTool {
                    name: name.to_string(),
                })
        })
    }
}

/// A consent provider whose grants complete immediately.
///
/// The demo runs offline, so there is no real consent screen; the first poll
/// after a grant request reports `Completed`.
pub struct InstantConsent;

impl ConsentProvider for InstantConsent {
    fn request_grant<'a>(
        &'a self,
        tool: &'a str,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<GrantRequest, ToolError>> {
        Box::pin(async move {
            let grant_id = uuid::Uuid::new_v4().to_string();
            Ok(GrantRequest::new(
                grant_id.clone(),
                format!("https://consent.example/{tool}/{user_id}/{grant_id}"),
            ))
        })
    }

    fn poll_grant<'a>(
        &'a self,
        _grant_id: &'a str,
    ) -> BoxFuture<'a, Result<GrantStatus, ToolError>> {
        Box::pin(async move { Ok(GrantStatus::Completed) })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_catalog_toolkits() {
        let catalog = StaticCatalog::slack_gmail_demo();
        let gmail = catalog.list_toolkit("Gmail", "u1").await.unwrap();
        assert_eq!(gmail.len(), 2);
        let slack = catalog.list_toolkit("Slack", "u1").await.unwrap();
        assert_eq!(slack.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_toolkit_fails() {
        let catalog = StaticCatalog::slack_gmail_demo();
        let err = catalog.list_toolkit("Jira", "u1").await.unwrap_err();
        assert!(matches!(err, ToolError::CatalogUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tool_fails() {
        let catalog = StaticCatalog::slack_gmail_demo();
        let err = catalog.get_tool("Gmail_TrashEmail", "u1").await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn test_execute_returns_canned_result() {
        let catalog = StaticCatalog::slack_gmail_demo();
        let result = catalog
            .execute("Slack_ListUsers", json!({}), "u1")
            .await
            .unwrap();
        assert!(result["users"].is_array());
    }

    #[tokio::test]
    async fn test_instant_consent_completes() {
        let consent = InstantConsent;
        let grant = consent.request_grant("Gmail_SendEmail", "u1").await.unwrap();
        assert!(grant.consent_url.contains("Gmail_SendEmail"));
        let status = consent.poll_grant(&grant.grant_id).await.unwrap();
        assert_eq!(status, GrantStatus::Completed);
    }
}
