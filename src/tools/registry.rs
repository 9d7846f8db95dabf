//! Tool registry build — resolves a `ToolSelection` into bound descriptors.
//!
//! Responsibilities:
//! - Concurrent fetch: toolkit listings and individually-named tools are
//!   fetched in parallel; any failure aggregates and aborts the whole build
//!   (a partial tool set is never used).
//! - Dedup by qualified name, last-seen wins (toolkit members first, then
//!   individually-named tools).
//! - Tagging: tools on the side-effect denylist are marked `needs_approval`
//!   when approval enforcement is on.
//! - Wrapping: every descriptor's executor goes through the `AuthBridge`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;

use super::auth::{AuthBridge, AuthBridgeConfig};
use super::catalog::{ConsentProvider, ToolCatalog};
use super::errors::ToolError;
use super::types::{ToolDescriptor, ToolDefinition, ToolSelection};

// ─── Approval Denylist ──────────────────────────────────────────────────────

/// Tools that may produce a side effect on the user's behalf (sending a
/// message or email to the wrong person cannot be undone). Invoking any of
/// these suspends the turn for an explicit human decision. Retrieval tools
/// are safe to run without approval.
pub const TOOLS_WITH_APPROVAL: &[&str] = &[
    "Gmail_SendEmail",
    "Gmail_SendDraftEmail",
    "Gmail_TrashEmail",
    "Slack_SendDmToUser",
    "Slack_SendMessageToChannel",
    "Slack_SendMessage",
];

/// Whether a tool name is on the side-effect denylist.
pub fn requires_approval(qualified_name: &str) -> bool {
    TOOLS_WITH_APPROVAL.contains(&qualified_name)
}

// ─── Build ──────────────────────────────────────────────────────────────────

/// Resolve a selection into deduplicated, bridge-wrapped tool descriptors
/// for one user.
///
/// Fails with `ToolError::Configuration` when the selection is empty. Both
/// fetch branches run concurrently; the first failure of either branch
/// aborts the build.
pub async fn build_tools(
    catalog: &Arc<dyn ToolCatalog>,
    consent: &Arc<dyn ConsentProvider>,
    selection: &ToolSelection,
    user_id: &str,
    enforce_approval: bool,
    auth_config: AuthBridgeConfig,
) -> Result<Vec<Arc<ToolDescriptor>>, ToolError> {
    if selection.is_empty() {
        return Err(ToolError::Configuration);
    }

    let from_toolkits = try_join_all(
        selection
            .toolkits
            .iter()
            .map(|toolkit| catalog.list_toolkit(toolkit, user_id)),
    );
    let from_tools = try_join_all(
        selection
            .tools
            .iter()
            .map(|name| catalog.get_tool(name, user_id)),
    );

    // Both branches must complete; either failure fails the whole build.
    let (toolkit_batches, named_tools) = futures::try_join!(from_toolkits, from_tools)?;

    // Dedup by qualified name, last-seen wins, first-seen order preserved.
    let mut order: Vec<String> = Vec::new();
    let mut unique: HashMap<String, ToolDefinition> = HashMap::new();
    for definition in toolkit_batches.into_iter().flatten().chain(named_tools) {
        if unique
            .insert(definition.qualified_name.clone(), definition.clone())
            .is_none()
        {
            order.push(definition.qualified_name);
        }
    }

    let descriptors: Vec<Arc<ToolDescriptor>> = order
        .iter()
        .map(|name| {
            let definition = &unique[name];
            let needs_approval = enforce_approval && requires_approval(name);
            Arc::new(ToolDescriptor {
                qualified_name: definition.qualified_name.clone(),
                description: definition.description.clone(),
                input_schema: definition.input_schema.clone(),
                needs_approval,
                executor: Arc::new(AuthBridge::new(
                    Arc::clone(catalog),
                    Arc::clone(consent),
                    definition.qualified_name.clone(),
                    user_id,
                    auth_config,
                )),
            })
        })
        .collect();

    tracing::info!(
        user = %user_id,
        toolkits = selection.toolkits.len(),
        named = selection.tools.len(),
        resolved = descriptors.len(),
        "tool set built"
    );

    Ok(descriptors)
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use serde_json::json;

    use super::*;
    use crate::tools::catalog::{InstantConsent, StaticCatalog};

    fn definition(name: &str) -> ToolDefinition {
        ToolDefinition {
            qualified_name: name.to_string(),
            description: format!("{name} tool"),
            input_schema: json!({ "type": "object" }),
        }
    }

    fn demo_handles() -> (Arc<dyn ToolCatalog>, Arc<dyn ConsentProvider>) {
        (
            Arc::new(StaticCatalog::slack_gmail_demo()),
            Arc::new(InstantConsent),
        )
    }

    #[tokio::test]
    async fn test_empty_selection_is_configuration_error() {
        let (catalog, consent) = demo_handles();
        let err = build_tools(
            &catalog,
            &consent,
            &ToolSelection::default(),
            "u1",
            true,
            AuthBridgeConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Configuration));
    }

    #[tokio::test]
    async fn test_denylist_tags_descriptors() {
        let (catalog, consent) = demo_handles();
        let tools = build_tools(
            &catalog,
            &consent,
            &ToolSelection::toolkits(["Gmail"]),
            "u1",
            true,
            AuthBridgeConfig::default(),
        )
        .await
        .unwrap();

        let by_name: HashMap<_, _> = tools
            .iter()
            .map(|t| (t.qualified_name.as_str(), t.needs_approval))
            .collect();
        assert_eq!(by_name["Gmail_SendEmail"], true);
        assert_eq!(by_name["Gmail_ListEmails"], false);
    }

    #[tokio::test]
    async fn test_enforcement_off_skips_tagging() {
        let (catalog, consent) = demo_handles();
        let tools = build_tools(
            &catalog,
            &consent,
            &ToolSelection::tools(["Gmail_SendEmail"]),
            "u1",
            false,
            AuthBridgeConfig::default(),
        )
        .await
        .unwrap();
        assert!(!tools[0].needs_approval);
    }

    /// Returns different descriptions for the toolkit branch and the
    /// named-fetch branch so last-seen-wins is observable.
    struct SplitCatalog;

    impl ToolCatalog for SplitCatalog {
        fn list_toolkit<'a>(
            &'a self,
            _toolkit: &'a str,
            _user_id: &'a str,
        ) -> BoxFuture<'a, Result<Vec<ToolDefinition>, ToolError>> {
            Box::pin(async {
                Ok(vec![ToolDefinition {
                    description: "from toolkit".to_string(),
                    ..definition("Gmail_SendEmail")
                }])
            })
        }

        fn get_tool<'a>(
            &'a self,
            name: &'a str,
            _user_id: &'a str,
        ) -> BoxFuture<'a, Result<ToolDefinition, ToolError>> {
            Box::pin(async move {
                Ok(ToolDefinition {
                    description: "from named fetch".to_string(),
                    ..definition(name)
                })
            })
        }

        fn execute<'a>(
            &'a self,
            _name: &'a str,
            _input: serde_json::Value,
            _user_id: &'a str,
        ) -> BoxFuture<'a, Result<serde_json::Value, ToolError>> {
            Box::pin(async { Ok(json!({})) })
        }
    }

    #[tokio::test]
    async fn test_dedup_last_seen_wins() {
        // The toolkit carries Gmail_SendEmail; naming it individually as
        // well must not duplicate it, and the individually-fetched
        // definition replaces the toolkit one.
        let catalog: Arc<dyn ToolCatalog> = Arc::new(SplitCatalog);
        let consent: Arc<dyn ConsentProvider> = Arc::new(InstantConsent);

        let selection = ToolSelection {
            toolkits: vec!["Gmail".to_string()],
            tools: vec!["Gmail_SendEmail".to_string()],
        };
        let tools = build_tools(
            &catalog,
            &consent,
            &selection,
            "u1",
            true,
            AuthBridgeConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].description, "from named fetch");
        assert!(tools[0].needs_approval);
    }

    /// A catalog that counts fetches and fails a configured toolkit.
    struct CountingCatalog {
        fetches: Mutex<u32>,
        failing_toolkit: Option<String>,
    }

    impl ToolCatalog for CountingCatalog {
        fn list_toolkit<'a>(
            &'a self,
            toolkit: &'a str,
            _user_id: &'a str,
        ) -> BoxFuture<'a, Result<Vec<ToolDefinition>, ToolError>> {
            Box::pin(async move {
                *self.fetches.lock().unwrap() += 1;
                if self.failing_toolkit.as_deref() == Some(toolkit) {
                    return Err(ToolError::CatalogUnavailable {
                        subject: toolkit.to_string(),
                        reason: "upstream 503".to_string(),
                    });
                }
                Ok(vec![definition(&format!("{toolkit}_List"))])
            })
        }

        fn get_tool<'a>(
            &'a self,
            name: &'a str,
            _user_id: &'a str,
        ) -> BoxFuture<'a, Result<ToolDefinition, ToolError>> {
            Box::pin(async move {
                *self.fetches.lock().unwrap() += 1;
                Ok(definition(name))
            })
        }

        fn execute<'a>(
            &'a self,
            _name: &'a str,
            _input: serde_json::Value,
            _user_id: &'a str,
        ) -> BoxFuture<'a, Result<serde_json::Value, ToolError>> {
            Box::pin(async { Ok(json!({})) })
        }
    }

    #[tokio::test]
    async fn test_partial_failure_aborts_build() {
        let catalog: Arc<dyn ToolCatalog> = Arc::new(CountingCatalog {
            fetches: Mutex::new(0),
            failing_toolkit: Some("Slack".to_string()),
        });
        let consent: Arc<dyn ConsentProvider> = Arc::new(InstantConsent);

        let selection = ToolSelection {
            toolkits: vec!["Gmail".to_string(), "Slack".to_string()],
            tools: vec!["Gmail_SendEmail".to_string()],
        };
        let err = build_tools(
            &catalog,
            &consent,
            &selection,
            "u1",
            true,
            AuthBridgeConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::CatalogUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_order_is_deterministic() {
        let (catalog, consent) = demo_handles();
        let tools = build_tools(
            &catalog,
            &consent,
            &ToolSelection::tools(["Slack_ListUsers", "Gmail_SendEmail", "Slack_SendDmToUser"]),
            "u1",
            true,
            AuthBridgeConfig::default(),
        )
        .await
        .unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.qualified_name.as_str()).collect();
        assert_eq!(
            names,
            ["Slack_ListUsers", "Gmail_SendEmail", "Slack_SendDmToUser"]
        );
    }
}
