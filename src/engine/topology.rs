//! Agent topology — a fixed, mutually-referential set of named agents.
//!
//! One triage/router agent plus N specialists, each scoped to a tool
//! subset. Handoff edges are agent *names* into the topology-owned table,
//! not owning references, so the cyclic graph carries no ownership cycles.
//! The builder constructs every node first and wires edges in a second
//! pass: every pair of agents is mutually reachable, so no agent can leave
//! the user permanently stuck in a sub-agent.
//!
//! Built topologies are cached per user identity (tool access is scoped by
//! user), populate-on-miss, never evicted within process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::tools::{
    build_tools, AuthBridgeConfig, ConsentProvider, ToolCatalog, ToolDescriptor, ToolError,
    ToolSelection,
};

use super::errors::EngineError;

// ─── Agent ──────────────────────────────────────────────────────────────────

/// A named agent: instructions, a bound tool subset, and outgoing handoff
/// edges. Mutable only while the topology is being built.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Unique within the topology.
    pub name: String,
    /// Model identifier forwarded to the model client.
    pub model: String,
    /// System instructions.
    pub instructions: String,
    /// The tool subset this agent may invoke.
    pub tools: Vec<Arc<ToolDescriptor>>,
    /// Names of agents this one may transfer control to.
    pub handoffs: Vec<String>,
}

impl Agent {
    /// Look up a bound tool by qualified name.
    pub fn tool(&self, qualified_name: &str) -> Option<&Arc<ToolDescriptor>> {
        self.tools
            .iter()
            .find(|t| t.qualified_name == qualified_name)
    }

    /// Whether this agent has a handoff edge to `target`.
    pub fn can_hand_off(&self, target: &str) -> bool {
        self.handoffs.iter().any(|h| h == target)
    }
}

// ─── Topology ───────────────────────────────────────────────────────────────

/// The wired agent set. Immutable after construction.
#[derive(Debug)]
pub struct AgentTopology {
    agents: HashMap<String, Agent>,
    entry: String,
}

impl AgentTopology {
    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> Result<&Agent, EngineError> {
        self.agents.get(name).ok_or_else(|| EngineError::UnknownAgent {
            name: name.to_string(),
        })
    }

    /// The router/triage agent every turn enters through.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Agent names in sorted order.
    pub fn agent_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the topology has no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

// ─── Builder ────────────────────────────────────────────────────────────────

/// What tools the router agent is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterTools {
    /// The union of every specialist's tools (deduplicated by name).
    Union,
    /// No tools — the router only routes.
    None,
}

/// Two-pass topology construction: specialists first, router last, then
/// full-mesh edge wiring.
pub struct TopologyBuilder {
    specialists: Vec<Agent>,
}

impl TopologyBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self {
            specialists: Vec::new(),
        }
    }

    /// Add a specialist agent with its tool subset. Edges are wired later.
    pub fn specialist(
        mut self,
        name: impl Into<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
        tools: Vec<Arc<ToolDescriptor>>,
    ) -> Self {
        self.specialists.push(Agent {
            name: name.into(),
            model: model.into(),
            instructions: instructions.into(),
            tools,
            handoffs: Vec::new(),
        });
        self
    }

    /// Build the router, wire the full mesh, and freeze the topology.
    pub fn router(
        self,
        name: impl Into<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
        router_tools: RouterTools,
    ) -> AgentTopology {
        let name = name.into();

        let tools = match router_tools {
            RouterTools::Union => {
                let mut seen: Vec<&str> = Vec::new();
                let mut union = Vec::new();
                for specialist in &self.specialists {
                    for tool in &specialist.tools {
                        if !seen.contains(&tool.qualified_name.as_str()) {
                            seen.push(&tool.qualified_name);
                            union.push(Arc::clone(tool));
                        }
                    }
                }
                union
            }
            RouterTools::None => Vec::new(),
        };

        let mut agents: Vec<Agent> = self.specialists;
        agents.push(Agent {
            name: name.clone(),
            model: model.into(),
            instructions: instructions.into(),
            tools,
            handoffs: Vec::new(),
        });

        // Second pass: complete the mesh. Every agent can reach every
        // other agent, in both directions.
        let names: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
        for agent in &mut agents {
            agent.handoffs = names
                .iter()
                .filter(|n| **n != agent.name)
                .cloned()
                .collect();
        }

        AgentTopology {
            agents: agents.into_iter().map(|a| (a.name.clone(), a)).collect(),
            entry: name,
        }
    }
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Per-User Cache ─────────────────────────────────────────────────────────

/// Process-wide cache of built topologies, keyed by user identity.
///
/// Populate-on-miss, never evicted (cache invalidation is an explicit
/// non-goal). Writes are last-value-wins per key, so concurrent builds for
/// the same user are idempotent. Injectable so tests substitute a fresh
/// instance.
#[derive(Default)]
pub struct TopologyCache {
    inner: Mutex<HashMap<String, Arc<AgentTopology>>>,
}

impl TopologyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached topology for a user, if any.
    pub fn get(&self, user_id: &str) -> Option<Arc<AgentTopology>> {
        self.inner.lock().ok()?.get(user_id).cloned()
    }

    /// Store (or replace) the topology for a user.
    pub fn insert(&self, user_id: &str, topology: Arc<AgentTopology>) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(user_id.to_string(), topology);
        }
    }

    /// Number of cached users.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Default Slack/Gmail Topology ───────────────────────────────────────────

const GMAIL_INSTRUCTIONS: &str = "You provide assistance with tasks requiring running Gmail \
     tools. You're ONLY allowed to use the Gmail tools, you CANNOT do anything else, and you \
     MUST hand off to the triage agent if you need to do something else.";

const SLACK_INSTRUCTIONS: &str = "You provide assistance with tasks requiring running Slack \
     tools, such as sending messages and DMs. You're ONLY allowed to use the Slack tools, you \
     CANNOT do anything else, and you MUST hand off to the triage agent if you need to do \
     something else.";

const TRIAGE_INSTRUCTIONS: &str = "Hand off to the appropriate agent based on the user's \
     request. If the user mentions Slack or anything relevant to Slack, hand off to the slack \
     agent. If the user mentions Gmail or anything relevant to Gmail, hand off to the gmail \
     agent. Only when none of the agents are appropriate, attempt to deal with the request \
     yourself.";

/// Build the default topology: a Gmail specialist, a Slack specialist, and
/// a triage router holding the union of their tools. Both tool sets are
/// fetched with approval enforcement on.
pub async fn slack_gmail_topology(
    catalog: &Arc<dyn ToolCatalog>,
    consent: &Arc<dyn ConsentProvider>,
    user_id: &str,
    auth_config: AuthBridgeConfig,
) -> Result<AgentTopology, ToolError> {
    // The selections must outlive the unawaited futures borrowing them.
    let gmail_selection = ToolSelection::tools(["Gmail_ListEmails", "Gmail_SendEmail"]);
    let slack_selection = ToolSelection::tools([
        "Slack_SendDmToUser",
        "Slack_ListUsers",
        "Slack_GetUsersInfo",
        "Slack_SendMessageToChannel",
    ]);
    let gmail_tools = build_tools(
        catalog,
        consent,
        &gmail_selection,
        user_id,
        true,
        auth_config,
    );
    let slack_tools = build_tools(
        catalog,
        consent,
        &slack_selection,
        user_id,
        true,
        auth_config,
    );
    let (gmail_tools, slack_tools) = futures::try_join!(gmail_tools, slack_tools)?;

    tracing::info!(
        user = %user_id,
        tools = gmail_tools.len() + slack_tools.len(),
        "tools loaded"
    );

    Ok(TopologyBuilder::new()
        .specialist("gmail_agent", "gpt-4o", GMAIL_INSTRUCTIONS, gmail_tools)
        .specialist("slack_agent", "gpt-4o", SLACK_INSTRUCTIONS, slack_tools)
        .router("triage_agent", "gpt-4o", TRIAGE_INSTRUCTIONS, RouterTools::Union))
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{InstantConsent, StaticCatalog};

    async fn demo_topology() -> AgentTopology {
        let catalog: Arc<dyn ToolCatalog> = Arc::new(StaticCatalog::slack_gmail_demo());
        let consent: Arc<dyn ConsentProvider> = Arc::new(InstantConsent);
        slack_gmail_topology(&catalog, &consent, "mateo@example.dev", AuthBridgeConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_mesh_wiring() {
        let topology = demo_topology().await;
        assert_eq!(topology.len(), 3);
        assert_eq!(topology.entry(), "triage_agent");

        for from in topology.agent_names() {
            let agent = topology.agent(from).unwrap();
            for to in topology.agent_names() {
                if from == to {
                    assert!(!agent.can_hand_off(to), "no self edge for {from}");
                } else {
                    assert!(agent.can_hand_off(to), "{from} must reach {to}");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_router_holds_tool_union() {
        let topology = demo_topology().await;
        let triage = topology.agent("triage_agent").unwrap();
        assert_eq!(triage.tools.len(), 6);
        assert!(triage.tool("Gmail_SendEmail").is_some());
        assert!(triage.tool("Slack_ListUsers").is_some());

        let gmail = topology.agent("gmail_agent").unwrap();
        assert_eq!(gmail.tools.len(), 2);
        assert!(gmail.tool("Slack_ListUsers").is_none());
    }

    #[tokio::test]
    async fn test_router_without_tools() {
        let topology = TopologyBuilder::new()
            .specialist("a", "m", "instructions", vec![])
            .router("router", "m", "route", RouterTools::None);
        assert!(topology.agent("router").unwrap().tools.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agent_lookup_fails() {
        let topology = demo_topology().await;
        let err = topology.agent("jira_agent").unwrap_err();
        assert!(matches!(err, EngineError::UnknownAgent { .. }));
    }

    #[tokio::test]
    async fn test_cache_populate_and_replace() {
        let cache = TopologyCache::new();
        assert!(cache.get("u1").is_none());

        let first = Arc::new(demo_topology().await);
        cache.insert("u1", Arc::clone(&first));
        assert!(Arc::ptr_eq(&cache.get("u1").unwrap(), &first));

        // Last write wins.
        let second = Arc::new(demo_topology().await);
        cache.insert("u1", Arc::clone(&second));
        assert!(Arc::ptr_eq(&cache.get("u1").unwrap(), &second));
        assert_eq!(cache.len(), 1);
    }
}
