//! Turn service — the outward-facing surface of the engine.
//!
//! One entry point: `submit`. A submission either starts a turn with new
//! user input or carries decisions for a previously suspended turn. The
//! service owns the per-user topology cache, the conversation store, and
//! the coordinators of currently suspended turns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::engine::{
    slack_gmail_topology, AgentTopology, ApprovalCoordinator, DecisionMap, EngineError,
    ConversationStore, Item, PendingInterruption, TopologyCache, TurnOutcome, TurnRunner,
};
use crate::model::ModelClient;
use crate::tools::{AuthBridgeConfig, ConsentProvider, ToolCatalog};

// ─── Wire Types ─────────────────────────────────────────────────────────────

/// One submission: new input items, or decisions for a suspended turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// New items to append before running (typically one user message).
    #[serde(default)]
    pub history: Vec<Item>,
    /// Continue an existing conversation; omitted starts a new one.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Decisions for a suspended turn, keyed by call id.
    #[serde(default)]
    pub decisions: DecisionMap,
}

/// The outcome of a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    /// The conversation this turn belongs to.
    pub conversation_id: String,
    /// The full history after this submission.
    pub history: Vec<Item>,
    /// Tool calls awaiting a human decision; absent when the turn settled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approvals: Option<Vec<PendingInterruption>>,
}

/// Service-level knobs.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Budget of handoffs and tool calls per turn.
    pub max_turns: u32,
    /// Authorization handshake bounds.
    pub auth: AuthBridgeConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            auth: AuthBridgeConfig::default(),
        }
    }
}

// ─── Service ────────────────────────────────────────────────────────────────

/// Owns everything a turn needs: runner, topology cache, conversation
/// store, and suspended-turn coordinators.
pub struct TurnService {
    runner: TurnRunner,
    store: ConversationStore,
    cache: TopologyCache,
    catalog: Arc<dyn ToolCatalog>,
    consent: Arc<dyn ConsentProvider>,
    suspended: Mutex<HashMap<String, ApprovalCoordinator>>,
    config: ServiceConfig,
}

impl TurnService {
    pub fn new(
        model: Arc<dyn ModelClient>,
        catalog: Arc<dyn ToolCatalog>,
        consent: Arc<dyn ConsentProvider>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            runner: TurnRunner::new(model),
            store: ConversationStore::new(),
            cache: TopologyCache::new(),
            catalog,
            consent,
            suspended: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The topology for a user, built on first use and cached for the
    /// process lifetime.
    async fn topology(&self, user_id: &str) -> Result<Arc<AgentTopology>, EngineError> {
        if let Some(topology) = self.cache.get(user_id) {
            return Ok(topology);
        }
        tracing::info!(user = %user_id, "building agent topology");
        let topology = Arc::new(
            slack_gmail_topology(&self.catalog, &self.consent, user_id, self.config.auth)
                .await?,
        );
        self.cache.insert(user_id, Arc::clone(&topology));
        Ok(topology)
    }

    /// Run or resume one turn for a user.
    pub async fn submit(
        &self,
        user_id: &str,
        request: TurnRequest,
    ) -> Result<TurnResponse, EngineError> {
        let conversation_id = request
            .conversation_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let key = format!("{user_id}__{conversation_id}");
        let topology = self.topology(user_id).await?;

        // A suspended turn takes priority: new input waits until every
        // pending call is decided.
        let coordinator = self
            .suspended
            .lock()
            .map_err(|_| EngineError::Internal {
                reason: "suspended-turn table lock poisoned".to_string(),
            })?
            .remove(&key);

        if let Some(mut coordinator) = coordinator {
            if !request.history.is_empty() {
                tracing::warn!(
                    conversation = %conversation_id,
                    items = request.history.len(),
                    "new input submitted while a turn awaits approvals, dropped"
                );
            }
            coordinator.record_all(&request.decisions);
            if !coordinator.is_ready() {
                let undecided: Vec<String> = coordinator
                    .undecided()
                    .iter()
                    .map(|id| (*id).to_string())
                    .collect();
                let approvals = coordinator
                    .pending()
                    .iter()
                    .filter(|p| undecided.contains(&p.call_id))
                    .cloned()
                    .collect();
                let history = coordinator.history().to_vec();
                self.stash(key, coordinator)?;
                return Ok(TurnResponse {
                    conversation_id,
                    history,
                    approvals: Some(approvals),
                });
            }

            let outcome = coordinator
                .resume(&self.runner, &topology, self.config.max_turns)
                .await?;
            return self.finish(user_id, conversation_id, key, outcome);
        }

        if !request.decisions.is_empty() {
            tracing::warn!(
                conversation = %conversation_id,
                "decisions submitted with no suspended turn, dropped"
            );
        }

        let mut history = self.store.get(user_id, &conversation_id);
        history.extend(request.history);

        let outcome = self
            .runner
            .run(&topology, &history, self.config.max_turns)
            .await?;
        self.finish(user_id, conversation_id, key, outcome)
    }

    fn finish(
        &self,
        user_id: &str,
        conversation_id: String,
        key: String,
        outcome: TurnOutcome,
    ) -> Result<TurnResponse, EngineError> {
        match outcome {
            TurnOutcome::Settled { history } => {
                self.store.set(user_id, &conversation_id, history.clone());
                Ok(TurnResponse {
                    conversation_id,
                    history,
                    approvals: None,
                })
            }
            TurnOutcome::Suspended { state } => {
                let approvals = state.pending.clone();
                let history = state.history.clone();
                self.stash(key, ApprovalCoordinator::new(state))?;
                Ok(TurnResponse {
                    conversation_id,
                    history,
                    approvals: Some(approvals),
                })
            }
        }
    }

    fn stash(&self, key: String, coordinator: ApprovalCoordinator) -> Result<(), EngineError> {
        self.suspended
            .lock()
            .map_err(|_| EngineError::Internal {
                reason: "suspended-turn table lock poisoned".to_string(),
            })?
            .insert(key, coordinator);
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
