//! Approval coordination — collecting human decisions for a suspended turn.
//!
//! A suspended turn may carry several interruptions; the coordinator
//! gathers decisions across one or more submissions and only releases the
//! turn for resume once every pending call is decided. Decisions for
//! unknown call ids are dropped, not errors — a stale frontend must not be
//! able to approve a call that no longer exists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::runner::{RunState, TurnOutcome, TurnRunner};
use super::topology::AgentTopology;

/// A human verdict on one pending tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Execute the call with its recorded arguments.
    Approved,
    /// Do not execute; record a refusal result instead.
    Rejected,
}

/// Decisions keyed by call id.
pub type DecisionMap = HashMap<String, Decision>;

/// Holds a suspended turn's state while decisions trickle in.
#[derive(Debug)]
pub struct ApprovalCoordinator {
    state: RunState,
    decisions: DecisionMap,
}

impl ApprovalCoordinator {
    /// Wrap a freshly suspended turn.
    pub fn new(state: RunState) -> Self {
        Self {
            state,
            decisions: DecisionMap::new(),
        }
    }

    /// The calls still awaiting a decision from the human.
    pub fn pending(&self) -> &[super::history::PendingInterruption] {
        &self.state.pending
    }

    /// The history as recorded at suspension.
    pub fn history(&self) -> &[super::history::Item] {
        &self.state.history
    }

    /// Record one decision. Returns whether the call id matched a pending
    /// interruption; decisions for unknown ids are dropped.
    pub fn record(&mut self, call_id: &str, decision: Decision) -> bool {
        let known = self
            .state
            .pending
            .iter()
            .any(|p| p.call_id == call_id);
        if known {
            self.decisions.insert(call_id.to_string(), decision);
        } else {
            tracing::warn!(call_id = %call_id, "decision for unknown call id dropped");
        }
        known
    }

    /// Record a batch of decisions, dropping unknown ids.
    pub fn record_all(&mut self, decisions: &DecisionMap) {
        for (call_id, decision) in decisions {
            self.record(call_id, *decision);
        }
    }

    /// Whether every pending call has a decision.
    pub fn is_ready(&self) -> bool {
        self.state
            .pending
            .iter()
            .all(|p| self.decisions.contains_key(&p.call_id))
    }

    /// Call ids still lacking a decision.
    pub fn undecided(&self) -> Vec<&str> {
        self.state
            .pending
            .iter()
            .filter(|p| !self.decisions.contains_key(&p.call_id))
            .map(|p| p.call_id.as_str())
            .collect()
    }

    /// Resume the turn once every decision is in. Consumes the
    /// coordinator; fails with `MissingDecision` when a call is still
    /// undecided.
    pub async fn resume(
        self,
        runner: &TurnRunner,
        topology: &AgentTopology,
        budget: u32,
    ) -> Result<TurnOutcome, EngineError> {
        if let Some(call_id) = self.undecided().first() {
            return Err(EngineError::MissingDecision {
                call_id: (*call_id).to_string(),
            });
        }
        runner
            .resume(topology, self.state, &self.decisions, budget)
            .await
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
