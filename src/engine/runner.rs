//! Turn runner — drives one user turn through the agent topology.
//!
//! The driving loop asks the model for the next action and either settles
//! (final text), follows a handoff edge, or dispatches tool calls. A call
//! to a tool tagged `needs_approval` is recorded in history but *not*
//! executed; it suspends the turn instead. Suspended turns carry a
//! serializable `RunState` and are re-entered deterministically by
//! `resume` once every pending call has a human decision.
//!
//! Budget: handoffs and tool invocations each consume one unit; an empty
//! tool-call round also consumes one so a looping model cannot spin
//! forever. Exhaustion abandons the turn with the history produced so far.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::model::{ModelAction, ModelClient};

use super::approvals::Decision;
use super::errors::EngineError;
use super::history::{assistant, rejected_result, Item, PendingInterruption};
use super::topology::AgentTopology;

// ─── Run State ──────────────────────────────────────────────────────────────

/// Everything needed to re-enter a suspended turn.
///
/// Serializable so a frontend can hold it across the approval round-trip;
/// not persisted across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// The agent that was active when the turn suspended.
    pub agent: String,
    /// History including the recorded `FunctionCall` items for the
    /// suspended calls.
    pub history: Vec<Item>,
    /// The calls awaiting a human decision.
    pub pending: Vec<PendingInterruption>,
}

/// How a turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The turn ran to a final assistant message.
    Settled { history: Vec<Item> },
    /// The turn hit one or more approval-gated tool calls.
    Suspended { state: RunState },
}

impl TurnOutcome {
    /// The history regardless of outcome.
    pub fn history(&self) -> &[Item] {
        match self {
            TurnOutcome::Settled { history } => history,
            TurnOutcome::Suspended { state } => &state.history,
        }
    }
}

// ─── Runner ─────────────────────────────────────────────────────────────────

/// Drives turns against a topology with a model client.
pub struct TurnRunner {
    model: Arc<dyn ModelClient>,
}

impl TurnRunner {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    /// Run one turn from the topology's entry agent.
    ///
    /// The returned history strictly extends `history`; the caller replaces
    /// its prior copy wholesale.
    pub async fn run(
        &self,
        topology: &AgentTopology,
        history: &[Item],
        budget: u32,
    ) -> Result<TurnOutcome, EngineError> {
        let entry = topology.entry().to_string();
        self.drive(topology, entry, history.to_vec(), budget, budget)
            .await
    }

    /// Re-enter a suspended turn after every pending call has a decision.
    ///
    /// Approved calls execute now; rejected calls get a synthetic refusal
    /// result. Control resumes with the agent that was active at
    /// suspension, never restarting from the entry agent.
    pub async fn resume(
        &self,
        topology: &AgentTopology,
        state: RunState,
        decisions: &HashMap<String, Decision>,
        budget: u32,
    ) -> Result<TurnOutcome, EngineError> {
        let RunState {
            agent: agent_name,
            mut history,
            pending,
        } = state;

        let agent = topology.agent(&agent_name)?;
        for interruption in &pending {
            let decision = decisions.get(&interruption.call_id).ok_or_else(|| {
                EngineError::MissingDecision {
                    call_id: interruption.call_id.clone(),
                }
            })?;
            match decision {
                Decision::Approved => {
                    tracing::info!(
                        agent = %agent_name,
                        tool = %interruption.tool_name,
                        call_id = %interruption.call_id,
                        "call approved, executing"
                    );
                    let output = match agent.tool(&interruption.tool_name) {
                        Some(tool) => tool
                            .execute(interruption.arguments.clone())
                            .await
                            .unwrap_or_else(|e| json!({ "error": e.to_string() })),
                        None => json!({
                            "error": format!("tool '{}' is not available", interruption.tool_name),
                        }),
                    };
                    history.push(Item::FunctionResult {
                        call_id: interruption.call_id.clone(),
                        name: interruption.tool_name.clone(),
                        output,
                    });
                }
                Decision::Rejected => {
                    tracing::info!(
                        agent = %agent_name,
                        tool = %interruption.tool_name,
                        call_id = %interruption.call_id,
                        "call rejected by the user"
                    );
                    history.push(rejected_result(
                        interruption.call_id.clone(),
                        interruption.tool_name.clone(),
                    ));
                }
            }
        }

        self.drive(topology, agent_name, history, budget, budget)
            .await
    }

    async fn drive(
        &self,
        topology: &AgentTopology,
        mut current: String,
        mut history: Vec<Item>,
        budget: u32,
        mut remaining: u32,
    ) -> Result<TurnOutcome, EngineError> {
        loop {
            let agent = topology.agent(&current)?;
            let action = self
                .model
                .next_action(agent, &history)
                .await
                .map_err(|e| EngineError::Model {
                    agent: current.clone(),
                    reason: e.reason,
                })?;

            match action {
                ModelAction::FinalMessage(text) => {
                    tracing::debug!(agent = %current, "turn settled");
                    history.push(assistant(text));
                    return Ok(TurnOutcome::Settled { history });
                }

                ModelAction::Handoff { target } => {
                    if !agent.can_hand_off(&target) {
                        return Err(EngineError::UnknownHandoff {
                            from: current,
                            to: target,
                        });
                    }
                    // The target must exist before we commit the transfer.
                    topology.agent(&target)?;
                    if remaining == 0 {
                        return Err(EngineError::TurnBudgetExceeded { budget, history });
                    }
                    remaining -= 1;
                    tracing::info!(from = %current, to = %target, "handoff");
                    current = target;
                }

                ModelAction::ToolCalls(calls) => {
                    if calls.is_empty() {
                        // A no-op round still consumes budget so a looping
                        // model cannot spin forever.
                        if remaining == 0 {
                            return Err(EngineError::TurnBudgetExceeded { budget, history });
                        }
                        remaining -= 1;
                        continue;
                    }

                    let mut pending: Vec<PendingInterruption> = Vec::new();
                    for call in calls {
                        if remaining == 0 {
                            return Err(EngineError::TurnBudgetExceeded { budget, history });
                        }
                        remaining -= 1;

                        history.push(Item::FunctionCall {
                            call_id: call.call_id.clone(),
                            agent: current.clone(),
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        });

                        let Some(tool) = agent.tool(&call.name) else {
                            tracing::warn!(
                                agent = %current,
                                tool = %call.name,
                                "model requested a tool outside the agent's set"
                            );
                            history.push(Item::FunctionResult {
                                call_id: call.call_id,
                                name: call.name.clone(),
                                output: json!({
                                    "error": format!("tool '{}' is not available", call.name),
                                }),
                            });
                            continue;
                        };

                        if tool.needs_approval {
                            tracing::info!(
                                agent = %current,
                                tool = %call.name,
                                call_id = %call.call_id,
                                "tool requires approval, suspending"
                            );
                            pending.push(PendingInterruption {
                                agent: current.clone(),
                                call_id: call.call_id,
                                tool_name: call.name,
                                arguments: call.arguments,
                            });
                            continue;
                        }

                        // A failed tool call is a result the agent can
                        // react to, not a turn failure.
                        let output = tool
                            .execute(call.arguments)
                            .await
                            .unwrap_or_else(|e| json!({ "error": e.to_string() }));
                        history.push(Item::FunctionResult {
                            call_id: call.call_id,
                            name: call.name,
                            output,
                        });
                    }

                    if !pending.is_empty() {
                        return Ok(TurnOutcome::Suspended {
                            state: RunState {
                                agent: current,
                                history,
                                pending,
                            },
                        });
                    }
                }
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
