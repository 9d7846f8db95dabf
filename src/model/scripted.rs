//! Deterministic model clients.
//!
//! `ScriptedModel` replays a fixed action sequence — the workhorse for
//! engine tests. `KeywordModel` routes on message keywords and drives the
//! offline demo without a provider.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::json;

use crate::engine::history::{Item, ToolCallRequest};
use crate::engine::topology::Agent;

use super::{ModelAction, ModelClient, ModelError};

// ─── ScriptedModel ──────────────────────────────────────────────────────────

/// Replays a queue of actions in order. When the script runs dry it settles
/// with a fixed final message, so a turn always terminates.
pub struct ScriptedModel {
    script: Mutex<VecDeque<ModelAction>>,
}

impl ScriptedModel {
    pub fn new(actions: impl IntoIterator<Item = ModelAction>) -> Self {
        Self {
            script: Mutex::new(actions.into_iter().collect()),
        }
    }

    /// Actions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl ModelClient for ScriptedModel {
    fn next_action<'a>(
        &'a self,
        _agent: &'a Agent,
        _history: &'a [Item],
    ) -> BoxFuture<'a, Result<ModelAction, ModelError>> {
        Box::pin(async move {
            let next = self
                .script
                .lock()
                .map_err(|_| ModelError::new("script lock poisoned"))?
                .pop_front();
            Ok(next.unwrap_or_else(|| ModelAction::FinalMessage("Done.".to_string())))
        })
    }
}

// ─── KeywordModel ───────────────────────────────────────────────────────────

/// A rule-based client for running the demo offline.
///
/// The triage agent routes on keywords in the latest user message; a
/// specialist issues one canned tool call for its domain, then summarizes
/// the tool's output.
pub struct KeywordModel;

impl KeywordModel {
    fn latest_user(history: &[Item]) -> Option<&str> {
        history.iter().rev().find_map(|item| match item {
            Item::User { content } => Some(content.as_str()),
            _ => None,
        })
    }

    /// Tool results appended after the latest user message.
    fn results_since_user(history: &[Item]) -> Vec<&Item> {
        let mut results = Vec::new();
        for item in history.iter().rev() {
            match item {
                Item::User { .. } => break,
                Item::FunctionResult { .. } => results.push(item),
                _ => {}
            }
        }
        results.reverse();
        results
    }

    fn route(message: &str) -> Option<&'static str> {
        let lower = message.to_lowercase();
        if lower.contains("slack") || lower.contains(" dm") || lower.starts_with("dm") {
            Some("slack_agent")
        } else if lower.contains("gmail") || lower.contains("email") || lower.contains("mail") {
            Some("gmail_agent")
        } else {
            None
        }
    }

    fn specialist_call(agent: &Agent, message: &str) -> Option<ToolCallRequest> {
        let lower = message.to_lowercase();
        match agent.name.as_str() {
            "gmail_agent" => {
                if lower.contains("send") && agent.tool("Gmail_SendEmail").is_some() {
                    Some(ToolCallRequest::new(
                        "Gmail_SendEmail",
                        json!({ "subject": "Hello", "body": message }),
                    ))
                } else if agent.tool("Gmail_ListEmails").is_some() {
                    Some(ToolCallRequest::new("Gmail_ListEmails", json!({ "n_emails": 5 })))
                } else {
                    None
                }
            }
            "slack_agent" => {
                if (lower.contains("send") || lower.contains(" dm") || lower.starts_with("dm"))
                    && agent.tool("Slack_SendDmToUser").is_some()
                {
                    Some(ToolCallRequest::new(
                        "Slack_SendDmToUser",
                        json!({ "message": message }),
                    ))
                } else if agent.tool("Slack_ListUsers").is_some() {
                    Some(ToolCallRequest::new("Slack_ListUsers", json!({})))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl ModelClient for KeywordModel {
    fn next_action<'a>(
        &'a self,
        agent: &'a Agent,
        history: &'a [Item],
    ) -> BoxFuture<'a, Result<ModelAction, ModelError>> {
        Box::pin(async move {
            let message = Self::latest_user(history).unwrap_or_default();
            let results = Self::results_since_user(history);

            // A specialist with fresh tool output summarizes it.
            if !results.is_empty() {
                let summaries: Vec<String> = results
                    .iter()
                    .filter_map(|item| match item {
                        Item::FunctionResult { name, output, .. } => {
                            Some(format!("{name}: {output}"))
                        }
                        _ => None,
                    })
                    .collect();
                return Ok(ModelAction::FinalMessage(summaries.join("\n")));
            }

            if agent.name == "triage_agent" {
                if let Some(target) = Self::route(message) {
                    if agent.can_hand_off(target) {
                        return Ok(ModelAction::Handoff {
                            target: target.to_string(),
                        });
                    }
                }
                return Ok(ModelAction::FinalMessage(
                    "I can help with Gmail and Slack tasks. What would you like to do?"
                        .to_string(),
                ));
            }

            match Self::specialist_call(agent, message) {
                Some(call) => Ok(ModelAction::ToolCalls(vec![call])),
                None => Ok(ModelAction::Handoff {
                    target: "triage_agent".to_string(),
                }),
            }
        })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::history::user;

    fn bare_agent(name: &str) -> Agent {
        Agent {
            name: name.to_string(),
            model: "gpt-4o".to_string(),
            instructions: String::new(),
            tools: vec![],
            handoffs: vec![
                "triage_agent".to_string(),
                "gmail_agent".to_string(),
                "slack_agent".to_string(),
            ],
        }
    }

    #[tokio::test]
    async fn test_scripted_model_replays_then_settles() {
        let model = ScriptedModel::new([ModelAction::Handoff {
            target: "gmail_agent".to_string(),
        }]);
        let agent = bare_agent("triage_agent");
        let history = [user("check my email")];

        let first = model.next_action(&agent, &history).await.unwrap();
        assert_eq!(
            first,
            ModelAction::Handoff {
                target: "gmail_agent".to_string()
            }
        );
        // Script exhausted: always a final message.
        let second = model.next_action(&agent, &history).await.unwrap();
        assert!(matches!(second, ModelAction::FinalMessage(_)));
    }

    #[tokio::test]
    async fn test_keyword_model_routes_triage() {
        let model = KeywordModel;
        let agent = bare_agent("triage_agent");

        let action = model
            .next_action(&agent, &[user("send a Slack message to ana")])
            .await
            .unwrap();
        assert_eq!(
            action,
            ModelAction::Handoff {
                target: "slack_agent".to_string()
            }
        );

        let action = model
            .next_action(&agent, &[user("what is the weather")])
            .await
            .unwrap();
        assert!(matches!(action, ModelAction::FinalMessage(_)));
    }

    #[tokio::test]
    async fn test_keyword_model_summarizes_results() {
        let model = KeywordModel;
        let agent = bare_agent("gmail_agent");
        let history = [
            user("check my email"),
            Item::FunctionResult {
                call_id: "call_1".to_string(),
                name: "Gmail_ListEmails".to_string(),
                output: json!({ "emails": [] }),
            },
        ];
        let action = model.next_action(&agent, &history).await.unwrap();
        match action {
            ModelAction::FinalMessage(text) => assert!(text.contains("Gmail_ListEmails")),
            other => panic!("expected final message, got {other:?}"),
        }
    }
}
