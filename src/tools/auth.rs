//! AuthBridge — the attempt → grant → poll → retry-exactly-once adapter.
//!
//! Some tools discover only at call time that the user has never granted the
//! platform access to the underlying account (OAuth-style consent). The
//! bridge turns that distinguished failure into a bounded handshake:
//!
//! 1. Invoke the raw action.
//! 2. On `ToolError::AuthorizationRequired` — request a grant, surface the
//!    consent URL in the log, and poll the grant status.
//! 3. On `Completed`, re-invoke the original action with the original input
//!    exactly once and return its result as-is.
//! 4. On `Failed`, or when the bounded wait elapses, fail the call. Nothing
//!    is retried further.
//!
//! The retry-once guarantee is structural — the second invocation sits on a
//! separate code path after the poll loop, so no catch-and-recurse can run
//! the action a third time. This handshake is orthogonal to human approval:
//! approval decides *whether* to execute, the bridge handles *environmental
//! consent* discovered while executing.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use super::catalog::{ConsentProvider, ToolCatalog};
use super::errors::ToolError;
use super::types::{GrantStatus, ToolExecutor};

// ─── Configuration ──────────────────────────────────────────────────────────

/// Bounds for the grant wait loop.
#[derive(Debug, Clone, Copy)]
pub struct AuthBridgeConfig {
    /// Delay between grant status polls.
    pub poll_interval: Duration,
    /// Maximum total time to wait for the grant before failing the call.
    pub wait_timeout: Duration,
}

impl Default for AuthBridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(60),
        }
    }
}

// ─── AuthBridge ─────────────────────────────────────────────────────────────

/// Wraps one tool's raw catalog execution with the authorization handshake.
///
/// One bridge is created per tool descriptor at registry build time; it
/// carries the `(tool, user)` pair the grant is scoped to.
pub struct AuthBridge {
    catalog: Arc<dyn ToolCatalog>,
    consent: Arc<dyn ConsentProvider>,
    tool: String,
    user_id: String,
    config: AuthBridgeConfig,
}

impl AuthBridge {
    /// Create a bridge for a single `(tool, user)` pair.
    pub fn new(
        catalog: Arc<dyn ToolCatalog>,
        consent: Arc<dyn ConsentProvider>,
        tool: impl Into<String>,
        user_id: impl Into<String>,
        config: AuthBridgeConfig,
    ) -> Self {
        Self {
            catalog,
            consent,
            tool: tool.into(),
            user_id: user_id.into(),
            config,
        }
    }

    /// Phase two: the grant handshake after a distinguished failure.
    ///
    /// Polls until a terminal grant status or the bounded timeout, then
    /// either re-invokes the action once or fails the call.
    async fn authorize_and_retry(
        &self,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let grant = self
            .consent
            .request_grant(&self.tool, &self.user_id)
            .await?;

        tracing::info!(
            tool = %self.tool,
            user = %self.user_id,
            consent_url = %grant.consent_url,
            "authorization required — waiting for grant"
        );

        let started = Instant::now();
        loop {
            match self.consent.poll_grant(&grant.grant_id).await? {
                GrantStatus::Completed => {
                    tracing::info!(
                        tool = %self.tool,
                        grant_id = %grant.grant_id,
                        "grant completed, re-invoking once"
                    );
                    // The single permitted re-invocation. If the platform
                    // still demands authorization, the call is over.
                    return self
                        .catalog
                        .execute(&self.tool, input, &self.user_id)
                        .await
                        .map_err(|e| match e {
                            ToolError::AuthorizationRequired { tool } => {
                                tracing::warn!(
                                    tool = %tool,
                                    "tool demanded authorization again after a completed grant"
                                );
                                ToolError::AuthorizationDenied { tool }
                            }
                            other => other,
                        });
                }
                GrantStatus::Failed => {
                    tracing::warn!(
                        tool = %self.tool,
                        grant_id = %grant.grant_id,
                        "grant failed"
                    );
                    return Err(ToolError::AuthorizationDenied {
                        tool: self.tool.clone(),
                    });
                }
                GrantStatus::Pending => {}
            }

            let waited = started.elapsed();
            if waited + self.config.poll_interval > self.config.wait_timeout {
                tracing::warn!(
                    tool = %self.tool,
                    grant_id = %grant.grant_id,
                    waited_ms = waited.as_millis() as u64,
                    "grant wait timed out"
                );
                return Err(ToolError::AuthorizationTimeout {
                    tool: self.tool.clone(),
                    waited_ms: waited.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

impl ToolExecutor for AuthBridge {
    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value, ToolError>> {
        Box::pin(async move {
            // Phase one: the plain attempt. Only the distinguished
            // authorization signal routes into the handshake.
            match self
                .catalog
                .execute(&self.tool, input.clone(), &self.user_id)
                .await
            {
                Err(ToolError::AuthorizationRequired { .. }) => {
                    self.authorize_and_retry(input).await
                }
                other => other,
            }
        })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::tools::types::{GrantRequest, ToolDefinition};

    /// A catalog whose single tool fails with AuthorizationRequired a
    /// configurable number of times before succeeding.
    struct FlakyAuthCatalog {
        failures_left: Mutex<u32>,
        calls: Mutex<u32>,
    }

    impl FlakyAuthCatalog {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl ToolCatalog for FlakyAuthCatalog {
        fn list_toolkit<'a>(
            &'a self,
            _toolkit: &'a str,
            _user_id: &'a str,
        ) -> BoxFuture<'a, Result<Vec<ToolDefinition>, ToolError>> {
            Box::pin(async { Ok(vec![]) })
        }

        fn get_tool<'a>(
            &'a self,
            name: &'a str,
            _user_id: &'a str,
        ) -> BoxFuture<'a, Result<ToolDefinition, ToolError>> {
            Box::pin(async move {
                Err(ToolError::UnknownTool {
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
                *self.calls.lock().unwrap() += 1;
                let mut left = self.failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    Err(ToolError::AuthorizationRequired {
                        tool: name.to_string(),
                    })
                } else {
                    Ok(json!({ "status": "sent" }))
                }
            })
        }
    }

    /// A consent provider scripted with a sequence of poll responses.
    struct ScriptedConsent {
        statuses: Mutex<Vec<GrantStatus>>,
    }

    impl ScriptedConsent {
        fn new(statuses: Vec<GrantStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses),
            }
        }
    }

    impl ConsentProvider for ScriptedConsent {
        fn request_grant<'a>(
            &'a self,
            tool: &'a str,
            user_id: &'a str,
        ) -> BoxFuture<'a, Result<GrantRequest, ToolError>> {
            Box::pin(async move {
                Ok(GrantRequest::new(
                    "g1",
                    format!("https://consent.example/{tool}/{user_id}"),
                ))
            })
        }

        fn poll_grant<'a>(
            &'a self,
            _grant_id: &'a str,
        ) -> BoxFuture<'a, Result<GrantStatus, ToolError>> {
            Box::pin(async move {
                let mut statuses = self.statuses.lock().unwrap();
                if statuses.is_empty() {
                    Ok(GrantStatus::Pending)
                } else {
                    Ok(statuses.remove(0))
                }
            })
        }
    }

    fn bridge(
        catalog: Arc<FlakyAuthCatalog>,
        consent: Arc<dyn ConsentProvider>,
        config: AuthBridgeConfig,
    ) -> AuthBridge {
        AuthBridge::new(catalog, consent, "Gmail_SendEmail", "mateo@example.dev", config)
    }

    #[tokio::test]
    async fn test_no_authorization_needed_executes_once() {
        let catalog = Arc::new(FlakyAuthCatalog::new(0));
        let consent = Arc::new(ScriptedConsent::new(vec![]));
        let bridge = bridge(catalog.clone(), consent, AuthBridgeConfig::default());

        let result = bridge.execute(json!({"recipient": "ana"})).await.unwrap();
        assert_eq!(result["status"], "sent");
        assert_eq!(catalog.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_completed_invokes_exactly_twice() {
        let catalog = Arc::new(FlakyAuthCatalog::new(1));
        let consent = Arc::new(ScriptedConsent::new(vec![
            GrantStatus::Pending,
            GrantStatus::Pending,
            GrantStatus::Completed,
        ]));
        let bridge = bridge(catalog.clone(), consent, AuthBridgeConfig::default());

        let result = bridge.execute(json!({"recipient": "ana"})).await.unwrap();
        assert_eq!(result["status"], "sent");
        // One failed attempt + one post-grant re-invocation, never more.
        assert_eq!(catalog.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_failed_is_denied() {
        let catalog = Arc::new(FlakyAuthCatalog::new(1));
        let consent = Arc::new(ScriptedConsent::new(vec![GrantStatus::Failed]));
        let bridge = bridge(catalog.clone(), consent, AuthBridgeConfig::default());

        let err = bridge.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::AuthorizationDenied { .. }));
        assert_eq!(catalog.call_count(), 1, "no re-invocation after denial");
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_wait_times_out() {
        let catalog = Arc::new(FlakyAuthCatalog::new(1));
        // Never leaves Pending.
        let consent = Arc::new(ScriptedConsent::new(vec![]));
        let config = AuthBridgeConfig {
            poll_interval: Duration::from_millis(100),
            wait_timeout: Duration::from_millis(450),
        };
        let bridge = bridge(catalog.clone(), consent, config);

        let err = bridge.execute(json!({})).await.unwrap_err();
        match err {
            ToolError::AuthorizationTimeout { tool, .. } => {
                assert_eq!(tool, "Gmail_SendEmail");
            }
            other => panic!("expected AuthorizationTimeout, got {other:?}"),
        }
        assert_eq!(catalog.call_count(), 1, "no re-invocation after timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_authorization_demand_is_terminal() {
        // Fails with AuthorizationRequired twice: once before the grant and
        // once after. The bridge must not start a second grant round.
        let catalog = Arc::new(FlakyAuthCatalog::new(2));
        let consent = Arc::new(ScriptedConsent::new(vec![GrantStatus::Completed]));
        let bridge = bridge(catalog.clone(), consent, AuthBridgeConfig::default());

        let err = bridge.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::AuthorizationDenied { .. }));
        assert_eq!(catalog.call_count(), 2, "exactly two invocations, never three");
    }
}
