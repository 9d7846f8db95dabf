//! Tool-layer error types.

use thiserror::Error;

/// Errors that can occur while building the tool set or executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Neither a toolkit nor an individual tool was selected at build time.
    #[error("at least one tool or toolkit must be provided")]
    Configuration,

    /// The tool catalog could not satisfy a fetch (toolkit listing or
    /// individual tool lookup). Aggregated fan-out failures surface as one
    /// of these and abort the whole registry build.
    #[error("catalog error for '{subject}': {reason}")]
    CatalogUnavailable { subject: String, reason: String },

    /// Tool not present in the catalog.
    #[error("unknown tool: '{name}'")]
    UnknownTool { name: String },

    /// The executor needs a one-time external grant before it can run.
    ///
    /// Recoverable signal: consumed by the `AuthBridge`, never surfaced past
    /// it. A second occurrence after a completed grant is terminal.
    #[error("tool '{tool}' requires authorization")]
    AuthorizationRequired { tool: String },

    /// The grant wait loop hit its bounded timeout.
    #[error("authorization for '{tool}' timed out after {waited_ms}ms")]
    AuthorizationTimeout { tool: String, waited_ms: u64 },

    /// The consent provider reported the grant as failed, or the tool still
    /// demanded authorization after a completed grant.
    #[error("authorization for '{tool}' was denied")]
    AuthorizationDenied { tool: String },

    /// The tool executed and returned a failure.
    #[error("tool '{tool}' failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },
}
