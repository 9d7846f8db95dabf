//! Tool layer — catalog boundaries, registry build, and the authorization
//! handshake.
//!
//! Submodules:
//! - `catalog`: `ToolCatalog` / `ConsentProvider` traits + offline demo impls
//! - `registry`: concurrent fetch, dedup, approval denylist, bridge wrapping
//! - `auth`: the attempt → grant → poll → retry-exactly-once `AuthBridge`
//! - `types`: definitions, descriptors, selections, grant types
//! - `errors`: tool-level error types

pub mod auth;
pub mod catalog;
pub mod errors;
pub mod registry;
pub mod types;

// Re-exports for convenience
pub use auth::{AuthBridge, AuthBridgeConfig};
pub use catalog::{ConsentProvider, InstantConsent, StaticCatalog, ToolCatalog};
pub use errors::ToolError;
pub use registry::{build_tools, requires_approval, TOOLS_WITH_APPROVAL};
pub use types::{
    GrantRequest, GrantStatus, ToolDefinition, ToolDescriptor, ToolExecutor, ToolSelection,
};
