//! router-adapter
//!
//! The adapter protocol: a closed interface with four members —
//! identity, kind, capabilities, and `call` — plus the three built-in
//! executors (`null`, `fake`, `subprocess`).
//!
//! Determinism contract: `call` must be a pure function of its arguments
//! except where explicitly documented (wall time, generated ids). Adapters
//! must not mutate process-wide state or call other adapters.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// The built-in `null`, `fake`, and `subprocess` adapters.
pub mod builtins;
/// Redaction applied to adapter-sourced data before it is persisted.
pub mod redact;

pub use builtins::{FakeAdapter, NullAdapter, SubprocessAdapter, SubprocessConfig};
pub use redact::Redactor;

use async_trait::async_trait;
use router_core::capability::CapabilitySet;
use router_core::RouterError;

/// Executor of a single tool call, with declared capabilities.
///
/// Instances have no internal router-observable state beyond
/// `adapter_id`, `adapter_kind`, and `capabilities` — any further state
/// an implementation keeps (like [`FakeAdapter`]'s invocation log) is for
/// test introspection only and never observed by the router.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable, non-empty identifier for this adapter instance.
    fn adapter_id(&self) -> &str;

    /// Non-empty kind tag, e.g. `"null"`, `"fake"`, `"subprocess"`, `"http"`.
    fn adapter_kind(&self) -> &str;

    /// Capabilities this adapter declares.
    fn capabilities(&self) -> &CapabilitySet;

    /// Invoke `tool.method(args)` and return a structured, serializable
    /// result.
    ///
    /// # Errors
    ///
    /// Returns an operational [`RouterError`] for expected failures
    /// (timeout, non-zero exit, malformed output, ...) and a bug
    /// [`RouterError`] for anything else.
    async fn call(
        &self,
        tool: &str,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, RouterError>;
}
