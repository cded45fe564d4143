//! The request/response contract the router accepts and returns.

use router_core::capability::CapabilitySet;
use router_core::{ErrorCode, Mode, Plan, Provenance, Run};
use router_policy::Policy;
use serde::{Deserialize, Serialize};

/// Dispatch selection hints on a [`Request`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchOptions {
    /// Explicit adapter to use. `None` means "use the registry default".
    #[serde(default)]
    pub adapter_id: Option<String>,
    /// Capabilities the caller additionally requires beyond the `apply`
    /// implication of `mode`.
    #[serde(default)]
    pub require_capabilities: CapabilitySet,
}

/// A run request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Caller-supplied run id. Allocated fresh if absent.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Human-readable goal.
    pub goal: String,
    /// Execution mode.
    pub mode: Mode,
    /// Authorization policy for this run.
    #[serde(default)]
    pub policy: Policy,
    /// Dispatch resolution hints.
    #[serde(default)]
    pub dispatch: DispatchOptions,
    /// The fixed plan to execute. Planning/search is out of scope here.
    pub plan_override: Plan,
}

/// How the executing adapter was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// The request named an explicit `adapter_id`.
    Request,
    /// The registry's default adapter was used.
    Default,
}

/// Resolved dispatch information echoed on the [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchInfo {
    /// The adapter that was (or would have been) dispatched to.
    pub adapter_id: String,
    /// That adapter's kind tag.
    pub adapter_kind: String,
    /// How it was resolved.
    pub selection_source: SelectionSource,
}

/// Per-step and overall execution counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    /// The adapter that executed (or would have executed) the plan.
    pub adapter_id: String,
    /// Total steps in the plan.
    pub steps_total: usize,
    /// Steps that completed with `status = ok`.
    pub steps_ok: usize,
    /// Steps that completed with `status = error`.
    pub steps_error: usize,
    /// Wall-clock duration of the whole run, in milliseconds.
    pub duration_ms: u64,
}

/// Terminal error detail echoed on a failed [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code.
    pub error_code: ErrorCode,
    /// Structured, redaction-safe details.
    #[serde(default)]
    pub details: serde_json::Value,
}

/// A completed or failed run, as returned by [`crate::Router::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The run's final header.
    pub run: Run,
    /// Dispatch resolution, if it completed before failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchInfo>,
    /// Execution summary.
    pub summary: Summary,
    /// Content digest, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    /// Terminal error, present iff `run.status == failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}
