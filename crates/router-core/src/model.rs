//! Run, Plan, Step, and the shared request/response contract types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution mode for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Steps are simulated; adapters are never invoked.
    DryRun,
    /// Steps are dispatched to a real adapter.
    Apply,
}

/// Terminal and in-flight status of a [`Run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run has started and has not yet reached a terminal event.
    Running,
    /// The run reached `RUN_COMPLETED`.
    Completed,
    /// The run reached `RUN_FAILED`.
    Failed,
}

/// A single unit of orchestrated work: `{run_id, goal, mode, created_at, status}`.
///
/// Created at `RUN_STARTED` and mutated only via terminal events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for this run.
    pub run_id: String,
    /// Human-readable goal the run is pursuing.
    pub goal: String,
    /// Execution mode requested for this run.
    pub mode: Mode,
    /// Timestamp the run was created (`RUN_STARTED`).
    pub created_at: DateTime<Utc>,
    /// Current status.
    pub status: RunStatus,
}

/// A single tool invocation: `{tool, method, args}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke.
    pub tool: String,
    /// Method on the tool to invoke.
    pub method: String,
    /// Structured arguments for the call.
    #[serde(default)]
    pub args: serde_json::Value,
}

/// A single step of a [`Plan`]: `{step_id, intent, call}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Identifier unique within the run. Order of appearance is execution order.
    pub step_id: String,
    /// Human intent behind the step.
    #[serde(default)]
    pub intent: String,
    /// The call to dispatch for this step.
    pub call: ToolCall,
}

/// An ordered sequence of [`Step`]s.
pub type Plan = Vec<Step>;

/// Outcome of a single executed step, recorded in `STEP_COMPLETED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step's tool call succeeded.
    Ok,
    /// The step's tool call failed with an operational error.
    Error,
}

/// Aggregate counts returned alongside a [`Run`] listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Total number of runs matching the query.
    pub total: usize,
    /// Number of runs with `status = completed`.
    pub completed: usize,
    /// Number of runs with `status = failed`.
    pub failed: usize,
    /// Number of runs with `status = running`.
    pub running: usize,
}
