//! The closed event-type set and the immutable [`Event`] record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of event types a run's log may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A run was created. Exactly one per run, at `seq = 0`.
    RunStarted,
    /// An adapter was resolved for the run's dispatch.
    DispatchSelected,
    /// The run's plan was materialized.
    PlanCreated,
    /// A step began executing.
    StepStarted,
    /// A tool call was issued for a step.
    ToolCallRequested,
    /// A tool call completed successfully.
    ToolCallSucceeded,
    /// A tool call failed.
    ToolCallFailed,
    /// A step finished (either outcome).
    StepCompleted,
    /// The run reached a successful terminal state.
    RunCompleted,
    /// The run reached a failed terminal state.
    RunFailed,
}

impl EventType {
    /// `true` for the two terminal event types.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted | Self::RunFailed)
    }

    /// Stable `&'static str` form, e.g. `"RUN_STARTED"`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunStarted => "RUN_STARTED",
            Self::DispatchSelected => "DISPATCH_SELECTED",
            Self::PlanCreated => "PLAN_CREATED",
            Self::StepStarted => "STEP_STARTED",
            Self::ToolCallRequested => "TOOL_CALL_REQUESTED",
            Self::ToolCallSucceeded => "TOOL_CALL_SUCCEEDED",
            Self::ToolCallFailed => "TOOL_CALL_FAILED",
            Self::StepCompleted => "STEP_COMPLETED",
            Self::RunCompleted => "RUN_COMPLETED",
            Self::RunFailed => "RUN_FAILED",
        }
    }
}

/// An immutable record of a run state transition.
///
/// `seq` is a 0-based, per-run, contiguous integer; `event_id` is globally
/// unique within a store. Events are never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identifier for this event.
    pub event_id: Uuid,
    /// The run this event belongs to.
    pub run_id: String,
    /// 0-based, per-run, contiguous sequence number.
    pub seq: u64,
    /// The event's type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Timestamp the event was recorded.
    pub ts: DateTime<Utc>,
    /// Structured payload whose shape depends on `event_type`.
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventType::ToolCallRequested).unwrap(),
            "\"TOOL_CALL_REQUESTED\""
        );
    }

    #[test]
    fn only_two_terminal_kinds() {
        use EventType::*;
        let all = [
            RunStarted,
            DispatchSelected,
            PlanCreated,
            StepStarted,
            ToolCallRequested,
            ToolCallSucceeded,
            ToolCallFailed,
            StepCompleted,
            RunCompleted,
            RunFailed,
        ];
        let terminal_count = all.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminal_count, 2);
    }
}
