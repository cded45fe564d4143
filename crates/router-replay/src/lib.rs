//! router-replay
//!
//! Reconstructs a run view from its event log and validates the ordering
//! ordering laws a well-formed run must satisfy. Replay never mutates the store; it is a pure function of
//! `(run_id, events)`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use router_core::model::StepStatus;
use router_core::{Event, EventType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single rule violation found during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Stable, machine-readable violation code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Reconstructed view of a single plan step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepView {
    /// The step's id.
    pub step_id: String,
    /// `seq` of this step's `STEP_STARTED`, if present.
    pub started_seq: Option<u64>,
    /// `seq` of this step's `STEP_COMPLETED`, if present.
    pub completed_seq: Option<u64>,
    /// `seq`s of every `TOOL_CALL_*` event attributed to this step.
    pub tool_call_seqs: Vec<u64>,
    /// Final `status` from `STEP_COMPLETED`, if present.
    pub status: Option<StepStatus>,
}

/// Reconstructed view of an entire run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunView {
    /// The run this view was built for.
    pub run_id: String,
    /// Steps, in the order their `STEP_STARTED` first appeared.
    pub steps: Vec<StepView>,
    /// The terminal event type, if the log reached one.
    pub terminal: Option<EventType>,
    /// `seq` of the terminal event, if any.
    pub terminal_seq: Option<u64>,
    /// `adapter_id` from `DISPATCH_SELECTED`, if any.
    pub adapter_id: Option<String>,
}

/// Output of [`replay`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    /// The reconstructed view.
    pub view: RunView,
    /// Every rule violation found, regardless of `strict`.
    pub violations: Vec<Violation>,
    /// `true` unless `strict` is set and `violations` is non-empty.
    pub ok: bool,
}

/// Reconstruct a view of `run_id` from `events` and validate the ordering
/// ordering invariants. `events` need not be pre-sorted; replay sorts by
/// `seq` itself.
///
/// With `strict = false`, every violation is still collected in
/// [`ReplayResult::violations`], but `ok` remains `true`. With
/// `strict = true`, any violation flips `ok` to `false`.
#[must_use]
pub fn replay(run_id: &str, events: &[Event], strict: bool) -> ReplayResult {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|e| e.seq);

    let mut violations = Vec::new();
    check_seq_contiguity(&sorted, &mut violations);
    check_run_started_at_zero(&sorted, &mut violations);
    check_plan_created_after_run_started(&sorted, &mut violations);
    check_terminal(&sorted, &mut violations);
    check_tool_call_requested_fields(&sorted, &mut violations);
    check_dispatch_consistency(&sorted, &mut violations);

    let view = build_view(run_id, &sorted, &mut violations);

    let ok = !strict || violations.is_empty();
    ReplayResult {
        view,
        violations,
        ok,
    }
}

fn check_seq_contiguity(events: &[&Event], violations: &mut Vec<Violation>) {
    for (i, event) in events.iter().enumerate() {
        if event.seq != i as u64 {
            violations.push(Violation::new(
                "SEQ_GAP",
                format!("expected seq {i} at position {i}, found {}", event.seq),
            ));
        }
    }
}

fn check_run_started_at_zero(events: &[&Event], violations: &mut Vec<Violation>) {
    let run_started: Vec<&&Event> = events
        .iter()
        .filter(|e| e.event_type == EventType::RunStarted)
        .collect();
    match run_started.as_slice() {
        [single] if single.seq == 0 => {}
        [single] => violations.push(Violation::new(
            "RUN_STARTED_NOT_AT_ZERO",
            format!("RUN_STARTED found at seq {}, expected 0", single.seq),
        )),
        [] => violations.push(Violation::new("MISSING_RUN_STARTED", "no RUN_STARTED event")),
        _ => violations.push(Violation::new(
            "DUPLICATE_RUN_STARTED",
            format!("{} RUN_STARTED events found, expected exactly one", run_started.len()),
        )),
    }
}

fn check_plan_created_after_run_started(events: &[&Event], violations: &mut Vec<Violation>) {
    let run_started_seq = events
        .iter()
        .find(|e| e.event_type == EventType::RunStarted)
        .map(|e| e.seq);
    if let Some(run_started_seq) = run_started_seq {
        for event in events {
            if event.event_type == EventType::PlanCreated && event.seq <= run_started_seq {
                violations.push(Violation::new(
                    "PLAN_CREATED_BEFORE_RUN_STARTED",
                    format!("PLAN_CREATED at seq {} does not follow RUN_STARTED at seq {run_started_seq}", event.seq),
                ));
            }
        }
    }
}

fn check_terminal(events: &[&Event], violations: &mut Vec<Violation>) {
    let terminal: Vec<&&Event> = events.iter().filter(|e| e.event_type.is_terminal()).collect();
    let highest_seq = events.iter().map(|e| e.seq).max();
    match terminal.as_slice() {
        [] => violations.push(Violation::new("MISSING_TERMINAL", "no terminal event")),
        [single] => {
            if Some(single.seq) != highest_seq {
                violations.push(Violation::new(
                    "TERMINAL_NOT_LAST",
                    format!("terminal event at seq {} is not the highest seq {:?}", single.seq, highest_seq),
                ));
            }
        }
        _ => violations.push(Violation::new(
            "MULTIPLE_TERMINAL",
            format!("{} terminal events found, expected exactly one", terminal.len()),
        )),
    }
}

fn check_tool_call_requested_fields(events: &[&Event], violations: &mut Vec<Violation>) {
    for event in events {
        if event.event_type != EventType::ToolCallRequested {
            continue;
        }
        let has_adapter_id = event.payload.get("adapter_id").and_then(|v| v.as_str()).is_some();
        let has_caps = event.payload.get("adapter_capabilities").is_some();
        if !has_adapter_id || !has_caps {
            violations.push(Violation::new(
                "TOOL_CALL_REQUESTED_MISSING_FIELDS",
                format!("TOOL_CALL_REQUESTED at seq {} is missing adapter_id or adapter_capabilities", event.seq),
            ));
        }
    }
}

fn check_dispatch_consistency(events: &[&Event], violations: &mut Vec<Violation>) {
    let dispatch_adapter_id = events
        .iter()
        .find(|e| e.event_type == EventType::DispatchSelected)
        .and_then(|e| e.payload.get("adapter_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let Some(expected) = dispatch_adapter_id else {
        return;
    };

    for event in events {
        if event.event_type != EventType::ToolCallRequested {
            continue;
        }
        if let Some(actual) = event.payload.get("adapter_id").and_then(|v| v.as_str()) {
            if actual != expected {
                violations.push(Violation::new(
                    "DISPATCH_ADAPTER_MISMATCH",
                    format!(
                        "TOOL_CALL_REQUESTED at seq {} used adapter_id '{actual}', DISPATCH_SELECTED chose '{expected}'",
                        event.seq
                    ),
                ));
            }
        }
    }
}

fn build_view(run_id: &str, events: &[&Event], violations: &mut Vec<Violation>) -> RunView {
    let mut steps: BTreeMap<String, StepView> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut terminal = None;
    let mut terminal_seq = None;
    let mut adapter_id = None;

    for event in events {
        match event.event_type {
            EventType::DispatchSelected => {
                adapter_id = event
                    .payload
                    .get("adapter_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
            }
            EventType::StepStarted => {
                if let Some(step_id) = event.payload.get("step_id").and_then(|v| v.as_str()) {
                    let entry = steps.entry(step_id.to_string()).or_insert_with(|| StepView {
                        step_id: step_id.to_string(),
                        ..Default::default()
                    });
                    if entry.started_seq.is_some() {
                        violations.push(Violation::new(
                            "DUPLICATE_STEP_STARTED",
                            format!("step '{step_id}' has more than one STEP_STARTED"),
                        ));
                    } else {
                        order.push(step_id.to_string());
                    }
                    entry.started_seq = Some(event.seq);
                }
            }
            EventType::ToolCallRequested | EventType::ToolCallSucceeded | EventType::ToolCallFailed => {
                if let Some(step_id) = event.payload.get("step_id").and_then(|v| v.as_str()) {
                    let entry = steps.entry(step_id.to_string()).or_insert_with(|| StepView {
                        step_id: step_id.to_string(),
                        ..Default::default()
                    });
                    entry.tool_call_seqs.push(event.seq);
                }
            }
            EventType::StepCompleted => {
                if let Some(step_id) = event.payload.get("step_id").and_then(|v| v.as_str()) {
                    let entry = steps.entry(step_id.to_string()).or_insert_with(|| StepView {
                        step_id: step_id.to_string(),
                        ..Default::default()
                    });
                    if entry.completed_seq.is_some() {
                        violations.push(Violation::new(
                            "DUPLICATE_STEP_COMPLETED",
                            format!("step '{step_id}' has more than one STEP_COMPLETED"),
                        ));
                    }
                    entry.completed_seq = Some(event.seq);
                    entry.status = event
                        .payload
                        .get("status")
                        .and_then(|v| serde_json::from_value(v.clone()).ok());
                }
            }
            EventType::RunCompleted | EventType::RunFailed => {
                terminal = Some(event.event_type);
                terminal_seq = Some(event.seq);
            }
            _ => {}
        }
    }

    for step_id in &order {
        let view = &steps[step_id];
        let started = view.started_seq;
        let completed = view.completed_seq;
        if completed.is_none() {
            violations.push(Violation::new(
                "STEP_NOT_COMPLETED",
                format!("step '{step_id}' has STEP_STARTED but no STEP_COMPLETED"),
            ));
        }
        if let (Some(started), Some(completed)) = (started, completed) {
            for tc_seq in &view.tool_call_seqs {
                if *tc_seq <= started || *tc_seq >= completed {
                    violations.push(Violation::new(
                        "TOOL_CALL_OUT_OF_BRACKET",
                        format!(
                            "step '{step_id}': tool call at seq {tc_seq} falls outside (STEP_STARTED {started}, STEP_COMPLETED {completed})"
                        ),
                    ));
                }
            }
        }
    }

    RunView {
        run_id: run_id.to_string(),
        steps: order.into_iter().map(|id| steps.remove(&id).unwrap()).collect(),
        terminal,
        terminal_seq,
        adapter_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use router_core::model::Mode;
    use serde_json::json;
    use uuid::Uuid;

    fn event(run_id: &str, seq: u64, event_type: EventType, payload: serde_json::Value) -> Event {
        Event {
            event_id: Uuid::new_v4(),
            run_id: run_id.to_string(),
            seq,
            event_type,
            ts: Utc::now(),
            payload,
        }
    }

    fn happy_path(run_id: &str) -> Vec<Event> {
        vec![
            event(run_id, 0, EventType::RunStarted, json!({"goal": "g", "mode": Mode::DryRun})),
            event(run_id, 1, EventType::DispatchSelected, json!({"adapter_id": "null"})),
            event(run_id, 2, EventType::PlanCreated, json!({"steps": []})),
            event(run_id, 3, EventType::StepStarted, json!({"step_id": "s1"})),
            event(
                run_id,
                4,
                EventType::ToolCallRequested,
                json!({"step_id": "s1", "adapter_id": "null", "adapter_capabilities": ["dry_run"]}),
            ),
            event(run_id, 5, EventType::ToolCallSucceeded, json!({"step_id": "s1"})),
            event(run_id, 6, EventType::StepCompleted, json!({"step_id": "s1", "status": "ok"})),
            event(run_id, 7, EventType::RunCompleted, json!({})),
        ]
    }

    #[test]
    fn clean_log_has_no_violations() {
        let events = happy_path("r1");
        let result = replay("r1", &events, true);
        assert!(result.violations.is_empty(), "{:?}", result.violations);
        assert!(result.ok);
        assert_eq!(result.view.steps.len(), 1);
        assert_eq!(result.view.terminal, Some(EventType::RunCompleted));
    }

    #[test]
    fn seq_gap_is_detected() {
        let mut events = happy_path("r1");
        events[3].seq = 10;
        let result = replay("r1", &events, true);
        assert!(!result.ok);
        assert!(result.violations.iter().any(|v| v.code == "SEQ_GAP"));
    }

    #[test]
    fn missing_run_started_is_detected() {
        let events: Vec<Event> = happy_path("r1").into_iter().filter(|e| e.event_type != EventType::RunStarted).collect();
        let result = replay("r1", &events, true);
        assert!(result.violations.iter().any(|v| v.code == "MISSING_RUN_STARTED"));
    }

    #[test]
    fn tool_call_outside_bracket_is_detected() {
        let mut events = happy_path("r1");
        // Move the tool-call-requested event after STEP_COMPLETED.
        events[4].seq = 6;
        events[6].seq = 4;
        let result = replay("r1", &events, true);
        assert!(result.violations.iter().any(|v| v.code == "TOOL_CALL_OUT_OF_BRACKET"));
    }

    #[test]
    fn non_strict_mode_still_reports_but_stays_ok() {
        let mut events = happy_path("r1");
        events[3].seq = 10;
        let result = replay("r1", &events, false);
        assert!(result.ok);
        assert!(!result.violations.is_empty());
    }

    #[test]
    fn dispatch_mismatch_is_detected() {
        let mut events = happy_path("r1");
        if let serde_json::Value::Object(ref mut map) = events[4].payload {
            map.insert("adapter_id".to_string(), json!("other"));
        }
        let result = replay("r1", &events, true);
        assert!(result.violations.iter().any(|v| v.code == "DISPATCH_ADAPTER_MISMATCH"));
    }

    #[test]
    fn multiple_terminal_events_detected() {
        let mut events = happy_path("r1");
        events.push(event("r1", 8, EventType::RunFailed, json!({})));
        let result = replay("r1", &events, true);
        assert!(result.violations.iter().any(|v| v.code == "MULTIPLE_TERMINAL"));
    }
}
