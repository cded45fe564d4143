//! End-to-end scenarios.

use std::sync::Arc;
use tool_router::adapter::{FakeAdapter, NullAdapter};
use tool_router::core::capability::{Capability, CapabilitySet};
use tool_router::core::{EventType, ErrorCode, Mode, RouterError, RunStatus, Step, ToolCall};
use tool_router::engine::{DispatchOptions, Request, Router};
use tool_router::policy::Policy;
use tool_router::registry::AdapterRegistry;
use tool_router::store::{EventStore, StoreConfig};

fn fresh_store() -> Arc<EventStore> {
    Arc::new(EventStore::open(":memory:", StoreConfig::default()).unwrap())
}

fn step(step_id: &str, tool: &str, method: &str) -> Step {
    Step {
        step_id: step_id.to_string(),
        intent: String::new(),
        call: ToolCall {
            tool: tool.to_string(),
            method: method.to_string(),
            args: serde_json::json!({}),
        },
    }
}

fn base_request() -> Request {
    Request {
        run_id: None,
        goal: "demo".to_string(),
        mode: Mode::DryRun,
        policy: Policy::default(),
        dispatch: DispatchOptions::default(),
        plan_override: vec![],
    }
}

#[tokio::test]
async fn scenario_dry_run_empty_plan() {
    let store = fresh_store();
    let mut registry = AdapterRegistry::new("null");
    registry.register(Arc::new(NullAdapter::new("null")));
    let router = Router::new(store.clone(), Arc::new(registry));

    let response = router.run(base_request()).await.unwrap();

    assert_eq!(response.run.status, RunStatus::Completed);
    assert_eq!(response.summary.steps_total, 0);
    assert_eq!(response.summary.steps_ok, 0);

    let events = store.iter_events(&response.run.run_id).unwrap();
    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::RunStarted,
            EventType::DispatchSelected,
            EventType::PlanCreated,
            EventType::RunCompleted,
        ]
    );
}

#[tokio::test]
async fn scenario_apply_denied_by_policy() {
    let store = fresh_store();
    let mut registry = AdapterRegistry::new("fake");
    registry.register(Arc::new(FakeAdapter::new("fake")));
    let router = Router::new(store.clone(), Arc::new(registry));

    let mut request = base_request();
    request.mode = Mode::Apply;
    request.policy = Policy {
        allow_apply: false,
        max_steps: None,
    };
    request.plan_override = vec![step("s1", "t", "m")];

    let response = router.run(request).await.unwrap();

    assert_eq!(response.run.status, RunStatus::Failed);
    assert_eq!(response.error.unwrap().error_code, ErrorCode::PolicyDenied);

    let events = store.iter_events(&response.run.run_id).unwrap();
    assert!(!events.iter().any(|e| e.event_type == EventType::StepStarted));
}

#[tokio::test]
async fn scenario_capability_missing() {
    let store = fresh_store();
    let mut registry = AdapterRegistry::new("null");
    registry.register(Arc::new(NullAdapter::new("null")));
    let router = Router::new(store.clone(), Arc::new(registry));

    let mut request = base_request();
    request.mode = Mode::Apply;
    request.dispatch.adapter_id = Some("null".to_string());
    request.plan_override = vec![step("s1", "t", "m")];

    let response = router.run(request).await.unwrap();

    assert_eq!(response.run.status, RunStatus::Failed);
    let error = response.error.unwrap();
    assert_eq!(error.error_code, ErrorCode::CapabilityMissing);
    assert_eq!(error.details["required_capability"], "apply");

    let events = store.iter_events(&response.run.run_id).unwrap();
    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::RunStarted,
            EventType::DispatchSelected,
            EventType::RunFailed,
        ]
    );
}

#[tokio::test]
async fn scenario_operational_failure_mid_plan() {
    let store = fresh_store();
    let fake = Arc::new(FakeAdapter::new("fake"));
    fake.set_failure(
        "t",
        "fails",
        RouterError::operational(ErrorCode::Timeout, "too slow"),
    );
    fake.set_success("t", "ok", serde_json::json!({"done": true}));

    let mut registry = AdapterRegistry::new("fake");
    registry.register(fake);
    let router = Router::new(store.clone(), Arc::new(registry));

    let mut request = base_request();
    request.mode = Mode::Apply;
    request.plan_override = vec![step("s1", "t", "fails"), step("s2", "t", "ok")];

    let response = router.run(request).await.unwrap();

    assert_eq!(response.run.status, RunStatus::Completed);
    assert_eq!(response.summary.steps_ok, 1);
    assert_eq!(response.summary.steps_error, 1);

    let events = store.iter_events(&response.run.run_id).unwrap();
    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::RunStarted,
            EventType::DispatchSelected,
            EventType::PlanCreated,
            EventType::StepStarted,
            EventType::ToolCallRequested,
            EventType::ToolCallFailed,
            EventType::StepCompleted,
            EventType::StepStarted,
            EventType::ToolCallRequested,
            EventType::ToolCallSucceeded,
            EventType::StepCompleted,
            EventType::RunCompleted,
        ]
    );
}

#[tokio::test]
async fn scenario_bug_propagation() {
    let store = fresh_store();
    let fake = Arc::new(FakeAdapter::new("fake"));
    fake.set_failure(
        "t",
        "boom",
        RouterError::bug(ErrorCode::BugError, "unexpected panic in adapter"),
    );

    let mut registry = AdapterRegistry::new("fake");
    registry.register(fake);
    let router = Router::new(store.clone(), Arc::new(registry));

    let mut request = base_request();
    request.mode = Mode::Apply;
    request.plan_override = vec![step("s1", "t", "boom")];

    let err = router.run(request).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::BugError);

    // We don't have the run_id back on error, but exactly one run should
    // have been created and it should be terminally failed.
    let (runs, _) = store
        .list_runs(&tool_router::store::ListRunsFilter::default())
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);

    let events = store.iter_events(&runs[0].run_id).unwrap();
    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::RunStarted,
            EventType::DispatchSelected,
            EventType::PlanCreated,
            EventType::StepStarted,
            EventType::ToolCallRequested,
            EventType::ToolCallFailed,
            EventType::StepCompleted,
            EventType::RunFailed,
        ]
    );
}

#[tokio::test]
async fn scenario_export_import_round_trip() {
    let store = fresh_store();
    let mut registry = AdapterRegistry::new("null");
    registry.register(Arc::new(NullAdapter::new("null")));
    let router = Router::new(store.clone(), Arc::new(registry));

    let mut request = base_request();
    request.plan_override = vec![step("s1", "t", "m")];
    let response = router.run(request).await.unwrap();

    let bundle = tool_router::bundle::export(&store, &response.run.run_id, true).unwrap();
    let export_digest = bundle.provenance.clone().unwrap().digest;

    let target = fresh_store();
    tool_router::bundle::import(&target, bundle, tool_router::bundle::ImportOptions::default()).unwrap();

    let reexported = tool_router::bundle::export(&target, &response.run.run_id, true).unwrap();
    assert_eq!(reexported.provenance.unwrap().digest, export_digest);

    let events = target.iter_events(&response.run.run_id).unwrap();
    let replayed = tool_router::replay::replay(&response.run.run_id, &events, true);
    assert!(replayed.ok, "{:?}", replayed.violations);
}

#[tokio::test]
async fn dry_run_never_invokes_adapter() {
    let store = fresh_store();
    let fake = Arc::new(FakeAdapter::new("fake"));
    let mut registry = AdapterRegistry::new("fake");
    registry.register(fake.clone());
    let router = Router::new(store, Arc::new(registry));

    let mut request = base_request();
    request.mode = Mode::DryRun;
    request.plan_override = vec![step("s1", "t", "m")];
    router.run(request).await.unwrap();

    assert_eq!(fake.invocation_count(), 0);
}

#[tokio::test]
async fn require_capabilities_from_request_are_enforced_even_in_dry_run() {
    let store = fresh_store();
    let mut registry = AdapterRegistry::new("null");
    registry.register(Arc::new(NullAdapter::new("null")));
    let router = Router::new(store.clone(), Arc::new(registry));

    let mut request = base_request();
    let mut required = CapabilitySet::new();
    required.insert(Capability::External);
    request.dispatch.require_capabilities = required;

    let response = router.run(request).await.unwrap();
    assert_eq!(response.run.status, RunStatus::Failed);
    assert_eq!(
        response.error.unwrap().error_code,
        ErrorCode::CapabilityMissing
    );
}
