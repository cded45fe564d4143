//! router-engine
//!
//! The run orchestration state machine: `Initialized → Dispatching →
//! Planning → Executing(step_i) → Terminal{Completed|Failed}`. Each
//! transition corresponds to exactly one event append; the append is the
//! commit.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod request;

pub use request::{
    DispatchInfo, DispatchOptions, ErrorInfo, Request, SelectionSource, Summary,
};
pub use request::Response;

use chrono::Utc;
use router_core::capability::{Capability, CapabilitySet};
use router_core::model::{RunStatus, StepStatus};
use router_core::{ErrorCode, ErrorKind, Event, EventType, Mode, RouterError};
use router_registry::AdapterRegistry;
use router_store::EventStore;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Drives a single [`Request`] to a terminal [`Response`], recording every
/// transition into an [`EventStore`].
///
/// A `Router` is cheap to construct and holds no run-specific state; callers
/// may share one across concurrent runs (of *different* `run_id`s) as long
/// as the store and registry it wraps tolerate that, which both do.
pub struct Router {
    store: Arc<EventStore>,
    registry: Arc<AdapterRegistry>,
}

impl Router {
    /// Build a router over an event store and adapter registry.
    #[must_use]
    pub fn new(store: Arc<EventStore>, registry: Arc<AdapterRegistry>) -> Self {
        Self { store, registry }
    }

    /// Run `request` to completion.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for bug-class failures: an adapter raising an
    /// unclassified exception, an event store append failing, or an
    /// internal invariant (e.g. duplicate `step_id`) slipping past its
    /// expected schema-level rejection. Every operational outcome —
    /// including a denied or failed run — is surfaced as `Ok(Response)`
    /// with `response.error` populated.
    pub async fn run(&self, request: Request) -> Result<Response, RouterError> {
        self.run_cancellable(request, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Run `request` to completion, honoring `cancel` at step boundaries
    /// Once `cancel` reads `true` after a `STEP_COMPLETED`, the run
    /// terminates with `RUN_FAILED(error_code=CANCELLED)` without starting
    /// the next step. An in-flight adapter call is never interrupted.
    ///
    /// # Errors
    ///
    /// See [`Router::run`].
    #[instrument(skip(self, request, cancel), fields(goal = %request.goal))]
    pub async fn run_cancellable(
        &self,
        request: Request,
        cancel: Arc<AtomicBool>,
    ) -> Result<Response, RouterError> {
        let started_at = Instant::now();
        let run_id = request
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = Utc::now();

        self.store
            .create_run(&run_id, &request.goal, request.mode, created_at)
            .map_err(router_store::StoreError::into_router_error)?;

        self.append(&run_id, EventType::RunStarted, json!({
            "goal": request.goal,
            "mode": request.mode,
            "request_echo": {
                "policy": request.policy,
                "dispatch": request.dispatch,
                "plan_override": request.plan_override,
            },
        }))?;

        // --- Dispatch Select ---
        let (adapter, selection_source) = match &request.dispatch.adapter_id {
            Some(id) => match self.registry.get(id) {
                Ok(a) => (a, SelectionSource::Request),
                Err(e) => return self.abort(&run_id, request.mode, started_at, 0, e).await,
            },
            None => match self.registry.get_default() {
                Ok(a) => (a, SelectionSource::Default),
                Err(e) => return self.abort(&run_id, request.mode, started_at, 0, e).await,
            },
        };

        self.append(
            &run_id,
            EventType::DispatchSelected,
            json!({
                "adapter_id": adapter.adapter_id(),
                "adapter_kind": adapter.adapter_kind(),
                "capabilities": adapter.capabilities(),
                "selection_source": selection_source,
            }),
        )?;
        let dispatch = DispatchInfo {
            adapter_id: adapter.adapter_id().to_string(),
            adapter_kind: adapter.adapter_kind().to_string(),
            selection_source,
        };

        let mut required = request.dispatch.require_capabilities.clone();
        if request.mode == Mode::Apply {
            required.insert(Capability::Apply);
        }
        if let Some(missing) = first_missing_capability(adapter.capabilities(), &required) {
            let err = RouterError::operational(
                ErrorCode::CapabilityMissing,
                format!("adapter '{}' does not declare capability '{missing}'", adapter.adapter_id()),
            )
            .with_detail("required_capability", missing.as_str())
            .with_detail(
                "adapter_capabilities",
                adapter
                    .capabilities()
                    .iter()
                    .map(Capability::as_str)
                    .collect::<Vec<_>>(),
            );
            return self
                .abort_with_dispatch(&run_id, request.mode, started_at, 0, dispatch, err)
                .await;
        }

        // --- Policy Check ---
        if let Err(err) = router_policy::evaluate(
            &request.policy,
            request.mode,
            request.plan_override.len(),
        ) {
            return self
                .abort_with_dispatch(&run_id, request.mode, started_at, 0, dispatch, err)
                .await;
        }

        if let Some(dup) = first_duplicate_step_id(&request.plan_override) {
            let err = RouterError::bug(
                ErrorCode::BugError,
                format!("duplicate step_id '{dup}' reached the core; this must be rejected upstream"),
            )
            .with_detail("step_id", dup);
            return Err(self
                .fail_terminal(&run_id, request.mode, started_at, 0, dispatch, err)
                .await?);
        }

        // --- Plan ---
        self.append(
            &run_id,
            EventType::PlanCreated,
            json!({ "steps": request.plan_override }),
        )?;

        // --- Execute loop ---
        let mut steps_ok = 0usize;
        let mut steps_error = 0usize;
        let steps_total = request.plan_override.len();

        for step in &request.plan_override {
            self.append(
                &run_id,
                EventType::StepStarted,
                json!({ "step_id": step.step_id, "intent": step.intent, "call": step.call }),
            )?;
            self.append(
                &run_id,
                EventType::ToolCallRequested,
                json!({
                    "step_id": step.step_id,
                    "call": step.call,
                    "adapter_id": adapter.adapter_id(),
                    "adapter_capabilities": adapter.capabilities(),
                }),
            )?;

            let call_started = Instant::now();
            let outcome = if request.mode == Mode::DryRun {
                Ok(json!({ "ok": true, "simulated": true, "step_id": step.step_id }))
            } else {
                adapter
                    .call(&step.call.tool, &step.call.method, &step.call.args)
                    .await
            };
            let duration_ms = call_started.elapsed().as_millis() as u64;

            let step_status = match outcome {
                Ok(output) => {
                    self.append(
                        &run_id,
                        EventType::ToolCallSucceeded,
                        json!({ "step_id": step.step_id, "output": output, "duration_ms": duration_ms }),
                    )?;
                    steps_ok += 1;
                    StepStatus::Ok
                }
                Err(err) if err.kind == ErrorKind::Operational => {
                    warn!(step_id = %step.step_id, code = %err.code, "step failed operationally");
                    self.append(
                        &run_id,
                        EventType::ToolCallFailed,
                        json!({
                            "step_id": step.step_id,
                            "error_code": err.code,
                            "details": err.details,
                            "duration_ms": duration_ms,
                        }),
                    )?;
                    steps_error += 1;
                    StepStatus::Error
                }
                Err(err) => {
                    self.append(
                        &run_id,
                        EventType::ToolCallFailed,
                        json!({
                            "step_id": step.step_id,
                            "error_code": err.code,
                            "details": err.details,
                            "duration_ms": duration_ms,
                        }),
                    )?;
                    self.append(
                        &run_id,
                        EventType::StepCompleted,
                        json!({ "step_id": step.step_id, "status": StepStatus::Error }),
                    )?;
                    return Err(self
                        .fail_terminal(&run_id, request.mode, started_at, steps_total, dispatch, err)
                        .await?);
                }
            };

            self.append(
                &run_id,
                EventType::StepCompleted,
                json!({ "step_id": step.step_id, "status": step_status }),
            )?;

            if cancel.load(Ordering::SeqCst) {
                let err = RouterError::operational(ErrorCode::Cancelled, "run cancelled at step boundary");
                return self
                    .abort_with_dispatch(&run_id, request.mode, started_at, steps_total, dispatch, err)
                    .await;
            }
        }

        // --- Terminal: Completed ---
        let duration_ms = started_at.elapsed().as_millis() as u64;
        let summary = Summary {
            adapter_id: adapter.adapter_id().to_string(),
            steps_total,
            steps_ok,
            steps_error,
            duration_ms,
        };
        self.append(
            &run_id,
            EventType::RunCompleted,
            json!({ "summary": summary }),
        )?;
        self.store
            .set_status(&run_id, RunStatus::Completed)
            .map_err(router_store::StoreError::into_router_error)?;
        info!(run_id = %run_id, steps_ok, steps_error, "run completed");

        let run = self
            .store
            .get_run(&run_id)
            .map_err(router_store::StoreError::into_router_error)?
            .ok_or_else(|| RouterError::bug(ErrorCode::BugError, "run vanished after completion"))?;

        Ok(Response {
            run,
            dispatch: Some(dispatch),
            summary,
            provenance: None,
            error: None,
        })
    }

    /// Write an event and translate a store failure into a bug error —
    /// by the rule that inside `EventStore`, any failure to append is a bug and
    /// propagates".
    fn append(
        &self,
        run_id: &str,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<Event, RouterError> {
        self.store
            .append(run_id, event_type, payload)
            .map_err(router_store::StoreError::into_router_error)
    }

    /// Fail the run before dispatch resolved (no [`DispatchInfo`] to echo).
    async fn abort(
        &self,
        run_id: &str,
        mode: Mode,
        started_at: Instant,
        steps_total: usize,
        err: RouterError,
    ) -> Result<Response, RouterError> {
        self.finish_failed(run_id, mode, started_at, steps_total, None, err)
    }

    /// Fail the run after dispatch resolved.
    async fn abort_with_dispatch(
        &self,
        run_id: &str,
        mode: Mode,
        started_at: Instant,
        steps_total: usize,
        dispatch: DispatchInfo,
        err: RouterError,
    ) -> Result<Response, RouterError> {
        self.finish_failed(run_id, mode, started_at, steps_total, Some(dispatch), err)
    }

    fn finish_failed(
        &self,
        run_id: &str,
        _mode: Mode,
        started_at: Instant,
        steps_total: usize,
        dispatch: Option<DispatchInfo>,
        err: RouterError,
    ) -> Result<Response, RouterError> {
        self.append(
            run_id,
            EventType::RunFailed,
            json!({ "error_code": err.code, "details": err.details }),
        )?;
        self.store
            .set_status(run_id, RunStatus::Failed)
            .map_err(router_store::StoreError::into_router_error)?;
        let run = self
            .store
            .get_run(run_id)
            .map_err(router_store::StoreError::into_router_error)?
            .ok_or_else(|| RouterError::bug(ErrorCode::BugError, "run vanished after failure"))?;

        let summary = Summary {
            adapter_id: dispatch
                .as_ref()
                .map(|d| d.adapter_id.clone())
                .unwrap_or_default(),
            steps_total,
            steps_ok: 0,
            steps_error: 0,
            duration_ms: started_at.elapsed().as_millis() as u64,
        };

        Ok(Response {
            run,
            dispatch,
            summary,
            provenance: None,
            error: Some(ErrorInfo {
                error_code: err.code,
                details: err.details,
            }),
        })
    }

    /// Terminate the run for a bug-class error and return it for
    /// re-raising: bugs are recorded then re-surfaced to
    /// the caller, never swallowed into an `Ok(Response)`.
    async fn fail_terminal(
        &self,
        run_id: &str,
        mode: Mode,
        started_at: Instant,
        steps_total: usize,
        dispatch: DispatchInfo,
        err: RouterError,
    ) -> Result<RouterError, RouterError> {
        self.finish_failed(run_id, mode, started_at, steps_total, Some(dispatch), err.clone())?;
        Ok(err)
    }
}

/// First capability in `required` that `held` lacks, if any.
fn first_missing_capability(held: &CapabilitySet, required: &CapabilitySet) -> Option<Capability> {
    required.iter().find(|c| !held.contains(*c)).copied()
}

/// First `step_id` in `plan` that appears more than once, if any.
fn first_duplicate_step_id(plan: &router_core::Plan) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    for step in plan {
        if !seen.insert(step.step_id.as_str()) {
            return Some(step.step_id.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_adapter::NullAdapter;
    use router_core::{Step, ToolCall};
    use router_store::StoreConfig;

    fn router() -> (Router, Arc<EventStore>) {
        let store = Arc::new(EventStore::open(":memory:", StoreConfig::default()).unwrap());
        let mut registry = AdapterRegistry::new("null");
        registry.register(Arc::new(NullAdapter::new("null")));
        (Router::new(store.clone(), Arc::new(registry)), store)
    }

    fn plan_step(step_id: &str) -> Step {
        Step {
            step_id: step_id.to_string(),
            intent: String::new(),
            call: ToolCall {
                tool: "t".to_string(),
                method: "m".to_string(),
                args: json!({}),
            },
        }
    }

    #[tokio::test]
    async fn unknown_adapter_fails_before_dispatch_selected() {
        let (router, store) = router();
        let mut request = Request {
            run_id: None,
            goal: "g".to_string(),
            mode: Mode::DryRun,
            policy: Default::default(),
            dispatch: DispatchOptions::default(),
            plan_override: vec![],
        };
        request.dispatch.adapter_id = Some("ghost".to_string());

        let response = router.run(request).await.unwrap();
        assert_eq!(response.error.unwrap().error_code, ErrorCode::UnknownAdapter);
        let events = store.iter_events(&response.run.run_id).unwrap();
        assert!(!events.iter().any(|e| e.event_type == EventType::DispatchSelected));
    }

    #[tokio::test]
    async fn max_steps_exceeded_fails_before_plan_created() {
        let (router, store) = router();
        let request = Request {
            run_id: None,
            goal: "g".to_string(),
            mode: Mode::DryRun,
            policy: router_policy::Policy {
                allow_apply: true,
                max_steps: Some(1),
            },
            dispatch: DispatchOptions::default(),
            plan_override: vec![plan_step("s1"), plan_step("s2")],
        };

        let response = router.run(request).await.unwrap();
        assert_eq!(
            response.error.unwrap().error_code,
            ErrorCode::MaxStepsExceeded
        );
        let events = store.iter_events(&response.run.run_id).unwrap();
        assert!(!events.iter().any(|e| e.event_type == EventType::PlanCreated));
    }

    #[tokio::test]
    async fn duplicate_step_id_is_a_bug() {
        let (router, _store) = router();
        let request = Request {
            run_id: None,
            goal: "g".to_string(),
            mode: Mode::DryRun,
            policy: Default::default(),
            dispatch: DispatchOptions::default(),
            plan_override: vec![plan_step("s1"), plan_step("s1")],
        };

        let err = router.run(request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BugError);
    }

    #[tokio::test]
    async fn cancellation_at_step_boundary_terminates_run() {
        let (router, store) = router();
        let cancel = Arc::new(AtomicBool::new(true));
        let request = Request {
            run_id: None,
            goal: "g".to_string(),
            mode: Mode::DryRun,
            policy: Default::default(),
            dispatch: DispatchOptions::default(),
            plan_override: vec![plan_step("s1"), plan_step("s2")],
        };

        let response = router.run_cancellable(request, cancel).await.unwrap();
        assert_eq!(response.error.unwrap().error_code, ErrorCode::Cancelled);
        let events = store.iter_events(&response.run.run_id).unwrap();
        // Only the first step should have run before cancellation took effect.
        let step_completed_count = events
            .iter()
            .filter(|e| e.event_type == EventType::StepCompleted)
            .count();
        assert_eq!(step_completed_count, 1);
    }
}
