//! The `fake` adapter: configurable per-`(tool, method)` responses, used to
//! assert on invocation behavior in test suites (including this workspace's
//! own property tests).

use crate::Adapter;
use async_trait::async_trait;
use router_core::capability::{Capability, CapabilitySet};
use router_core::{ErrorCode, RouterError};
use std::collections::HashMap;
use std::sync::Mutex;

/// A recorded invocation of [`FakeAdapter::call`].
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Tool name.
    pub tool: String,
    /// Method name.
    pub method: String,
    /// Arguments passed.
    pub args: serde_json::Value,
}

/// Configured outcome for a `(tool, method)` key.
#[derive(Debug, Clone)]
enum Response {
    Success(serde_json::Value),
    Failure(RouterError),
}

/// Adapter with `capabilities = {dry_run, apply}` whose responses are
/// configured ahead of time by `(tool, method)`. Every call is recorded so
/// tests can assert on exactly what the router dispatched.
#[derive(Debug)]
pub struct FakeAdapter {
    id: String,
    capabilities: CapabilitySet,
    responses: Mutex<HashMap<(String, String), Response>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl FakeAdapter {
    /// Construct a fake adapter with the given `adapter_id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let mut capabilities = CapabilitySet::new();
        capabilities.insert(Capability::DryRun);
        capabilities.insert(Capability::Apply);
        Self {
            id: id.into(),
            capabilities,
            responses: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Configure a successful response for `(tool, method)`.
    pub fn set_success(&self, tool: &str, method: &str, output: serde_json::Value) {
        self.responses.lock().unwrap().insert(
            (tool.to_string(), method.to_string()),
            Response::Success(output),
        );
    }

    /// Configure a failing response for `(tool, method)`.
    pub fn set_failure(&self, tool: &str, method: &str, error: RouterError) {
        self.responses.lock().unwrap().insert(
            (tool.to_string(), method.to_string()),
            Response::Failure(error),
        );
    }

    /// Snapshot of every call made to this adapter, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Number of calls made so far. Used by the "dry_run never invokes the
    /// adapter" property.
    #[must_use]
    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

#[async_trait]
impl Adapter for FakeAdapter {
    fn adapter_id(&self) -> &str {
        &self.id
    }

    fn adapter_kind(&self) -> &str {
        "fake"
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    async fn call(
        &self,
        tool: &str,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, RouterError> {
        self.invocations.lock().unwrap().push(Invocation {
            tool: tool.to_string(),
            method: method.to_string(),
            args: args.clone(),
        });

        let key = (tool.to_string(), method.to_string());
        match self.responses.lock().unwrap().get(&key) {
            Some(Response::Success(v)) => Ok(v.clone()),
            Some(Response::Failure(e)) => Err(e.clone()),
            None => Err(RouterError::operational(
                ErrorCode::Other("FAKE_RESPONSE_UNCONFIGURED".to_string()),
                format!("no configured response for {tool}.{method}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_every_invocation() {
        let adapter = FakeAdapter::new("fake");
        adapter.set_success("t", "m", json!({"ok": true}));
        adapter.call("t", "m", &json!({"x": 1})).await.unwrap();
        adapter.call("t", "m", &json!({"x": 2})).await.unwrap();
        assert_eq!(adapter.invocation_count(), 2);
        assert_eq!(adapter.invocations()[1].args, json!({"x": 2}));
    }

    #[tokio::test]
    async fn returns_configured_failure() {
        let adapter = FakeAdapter::new("fake");
        adapter.set_failure(
            "t",
            "m",
            RouterError::operational(ErrorCode::Timeout, "slow"),
        );
        let err = adapter.call("t", "m", &json!({})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn unconfigured_call_fails_operationally() {
        let adapter = FakeAdapter::new("fake");
        let err = adapter.call("t", "m", &json!({})).await.unwrap_err();
        assert!(!err.is_terminal());
    }
}
