//! The `null` adapter: `dry_run`-only, deterministic placeholder results.

use crate::Adapter;
use async_trait::async_trait;
use router_core::capability::{Capability, CapabilitySet};
use router_core::RouterError;
use serde_json::json;

/// Adapter with `capabilities = {dry_run}`; `call` always returns a
/// deterministic placeholder and never touches the outside world.
#[derive(Debug, Clone)]
pub struct NullAdapter {
    id: String,
    capabilities: CapabilitySet,
}

impl NullAdapter {
    /// Construct a null adapter with the given `adapter_id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let mut capabilities = CapabilitySet::new();
        capabilities.insert(Capability::DryRun);
        Self {
            id: id.into(),
            capabilities,
        }
    }
}

impl Default for NullAdapter {
    fn default() -> Self {
        Self::new("null")
    }
}

#[async_trait]
impl Adapter for NullAdapter {
    fn adapter_id(&self) -> &str {
        &self.id
    }

    fn adapter_kind(&self) -> &str {
        "null"
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    async fn call(
        &self,
        _tool: &str,
        _method: &str,
        _args: &serde_json::Value,
    ) -> Result<serde_json::Value, RouterError> {
        Ok(json!({"ok": true, "simulated": true}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_is_a_deterministic_placeholder() {
        let adapter = NullAdapter::default();
        let a = adapter.call("t", "m", &json!({})).await.unwrap();
        let b = adapter.call("t", "m", &json!({"x": 1})).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, json!({"ok": true, "simulated": true}));
    }

    #[test]
    fn capabilities_are_dry_run_only() {
        let adapter = NullAdapter::default();
        assert!(adapter.capabilities().contains(&Capability::DryRun));
        assert!(!adapter.capabilities().contains(&Capability::Apply));
    }
}
