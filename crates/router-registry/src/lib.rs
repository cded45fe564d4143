//! router-registry
//!
//! Typed wrapper around named [`Adapter`] instances. No process-wide
//! registries: the host constructs a [`AdapterRegistry`] explicitly and
//! hands it to the router. Registration is not observable across
//! `AdapterRegistry` instances.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use router_adapter::Adapter;
use router_core::capability::Capability;
use router_core::{ErrorCode, RouterError};
use std::collections::HashMap;
use std::sync::Arc;

/// Summary of a registered adapter, as returned by [`AdapterRegistry::list_adapters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    /// The adapter's id.
    pub adapter_id: String,
    /// The adapter's kind.
    pub adapter_kind: String,
    /// The adapter's declared capabilities, sorted.
    pub capabilities: Vec<Capability>,
}

/// Named lookup table of [`Adapter`] instances plus a default id.
///
/// # Invariants
///
/// - The default id must be registered for [`AdapterRegistry::get_default`]
///   to succeed.
/// - An id cannot be registered twice with a different instance (the second
///   `register` call for an existing id simply replaces it — matching the
///   host's intent of "this is now the adapter for this id").
/// - Registration is never observable across `AdapterRegistry` instances:
///   there is no process-wide state here.
pub struct AdapterRegistry {
    default_adapter_id: String,
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Construct an empty registry with the given default adapter id.
    ///
    /// The default id need not be registered yet; [`get_default`](Self::get_default)
    /// only fails once called if it is still unregistered at that point.
    #[must_use]
    pub fn new(default_adapter_id: impl Into<String>) -> Self {
        Self {
            default_adapter_id: default_adapter_id.into(),
            adapters: HashMap::new(),
        }
    }

    /// Legacy single-adapter construction path: wraps one adapter
    /// into a registry where it is both the sole entry and the default.
    #[must_use]
    pub fn from_single(adapter: Arc<dyn Adapter>) -> Self {
        let id = adapter.adapter_id().to_string();
        let mut registry = Self::new(id.clone());
        registry.adapters.insert(id, adapter);
        registry
    }

    /// Register an adapter, replacing any existing entry under the same id.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters
            .insert(adapter.adapter_id().to_string(), adapter);
    }

    /// Look up an adapter by id.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::UnknownAdapter`] if no adapter is registered
    /// under `id`.
    pub fn get(&self, id: &str) -> Result<Arc<dyn Adapter>, RouterError> {
        self.adapters.get(id).cloned().ok_or_else(|| {
            RouterError::operational(ErrorCode::UnknownAdapter, format!("unknown adapter: {id}"))
                .with_detail("adapter_id", id)
        })
    }

    /// Resolve the registry's default adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::UnknownAdapter`] if the default id is not
    /// registered.
    pub fn get_default(&self) -> Result<Arc<dyn Adapter>, RouterError> {
        self.get(&self.default_adapter_id)
    }

    /// The configured default adapter id (regardless of registration status).
    #[must_use]
    pub fn default_adapter_id(&self) -> &str {
        &self.default_adapter_id
    }

    /// Sorted list of registered adapter ids.
    #[must_use]
    pub fn list_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted (by id) summaries of every registered adapter.
    #[must_use]
    pub fn list_adapters(&self) -> Vec<AdapterSummary> {
        let mut summaries: Vec<AdapterSummary> = self
            .adapters
            .values()
            .map(|a| AdapterSummary {
                adapter_id: a.adapter_id().to_string(),
                adapter_kind: a.adapter_kind().to_string(),
                capabilities: a.capabilities().iter().copied().collect(),
            })
            .collect();
        summaries.sort_by(|a, b| a.adapter_id.cmp(&b.adapter_id));
        summaries
    }

    /// Sorted ids of adapters that declare `capability`.
    #[must_use]
    pub fn find_by_capability(&self, capability: Capability) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .adapters
            .iter()
            .filter(|(_, a)| a.capabilities().contains(&capability))
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// `true` if the named adapter is registered and declares `capability`.
    #[must_use]
    pub fn has_capability(&self, id: &str, capability: Capability) -> bool {
        self.adapters
            .get(id)
            .is_some_and(|a| a.capabilities().contains(&capability))
    }

    /// Assert the named adapter declares `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::UnknownAdapter`] if `id` is not registered, or
    /// [`ErrorCode::CapabilityMissing`] if it is registered but lacks the
    /// capability.
    pub fn require_capability(&self, id: &str, capability: Capability) -> Result<(), RouterError> {
        let adapter = self.get(id)?;
        if adapter.capabilities().contains(&capability) {
            return Ok(());
        }
        Err(RouterError::operational(
            ErrorCode::CapabilityMissing,
            format!("adapter '{id}' does not declare capability '{capability}'"),
        )
        .with_detail("required_capability", capability.as_str())
        .with_detail(
            "adapter_capabilities",
            adapter
                .capabilities()
                .iter()
                .map(Capability::as_str)
                .collect::<Vec<_>>(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_adapter::NullAdapter;
    use std::sync::Arc;

    fn null(id: &str) -> Arc<dyn Adapter> {
        Arc::new(NullAdapter::new(id))
    }

    #[test]
    fn get_default_fails_if_unregistered() {
        let registry = AdapterRegistry::new("missing");
        let err = match registry.get_default() {
            Ok(_) => panic!("expected get_default to fail"),
            Err(err) => err,
        };
        assert_eq!(err.code, ErrorCode::UnknownAdapter);
    }

    #[test]
    fn get_default_succeeds_once_registered() {
        let mut registry = AdapterRegistry::new("null");
        registry.register(null("null"));
        assert_eq!(registry.get_default().unwrap().adapter_id(), "null");
    }

    #[test]
    fn from_single_wraps_one_adapter_as_default() {
        let registry = AdapterRegistry::from_single(null("solo"));
        assert_eq!(registry.get_default().unwrap().adapter_id(), "solo");
        assert_eq!(registry.list_ids(), vec!["solo"]);
    }

    #[test]
    fn registries_do_not_share_state() {
        let mut a = AdapterRegistry::new("x");
        a.register(null("x"));
        let b = AdapterRegistry::new("x");
        assert!(a.get("x").is_ok());
        assert!(b.get("x").is_err());
    }

    #[test]
    fn require_capability_distinguishes_unknown_from_missing() {
        let mut registry = AdapterRegistry::new("null");
        registry.register(null("null"));
        let err = registry
            .require_capability("null", Capability::Apply)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CapabilityMissing);

        let err = registry
            .require_capability("ghost", Capability::Apply)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownAdapter);
    }

    #[test]
    fn find_by_capability_is_sorted() {
        let mut registry = AdapterRegistry::new("a");
        registry.register(null("b"));
        registry.register(null("a"));
        assert_eq!(
            registry.find_by_capability(Capability::DryRun),
            vec!["a", "b"]
        );
    }
}
