//! tool-router
//!
//! Event-sourced orchestration of declarative tool-call plans through
//! pluggable, capability-governed adapters. This crate is a thin facade:
//! it re-exports the workspace's member crates so a caller can depend on
//! one name and pull the core contract types, the policy gate, the event
//! store, the orchestration engine, the replay/invariant checker, and the
//! export/import bundle format together.
//!
//! A typical embedding wires these together as:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tool_router::adapter::NullAdapter;
//! use tool_router::core::Mode;
//! use tool_router::engine::{Request, Router};
//! use tool_router::registry::AdapterRegistry;
//! use tool_router::store::{EventStore, StoreConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(EventStore::open(":memory:", StoreConfig::default())?);
//! let mut registry = AdapterRegistry::new("null");
//! registry.register(Arc::new(NullAdapter::new("null")));
//! let router = Router::new(store, Arc::new(registry));
//!
//! let response = router
//!     .run(Request {
//!         run_id: None,
//!         goal: "demo".to_string(),
//!         mode: Mode::DryRun,
//!         policy: Default::default(),
//!         dispatch: Default::default(),
//!         plan_override: vec![],
//!     })
//!     .await?;
//! assert_eq!(response.summary.steps_total, 0);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Stable contract types: [`core::Run`], [`core::Event`], capabilities, and the error taxonomy.
pub use router_core as core;
/// The adapter protocol and built-in executors.
pub use router_adapter as adapter;
/// Content-addressed export/import bundles.
pub use router_bundle as bundle;
/// The run orchestration state machine.
pub use router_engine as engine;
/// The authorization gate.
pub use router_policy as policy;
/// Named adapter lookup.
pub use router_registry as registry;
/// Replay and invariant checking.
pub use router_replay as replay;
/// The SQLite-backed event store.
pub use router_store as store;
