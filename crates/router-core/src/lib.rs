//! router-core
//!
//! Stable contract types for the tool router.
//!
//! If you only take one dependency from this workspace, take this one: it
//! defines the [`Run`], [`Event`], [`Plan`]/[`Step`], [`Capability`], and the
//! unified [`RouterError`] taxonomy that every other crate in the workspace
//! builds on.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Capability set and related helpers.
pub mod capability;
/// Canonical JSON encoding and content digests.
pub mod digest;
/// Unified error taxonomy with stable error codes.
pub mod error;
/// Event types and the closed event-kind enum.
pub mod event;
/// Run, Plan, Step, and the request/response contract types.
pub mod model;

pub use capability::Capability;
pub use digest::{canonical_json, digest_of, sha256_hex, DigestError, Provenance};
pub use error::{ErrorCode, ErrorKind, RouterError};
pub use event::{Event, EventType};
pub use model::{
    Mode, Plan, Run, RunCounts, RunStatus, Step, StepStatus, ToolCall,
};

/// Current wire/contract version embedded in exported bundles.
pub const SCHEMA_VERSION: &str = "0.3";
