//! router-bundle
//!
//! Content-addressed export/import: a [`Bundle`] is the only
//! artifact needed to recreate a run in another store.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use router_core::digest::METHOD_ID;
use router_core::{digest_of, ErrorCode, Event, Provenance, Run, RouterError, SCHEMA_VERSION};
use router_store::{EventStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

/// Canonicalizable view of `(run, events)` used as the digest input.
///
/// A bare tuple would serialize as a JSON array; the digest input needs to
/// be an object with two named fields (`run`, then `events` in `seq`
/// order), so this wrapper exists purely to get that shape.
#[derive(Serialize)]
struct DigestPayload<'a> {
    run: &'a Run,
    events: &'a [Event],
}

/// Self-contained, portable snapshot of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Wire/contract version this bundle was produced under.
    pub schema_version: String,
    /// The run header.
    pub run: Run,
    /// The run's full event log, in `seq` order.
    pub events: Vec<Event>,
    /// Content digest, if requested at export time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

/// How [`import`] should resolve a `run_id` already present in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Fail with `RunExists` if the run is already present.
    RejectOnConflict,
    /// Allocate a fresh `run_id`, remapping every reference to the old one.
    NewRunId,
    /// Delete the existing run and its events, then insert the incoming ones.
    Overwrite,
}

/// Options controlling [`import`].
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Conflict resolution strategy.
    pub mode: ImportMode,
    /// Recompute and check the digest before inserting.
    pub verify_digest: bool,
    /// Replay the imported run and abort on any invariant violation.
    pub verify_replay: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mode: ImportMode::RejectOnConflict,
            verify_digest: true,
            verify_replay: true,
        }
    }
}

/// Compute the content digest over `(run, events)`.
///
/// # Errors
///
/// Returns a bug [`RouterError`] if canonicalization fails, which only
/// happens if `run` or an event payload cannot round-trip through JSON.
pub fn compute_digest(run: &Run, events: &[Event]) -> Result<Provenance, RouterError> {
    let payload = DigestPayload { run, events };
    let digest = digest_of(&payload)
        .map_err(|e| RouterError::bug(ErrorCode::BugError, format!("digest computation failed: {e}")))?;
    Ok(Provenance {
        digest,
        method_id: METHOD_ID.to_string(),
    })
}

/// Export `run_id` from `store` as a [`Bundle`].
///
/// Repeated exports of the same run produce byte-identical bundles (modulo
/// the `include_provenance` choice): the store's events are immutable and
/// read back in the same `seq` order every time.
///
/// # Errors
///
/// Returns [`ErrorCode::UnknownRun`] if the run does not exist, or a bug
/// error if the underlying store fails.
#[instrument(skip(store))]
pub fn export(store: &EventStore, run_id: &str, include_provenance: bool) -> Result<Bundle, RouterError> {
    let run = store
        .get_run(run_id)
        .map_err(StoreError::into_router_error)?
        .ok_or_else(|| {
            RouterError::operational(ErrorCode::UnknownRun, format!("unknown run: {run_id}"))
                .with_detail("run_id", run_id)
        })?;
    let events = store.iter_events(run_id).map_err(StoreError::into_router_error)?;

    let provenance = if include_provenance {
        Some(compute_digest(&run, &events)?)
    } else {
        None
    };

    Ok(Bundle {
        schema_version: SCHEMA_VERSION.to_string(),
        run,
        events,
        provenance,
    })
}

/// Import `bundle` into `store`, returning the run as finally persisted
/// (its `run_id` may differ from the bundle's under [`ImportMode::NewRunId`]).
///
/// Import is effectively transactional: every failure path returns before
/// any row is written, except a `verify_replay` failure, which runs after
/// the write and rolls it back by deleting what was just inserted, leaving
/// the store as it was before the call.
///
/// # Errors
///
/// - [`ErrorCode::DigestMismatch`] if `verify_digest` is set and the
///   recomputed digest disagrees with `bundle.provenance`.
/// - [`ErrorCode::RunExists`] under [`ImportMode::RejectOnConflict`] if the
///   run is already present.
/// - A bug error if `verify_replay` finds invariant violations, or if the
///   underlying store fails.
#[instrument(skip(store, bundle))]
pub fn import(store: &EventStore, bundle: Bundle, options: ImportOptions) -> Result<Run, RouterError> {
    if options.verify_digest {
        if let Some(ref provenance) = bundle.provenance {
            let recomputed = compute_digest(&bundle.run, &bundle.events)?;
            if recomputed.digest != provenance.digest {
                return Err(RouterError::operational(
                    ErrorCode::DigestMismatch,
                    "recomputed digest does not match the bundle's declared digest",
                )
                .with_detail("declared", provenance.digest.clone())
                .with_detail("recomputed", recomputed.digest));
            }
        }
    }

    let existing = store
        .get_run(&bundle.run.run_id)
        .map_err(StoreError::into_router_error)?;

    let (run, events) = match (options.mode, existing.is_some()) {
        (ImportMode::RejectOnConflict, true) => {
            return Err(RouterError::operational(
                ErrorCode::RunExists,
                format!("run already exists: {}", bundle.run.run_id),
            )
            .with_detail("run_id", bundle.run.run_id.clone()));
        }
        (ImportMode::RejectOnConflict, false) => (bundle.run, bundle.events),
        (ImportMode::Overwrite, true) => {
            store
                .delete_run(&bundle.run.run_id)
                .map_err(StoreError::into_router_error)?;
            (bundle.run, bundle.events)
        }
        (ImportMode::Overwrite, false) => (bundle.run, bundle.events),
        (ImportMode::NewRunId, _) => remap_run_id(bundle.run, bundle.events),
    };

    store
        .import_run(&run, &events)
        .map_err(StoreError::into_router_error)?;

    if options.verify_replay {
        let result = router_replay::replay(&run.run_id, &events, true);
        if !result.ok {
            store
                .delete_run(&run.run_id)
                .map_err(StoreError::into_router_error)?;
            return Err(RouterError::bug(
                ErrorCode::BugError,
                "imported run failed replay invariant checks",
            )
            .with_detail(
                "violations",
                result
                    .violations
                    .iter()
                    .map(|v| v.code.clone())
                    .collect::<Vec<_>>(),
            ));
        }
    }

    Ok(run)
}

/// Rewrite `run.run_id` to a freshly allocated id, propagating the change
/// into every event's `run_id`, any nested occurrence of the old id inside
/// event payloads, and allocating fresh `event_id`s.
fn remap_run_id(mut run: Run, mut events: Vec<Event>) -> (Run, Vec<Event>) {
    let old_id = run.run_id.clone();
    let new_id = Uuid::new_v4().to_string();
    run.run_id = new_id.clone();

    for event in &mut events {
        event.run_id = new_id.clone();
        event.event_id = Uuid::new_v4();
        remap_string_in_value(&mut event.payload, &old_id, &new_id);
    }

    (run, events)
}

/// Recursively replace every JSON string value equal to `old` with `new`.
fn remap_string_in_value(value: &mut serde_json::Value, old: &str, new: &str) {
    match value {
        serde_json::Value::String(s) if s == old => *s = new.to_string(),
        serde_json::Value::Array(items) => {
            for item in items {
                remap_string_in_value(item, old, new);
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values_mut() {
                remap_string_in_value(v, old, new);
            }
        }
        _ => {}
    }
}
