//! Store-specific errors and their conversion into the unified taxonomy.

use router_core::{ErrorCode, RouterError};

/// Errors from [`crate::EventStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `create_run` targeted an already-existing `run_id`.
    #[error("run already exists: {0}")]
    RunExists(String),

    /// A concurrent writer advanced the run's sequence first.
    #[error("sequence conflict for run {run_id} at seq {seq}")]
    SequenceConflict {
        /// The run in conflict.
        run_id: String,
        /// The sequence number that was contended.
        seq: u64,
    },

    /// The requested run does not exist.
    #[error("unknown run: {0}")]
    UnknownRun(String),

    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Db(#[from] rusqlite::Error),

    /// Payload could not be serialized or deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// A failed `append`/`create_run`/etc. is always an unexpected,
    /// run-terminating condition from the router's point of view — the
    /// store itself has no concept of "operational vs. bug", but every
    /// failure here maps onto [`router_core::ErrorKind::Bug`] except the
    /// two well-known conflict cases, which are operational (the caller
    /// can legitimately retry under a fresh run id or wait).
    #[must_use]
    pub fn into_router_error(self) -> RouterError {
        match self {
            Self::RunExists(id) => {
                RouterError::operational(ErrorCode::RunExists, format!("run already exists: {id}"))
                    .with_detail("run_id", id)
            }
            Self::SequenceConflict { run_id, seq } => RouterError::operational(
                ErrorCode::SequenceConflict,
                format!("sequence conflict for run {run_id} at seq {seq}"),
            )
            .with_detail("run_id", run_id)
            .with_detail("seq", seq),
            Self::UnknownRun(id) => {
                RouterError::operational(ErrorCode::UnknownRun, format!("unknown run: {id}"))
                    .with_detail("run_id", id)
            }
            other => RouterError::bug(ErrorCode::BugError, other.to_string()),
        }
    }
}
