//! router-store
//!
//! `SQLite`-backed, append-only persistence for runs and their event logs
//! A run's events are the single source of truth; `runs.status` is
//! a denormalized cache updated only by terminal-event writers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod store;

pub use config::{JournalMode, StoreConfig, SyncMode};
pub use error::StoreError;
pub use store::{EventStore, ListRunsFilter};
