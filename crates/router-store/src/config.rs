//! Durability configuration for the event store.
//!
//! A `journal_mode`, a `synchronous` level, and a busy-timeout — the usual
//! knobs for a WAL-backed SQLite store.

/// `SQLite` journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// Write-ahead log. Required for crash-consistent concurrent readers.
    #[default]
    Wal,
    /// Classic rollback-journal mode.
    Delete,
}

impl JournalMode {
    pub(crate) fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` synchronous level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Full `fsync` on every commit (safest, slowest).
    Full,
    /// `fsync` less aggressively; safe under WAL.
    #[default]
    Normal,
}

impl SyncMode {
    pub(crate) fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Durability knobs for [`crate::EventStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Journal mode pragma.
    pub journal_mode: JournalMode,
    /// Synchronous pragma.
    pub sync_mode: SyncMode,
    /// Busy-timeout in milliseconds before a lock contention error surfaces.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            sync_mode: SyncMode::Normal,
            busy_timeout_ms: 5_000,
        }
    }
}
