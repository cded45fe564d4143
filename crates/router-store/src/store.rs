//! The `SQLite`-backed event store.

use crate::config::StoreConfig;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use router_core::event::EventType;
use router_core::model::{Mode, Run, RunCounts, RunStatus};
use router_core::Event;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;
use tracing::{debug, instrument};

const SCHEMA_VERSION: i64 = 1;

/// Filter for [`EventStore::list_runs`].
#[derive(Debug, Clone, Default)]
pub struct ListRunsFilter {
    /// Restrict to runs with this status.
    pub status: Option<RunStatus>,
    /// Restrict to runs created at or after this timestamp (inclusive).
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of runs to return.
    pub limit: Option<usize>,
    /// Number of matching runs to skip before collecting `limit`.
    pub offset: usize,
}

/// Append-only, single-writer-per-run persistence for [`Event`]s and [`Run`]s.
///
/// `":memory:"` denotes an ephemeral, process-local store. Concurrent
/// readers are always safe; concurrent writers to *different* `run_id`s may
/// proceed independently, but this type serializes all access behind one
/// connection mutex, matching a "single writer per run_id, concurrent
/// readers allowed" model at the conservative end (one physical connection
/// is simplest to reason about and SQLite itself serializes writers to a
/// single file regardless).
pub struct EventStore {
    conn: Mutex<Connection>,
}

impl EventStore {
    /// Open (creating if necessary) the store at `path`, or an ephemeral
    /// in-memory store if `path == ":memory:"`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] if the connection cannot be opened or the
    /// schema cannot be initialized.
    #[instrument(skip(config))]
    pub fn open(path: &str, config: StoreConfig) -> Result<Self, StoreError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        apply_pragmas(&conn, &config)?;
        initialize_schema(&conn)?;
        debug!(path, "event store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new run row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RunExists`] if `run_id` is already present.
    pub fn create_run(
        &self,
        run_id: &str,
        goal: &str,
        mode: Mode,
        ts: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT run_id FROM runs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::RunExists(run_id.to_string()));
        }
        conn.execute(
            "INSERT INTO runs (run_id, goal, mode, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                goal,
                mode_to_str(mode),
                status_to_str(RunStatus::Running),
                ts.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Append a new event to `run_id`, assigning the next contiguous `seq`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownRun`] if the run does not exist, or
    /// [`StoreError::SequenceConflict`] if a concurrent writer raced to
    /// claim the same `seq`.
    pub fn append(
        &self,
        run_id: &str,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<Event, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let run_exists: Option<String> = tx
            .query_row(
                "SELECT run_id FROM runs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        if run_exists.is_none() {
            return Err(StoreError::UnknownRun(run_id.to_string()));
        }

        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM events WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;

        let event_id = Uuid::new_v4();
        let ts = Utc::now();
        let payload_json = serde_json::to_string(&payload)?;

        let insert = tx.execute(
            "INSERT INTO events (event_id, run_id, seq, type, ts, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event_id.to_string(),
                run_id,
                next_seq,
                event_type.as_str(),
                ts.to_rfc3339(),
                payload_json,
            ],
        );

        match insert {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::SequenceConflict {
                    run_id: run_id.to_string(),
                    seq: next_seq as u64,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit()?;

        Ok(Event {
            event_id,
            run_id: run_id.to_string(),
            seq: next_seq as u64,
            event_type,
            ts,
            payload,
        })
    }

    /// Update a run's status. Idempotent for equal values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownRun`] if the run does not exist.
    pub fn set_status(&self, run_id: &str, status: RunStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE runs SET status = ?1 WHERE run_id = ?2",
            params![status_to_str(status), run_id],
        )?;
        if rows == 0 {
            return Err(StoreError::UnknownRun(run_id.to_string()));
        }
        Ok(())
    }

    /// Fetch a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on an underlying `SQLite` failure; a
    /// missing run is represented by `Ok(None)`, not an error.
    pub fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let run = conn
            .query_row(
                "SELECT run_id, goal, mode, status, created_at FROM runs WHERE run_id = ?1",
                params![run_id],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    /// Ordered (by `seq`) events for a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on an underlying `SQLite` failure.
    pub fn iter_events(&self, run_id: &str) -> Result<Vec<Event>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT event_id, run_id, seq, type, ts, payload_json
             FROM events WHERE run_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert a run and its full event log in one transaction, preserving
    /// the original `seq`, `event_id`, and `ts` of every event. Used by
    /// import, which has already decided the final shape of the
    /// data (including any `run_id`/`event_id` remapping) before calling
    /// this.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RunExists`] if `run.run_id` is already present.
    pub fn import_run(&self, run: &Run, events: &[Event]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT run_id FROM runs WHERE run_id = ?1",
                params![run.run_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::RunExists(run.run_id.clone()));
        }

        tx.execute(
            "INSERT INTO runs (run_id, goal, mode, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.run_id,
                run.goal,
                mode_to_str(run.mode),
                status_to_str(run.status),
                run.created_at.to_rfc3339(),
            ],
        )?;

        for event in events {
            let payload_json = serde_json::to_string(&event.payload)?;
            tx.execute(
                "INSERT INTO events (event_id, run_id, seq, type, ts, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.event_id.to_string(),
                    event.run_id,
                    event.seq as i64,
                    event.event_type.as_str(),
                    event.ts.to_rfc3339(),
                    payload_json,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete a run and all of its events. Used by import's `overwrite`
    /// conflict mode; a no-op (not an error) if the run does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on an underlying `SQLite` failure.
    pub fn delete_run(&self, run_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM events WHERE run_id = ?1", params![run_id])?;
        tx.execute("DELETE FROM runs WHERE run_id = ?1", params![run_id])?;
        tx.commit()?;
        Ok(())
    }

    /// List runs matching `filter`, plus aggregate counts across the
    /// *entire* matching set (before `limit`/`offset` are applied).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on an underlying `SQLite` failure.
    pub fn list_runs(&self, filter: &ListRunsFilter) -> Result<(Vec<Run>, RunCounts), StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut where_clauses = Vec::new();
        let mut bind_status = None;
        let mut bind_since = None;
        if let Some(status) = filter.status {
            where_clauses.push("status = ?");
            bind_status = Some(status_to_str(status).to_string());
        }
        if let Some(since) = filter.since {
            where_clauses.push("created_at >= ?");
            bind_since = Some(since.to_rfc3339());
        }
        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let mut binds: Vec<&dyn rusqlite::ToSql> = Vec::new();
        if let Some(ref s) = bind_status {
            binds.push(s);
        }
        if let Some(ref s) = bind_since {
            binds.push(s);
        }

        let select_sql = format!(
            "SELECT run_id, goal, mode, status, created_at FROM runs {where_sql}
             ORDER BY created_at ASC, run_id ASC
             LIMIT ?{} OFFSET ?{}",
            binds.len() + 1,
            binds.len() + 2,
        );
        let limit = filter.limit.map_or(i64::MAX, |l| l as i64);
        let offset = filter.offset as i64;
        binds.push(&limit);
        binds.push(&offset);

        let mut stmt = conn.prepare(&select_sql)?;
        let runs = stmt
            .query_map(binds.as_slice(), row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;

        let count_sql = format!("SELECT status, COUNT(*) FROM runs {where_sql} GROUP BY status");
        let count_binds = &binds[..binds.len() - 2];
        let mut count_stmt = conn.prepare(&count_sql)?;
        let mut counts = RunCounts::default();
        let rows = count_stmt.query_map(count_binds, |row| {
            let status: String = row.get(0)?;
            let n: i64 = row.get(1)?;
            Ok((status, n as usize))
        })?;
        for row in rows {
            let (status, n) = row?;
            counts.total += n;
            match status.as_str() {
                "completed" => counts.completed = n,
                "failed" => counts.failed = n,
                "running" => counts.running = n,
                _ => {}
            }
        }

        Ok((runs, counts))
    }
}

fn apply_pragmas(conn: &Connection, config: &StoreConfig) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        config.journal_mode.pragma_value()
    ))?;
    conn.execute_batch(&format!(
        "PRAGMA synchronous = {};",
        config.sync_mode.pragma_value()
    ))?;
    conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);
         INSERT INTO store_meta (version)
            SELECT {SCHEMA_VERSION} WHERE NOT EXISTS (SELECT 1 FROM store_meta);

         CREATE TABLE IF NOT EXISTS runs (
             run_id TEXT PRIMARY KEY,
             goal TEXT NOT NULL,
             mode TEXT NOT NULL,
             status TEXT NOT NULL,
             created_at TEXT NOT NULL
         );

         CREATE TABLE IF NOT EXISTS events (
             event_id TEXT PRIMARY KEY,
             run_id TEXT NOT NULL REFERENCES runs(run_id),
             seq INTEGER NOT NULL,
             type TEXT NOT NULL,
             ts TEXT NOT NULL,
             payload_json TEXT NOT NULL,
             UNIQUE(run_id, seq)
         );

         CREATE INDEX IF NOT EXISTS idx_events_run_id ON events(run_id);"
    ))?;
    Ok(())
}

fn mode_to_str(mode: Mode) -> &'static str {
    match mode {
        Mode::DryRun => "dry_run",
        Mode::Apply => "apply",
    }
}

fn mode_from_str(s: &str) -> rusqlite::Result<Mode> {
    match s {
        "dry_run" => Ok(Mode::DryRun),
        "apply" => Ok(Mode::Apply),
        other => Err(rusqlite::Error::InvalidColumnType(
            0,
            format!("unknown mode: {other}"),
            rusqlite::types::Type::Text,
        )),
    }
}

fn status_to_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> rusqlite::Result<RunStatus> {
    match s {
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "failed" => Ok(RunStatus::Failed),
        other => Err(rusqlite::Error::InvalidColumnType(
            0,
            format!("unknown status: {other}"),
            rusqlite::types::Type::Text,
        )),
    }
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<Run> {
    let run_id: String = row.get(0)?;
    let goal: String = row.get(1)?;
    let mode: String = row.get(2)?;
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(Run {
        run_id,
        goal,
        mode: mode_from_str(&mode)?,
        status: status_from_str(&status)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::InvalidColumnType(4, e.to_string(), rusqlite::types::Type::Text)
            })?,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let event_id: String = row.get(0)?;
    let run_id: String = row.get(1)?;
    let seq: i64 = row.get(2)?;
    let event_type: String = row.get(3)?;
    let ts: String = row.get(4)?;
    let payload_json: String = row.get(5)?;
    Ok(Event {
        event_id: Uuid::from_str(&event_id).map_err(|e| {
            rusqlite::Error::InvalidColumnType(0, e.to_string(), rusqlite::types::Type::Text)
        })?,
        run_id,
        seq: seq as u64,
        event_type: event_type_from_str(&event_type).map_err(|e| {
            rusqlite::Error::InvalidColumnType(3, e.to_string(), rusqlite::types::Type::Text)
        })?,
        ts: DateTime::parse_from_rfc3339(&ts)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::InvalidColumnType(4, e.to_string(), rusqlite::types::Type::Text)
            })?,
        payload: serde_json::from_str(&payload_json).map_err(|e| {
            rusqlite::Error::InvalidColumnType(5, e.to_string(), rusqlite::types::Type::Text)
        })?,
    })
}

fn event_type_from_str(s: &str) -> Result<EventType, String> {
    Ok(match s {
        "RUN_STARTED" => EventType::RunStarted,
        "DISPATCH_SELECTED" => EventType::DispatchSelected,
        "PLAN_CREATED" => EventType::PlanCreated,
        "STEP_STARTED" => EventType::StepStarted,
        "TOOL_CALL_REQUESTED" => EventType::ToolCallRequested,
        "TOOL_CALL_SUCCEEDED" => EventType::ToolCallSucceeded,
        "TOOL_CALL_FAILED" => EventType::ToolCallFailed,
        "STEP_COMPLETED" => EventType::StepCompleted,
        "RUN_COMPLETED" => EventType::RunCompleted,
        "RUN_FAILED" => EventType::RunFailed,
        other => return Err(format!("unknown event type: {other}")),
    })
}
