//! Unified error taxonomy with stable error codes.
//!
//! Every router error carries an [`ErrorKind`] (operational vs. bug), a
//! stable [`ErrorCode`], a human-readable message, and a structured
//! `details` bag. This mirrors a two-kind taxonomy: operational
//! errors are recoverable at step scope and do not by themselves terminate
//! a run; bug errors are unexpected, terminate the run, and re-surface to
//! the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a [`RouterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Expected, recoverable failure. Recorded, reported, does not by
    /// itself terminate the run.
    Operational,
    /// Unexpected failure or invariant violation. Recorded, re-raised,
    /// terminates the run.
    Bug,
}

/// Stable, machine-readable error code.
///
/// Each variant serializes to its `SCREAMING_SNAKE_CASE` name.
/// [`ErrorCode::Other`] is a caller-defined escape hatch for bug errors
/// only; it (de)serializes as the bare custom string rather than a wrapped
/// object, so the wire shape of `ErrorCode` is always a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// Adapter call exceeded its configured timeout.
    Timeout,
    /// Subprocess adapter exited with a non-zero status.
    NonzeroExit,
    /// Remote/subprocess output could not be parsed as JSON.
    InvalidJsonOutput,
    /// The adapter's base command could not be found.
    CommandNotFound,
    /// The operating system denied the operation.
    PermissionDenied,
    /// The configured working directory does not exist.
    CwdNotFound,
    /// The configured working directory is not a directory.
    CwdNotDirectory,
    /// The adapter's environment configuration is invalid.
    EnvInvalid,
    /// A network connection could not be established.
    ConnectionFailed,
    /// An HTTP adapter received an error status.
    HttpError,
    /// The adapter lacks a capability the caller required.
    CapabilityMissing,
    /// The requested adapter id is not registered.
    UnknownAdapter,
    /// Policy denied an `apply`-mode run.
    PolicyDenied,
    /// The plan exceeds the policy's step ceiling.
    MaxStepsExceeded,
    /// An invariant violation or unexpected exception.
    BugError,
    /// An unclassified exception.
    UnknownError,
    /// The run was cancelled at a step boundary.
    Cancelled,
    /// An imported bundle's declared digest did not match the recomputed one.
    DigestMismatch,
    /// `create_run` targeted a `run_id` that already exists.
    RunExists,
    /// Two writers raced to extend the same run's sequence.
    SequenceConflict,
    /// The requested run does not exist in the store.
    UnknownRun,
    /// The caller mixed incompatible configuration (e.g. both legacy
    /// single-adapter and registry construction).
    ConfigError,
    /// Caller-defined bug code, permitted only for [`ErrorKind::Bug`].
    Other(String),
}

impl ErrorCode {
    /// Stable string form, matching the wire representation.
    #[must_use]
    pub fn as_str(&self) -> std::borrow::Cow<'static, str> {
        use std::borrow::Cow;
        match self {
            Self::Timeout => Cow::Borrowed("TIMEOUT"),
            Self::NonzeroExit => Cow::Borrowed("NONZERO_EXIT"),
            Self::InvalidJsonOutput => Cow::Borrowed("INVALID_JSON_OUTPUT"),
            Self::CommandNotFound => Cow::Borrowed("COMMAND_NOT_FOUND"),
            Self::PermissionDenied => Cow::Borrowed("PERMISSION_DENIED"),
            Self::CwdNotFound => Cow::Borrowed("CWD_NOT_FOUND"),
            Self::CwdNotDirectory => Cow::Borrowed("CWD_NOT_DIRECTORY"),
            Self::EnvInvalid => Cow::Borrowed("ENV_INVALID"),
            Self::ConnectionFailed => Cow::Borrowed("CONNECTION_FAILED"),
            Self::HttpError => Cow::Borrowed("HTTP_ERROR"),
            Self::CapabilityMissing => Cow::Borrowed("CAPABILITY_MISSING"),
            Self::UnknownAdapter => Cow::Borrowed("UNKNOWN_ADAPTER"),
            Self::PolicyDenied => Cow::Borrowed("POLICY_DENIED"),
            Self::MaxStepsExceeded => Cow::Borrowed("MAX_STEPS_EXCEEDED"),
            Self::BugError => Cow::Borrowed("BUG_ERROR"),
            Self::UnknownError => Cow::Borrowed("UNKNOWN_ERROR"),
            Self::Cancelled => Cow::Borrowed("CANCELLED"),
            Self::DigestMismatch => Cow::Borrowed("DIGEST_MISMATCH"),
            Self::RunExists => Cow::Borrowed("RUN_EXISTS"),
            Self::SequenceConflict => Cow::Borrowed("SEQUENCE_CONFLICT"),
            Self::UnknownRun => Cow::Borrowed("UNKNOWN_RUN"),
            Self::ConfigError => Cow::Borrowed("CONFIG_ERROR"),
            Self::Other(s) => Cow::Owned(s.clone()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "TIMEOUT" => Self::Timeout,
            "NONZERO_EXIT" => Self::NonzeroExit,
            "INVALID_JSON_OUTPUT" => Self::InvalidJsonOutput,
            "COMMAND_NOT_FOUND" => Self::CommandNotFound,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "CWD_NOT_FOUND" => Self::CwdNotFound,
            "CWD_NOT_DIRECTORY" => Self::CwdNotDirectory,
            "ENV_INVALID" => Self::EnvInvalid,
            "CONNECTION_FAILED" => Self::ConnectionFailed,
            "HTTP_ERROR" => Self::HttpError,
            "CAPABILITY_MISSING" => Self::CapabilityMissing,
            "UNKNOWN_ADAPTER" => Self::UnknownAdapter,
            "POLICY_DENIED" => Self::PolicyDenied,
            "MAX_STEPS_EXCEEDED" => Self::MaxStepsExceeded,
            "BUG_ERROR" => Self::BugError,
            "UNKNOWN_ERROR" => Self::UnknownError,
            "CANCELLED" => Self::Cancelled,
            "DIGEST_MISMATCH" => Self::DigestMismatch,
            "RUN_EXISTS" => Self::RunExists,
            "SEQUENCE_CONFLICT" => Self::SequenceConflict,
            "UNKNOWN_RUN" => Self::UnknownRun,
            "CONFIG_ERROR" => Self::ConfigError,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Unified router error: a classified, structured failure.
///
/// # Examples
///
/// ```
/// use router_core::{RouterError, ErrorKind, ErrorCode};
///
/// let err = RouterError::operational(ErrorCode::Timeout, "adapter call timed out")
///     .with_detail("timeout_ms", 5_000);
/// assert_eq!(err.kind, ErrorKind::Operational);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterError {
    /// Operational vs. bug classification.
    pub kind: ErrorKind,
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured, redaction-safe diagnostic details.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl RouterError {
    /// Construct an operational error.
    #[must_use]
    pub fn operational(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Operational,
            code,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Construct a bug error.
    #[must_use]
    pub fn bug(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Bug,
            code,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attach or merge a single key into the structured `details` bag.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Serialize) -> Self {
        let v = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        match self.details {
            serde_json::Value::Object(ref mut map) => {
                map.insert(key.to_string(), v);
            }
            _ => {
                let mut map = serde_json::Map::new();
                map.insert(key.to_string(), v);
                self.details = serde_json::Value::Object(map);
            }
        }
        self
    }

    /// `true` if this error should terminate the run it occurred in.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ErrorKind::Bug)
    }
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RouterError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_errors_are_not_terminal() {
        let e = RouterError::operational(ErrorCode::Timeout, "slow");
        assert!(!e.is_terminal());
    }

    #[test]
    fn bug_errors_are_terminal() {
        let e = RouterError::bug(ErrorCode::BugError, "oops");
        assert!(e.is_terminal());
    }

    #[test]
    fn details_merge_across_calls() {
        let e = RouterError::operational(ErrorCode::CapabilityMissing, "missing")
            .with_detail("required_capability", "apply")
            .with_detail("adapter_capabilities", vec!["dry_run"]);
        assert_eq!(e.details["required_capability"], "apply");
        assert_eq!(e.details["adapter_capabilities"][0], "dry_run");
    }

    #[test]
    fn custom_code_round_trips() {
        let code = ErrorCode::Other("MY_CODE".to_string());
        assert_eq!(code.as_str(), "MY_CODE");
        let json = serde_json::to_string(&code).unwrap();
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
