//! router-policy
//!
//! Evaluates a request's policy block before any step executes.
//! In v0.1 this is a small authorization gate: an `allow_apply` switch and
//! a `max_steps` ceiling. Policy evaluation happens after `RUN_STARTED` and
//! `DISPATCH_SELECTED`, before `PLAN_CREATED` — enforced by the caller
//! (`router-engine`), not by this crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use router_core::{ErrorCode, Mode, RouterError};
use serde::{Deserialize, Serialize};

/// Policy block carried on a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Whether `mode = apply` runs are authorized at all.
    #[serde(default = "default_allow_apply")]
    pub allow_apply: bool,
    /// Maximum number of plan steps permitted. `None` means unbounded.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

fn default_allow_apply() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allow_apply: true,
            max_steps: None,
        }
    }
}

/// Evaluate `policy` against a run's `mode` and plan length.
///
/// # Errors
///
/// Returns [`ErrorCode::PolicyDenied`] when `mode = apply` and
/// `allow_apply = false`, or [`ErrorCode::MaxStepsExceeded`] when
/// `plan_len` exceeds `policy.max_steps`.
pub fn evaluate(policy: &Policy, mode: Mode, plan_len: usize) -> Result<(), RouterError> {
    if mode == Mode::Apply && !policy.allow_apply {
        return Err(RouterError::operational(
            ErrorCode::PolicyDenied,
            "policy does not permit apply-mode runs",
        ));
    }

    if let Some(max_steps) = policy.max_steps {
        if plan_len > max_steps {
            return Err(RouterError::operational(
                ErrorCode::MaxStepsExceeded,
                format!("plan has {plan_len} steps, policy allows at most {max_steps}"),
            )
            .with_detail("plan_len", plan_len)
            .with_detail("max_steps", max_steps));
        }
    }

    Ok(())
}
