//! Exit policy: maps the child's exit to the supervisor's own outcome.
//!
//! | decision        | supervisor exit code |
//! |-----------------|----------------------|
//! | `NormalStop`    | 0                    |
//! | `PolicyFailure` | 1                    |
//! | `ForcedFailure` | 2                    |

use hsu_common::ServiceResult;
use hsu_service_config::ServiceConfig;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    /// Clean stop, reported to the host as `Stopped` with code 0.
    NormalStop,
    /// Unexpected exit code, the exit code could not be queried while one was
    /// expected, or the liveness check itself failed.
    PolicyFailure,
    /// The child was configured to run forever and exited anyway.
    ForcedFailure,
}

impl ExitDecision {
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitDecision::NormalStop => 0,
            ExitDecision::PolicyFailure => 1,
            ExitDecision::ForcedFailure => 2,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, ExitDecision::NormalStop)
    }
}

impl fmt::Display for ExitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitDecision::NormalStop => write!(f, "normal stop"),
            ExitDecision::PolicyFailure => write!(f, "policy failure"),
            ExitDecision::ForcedFailure => write!(f, "forced failure"),
        }
    }
}

/// Decide the outcome of a child exit.
///
/// `run_forever` outranks everything. Without an expected code any exit is
/// a normal stop, including one whose code could not be queried (a child
/// killed by a signal on Unix).
pub fn decide(
    run_forever: bool,
    expected_exit_code: Option<i32>,
    actual_exit_code: &ServiceResult<i32>,
) -> ExitDecision {
    if run_forever {
        return ExitDecision::ForcedFailure;
    }

    match (expected_exit_code, actual_exit_code) {
        (Some(expected), Ok(actual)) if *actual == expected => ExitDecision::NormalStop,
        (Some(_), _) => ExitDecision::PolicyFailure,
        (None, _) => ExitDecision::NormalStop,
    }
}

/// The policy fields of a configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitPolicy {
    pub run_forever: bool,
    pub expected_exit_code: Option<i32>,
}

impl ExitPolicy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            run_forever: config.run_forever,
            expected_exit_code: config.expected_exit_code,
        }
    }

    pub fn decide(&self, actual_exit_code: &ServiceResult<i32>) -> ExitDecision {
        decide(self.run_forever, self.expected_exit_code, actual_exit_code)
    }

    /// Outcome when the liveness check itself fails. Whether the child exited is
    /// unknown, so this is never a normal stop.
    pub fn liveness_failed(&self) -> ExitDecision {
        if self.run_forever {
            ExitDecision::ForcedFailure
        } else {
            ExitDecision::PolicyFailure
        }
    }
}
