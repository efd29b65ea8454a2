//! # HSU Service State
//!
//! The externally-visible lifecycle of the wrapper service and the contract
//! for publishing it to the host service manager.
//!
//! ```text
//! StartPending ──► Running ◄──► Paused
//!      │              │            │
//!      └──────► StopPending ◄──────┘
//!                     │
//!                  Stopped   (terminal)
//! ```
//!
//! Every state may also go straight to `Stopped`, which is how startup
//! failures and the Stop control are reported.

use chrono::{DateTime, Utc};
use hsu_common::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const MAX_HISTORY: usize = 100;

/// Service lifecycle state, with the Win32 `SERVICE_*` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Stopped,
    StartPending,
    StopPending,
    Running,
    Paused,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::StartPending => write!(f, "start_pending"),
            ServiceState::StopPending => write!(f, "stop_pending"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::Paused => write!(f, "paused"),
        }
    }
}

impl ServiceState {
    /// Numeric value used by the Windows service control manager.
    pub fn as_raw(&self) -> u32 {
        match self {
            ServiceState::Stopped => 1,
            ServiceState::StartPending => 2,
            ServiceState::StopPending => 3,
            ServiceState::Running => 4,
            ServiceState::Paused => 7,
        }
    }

    /// `Stopped` is the only terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }
}

/// Set of control codes the service currently accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AcceptedControls(u32);

impl AcceptedControls {
    pub const NONE: Self = Self(0);
    /// `SERVICE_ACCEPT_STOP`
    pub const STOP: Self = Self(0x0000_0001);
    /// `SERVICE_ACCEPT_PAUSE_CONTINUE`
    pub const PAUSE_CONTINUE: Self = Self(0x0000_0002);
    pub const RUNNING: Self = Self(Self::STOP.0 | Self::PAUSE_CONTINUE.0);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for AcceptedControls {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A single status report as handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub accepted_controls: AcceptedControls,
    pub state: ServiceState,
    /// Only meaningful in `Stopped`; always 0 otherwise.
    pub exit_code: u32,
}

/// Publishes status updates to the host service manager.
///
/// A failed publish is not fatal: the state machine logs it and carries on,
/// since the host queries the current state on its own schedule.
pub trait StatusReporter: Send + Sync {
    fn publish(&self, status: &ServiceStatus) -> ServiceResult<()>;
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: ServiceState,
    pub to_state: ServiceState,
    pub exit_code: u32,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Tracks the service state and publishes every transition.
pub struct ServiceStateMachine {
    service_name: String,
    current: ServiceStatus,
    state_history: Vec<StateTransition>,
    last_transition_time: DateTime<Utc>,
    reporter: Arc<dyn StatusReporter>,
}

impl fmt::Debug for ServiceStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceStateMachine")
            .field("service_name", &self.service_name)
            .field("current", &self.current)
            .field("transitions", &self.state_history.len())
            .finish()
    }
}

impl ServiceStateMachine {
    /// Create a state machine in `StartPending`. Nothing is published until
    /// the first [`set_state`](Self::set_state).
    pub fn new(service_name: &str, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            service_name: service_name.to_string(),
            current: ServiceStatus {
                accepted_controls: AcceptedControls::NONE,
                state: ServiceState::StartPending,
                exit_code: 0,
            },
            state_history: Vec::new(),
            last_transition_time: Utc::now(),
            reporter,
        }
    }

    pub fn current_state(&self) -> ServiceState {
        self.current.state
    }

    pub fn current_status(&self) -> ServiceStatus {
        self.current
    }

    pub fn state_history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    /// Check if a transition from the current state to `target` is valid.
    pub fn is_valid_transition(&self, target: ServiceState) -> bool {
        use ServiceState::*;

        match (self.current.state, target) {
            // Nothing leaves Stopped
            (Stopped, _) => false,

            // Any live state may stop, directly or through StopPending
            (_, Stopped) => true,

            // Republishing the same state
            (state, target) if state == target => true,

            (StopPending, _) => false,
            (_, StopPending) => true,

            (StartPending, Running) => true,
            (Running, Paused) => true,
            (Paused, Running) => true,

            _ => false,
        }
    }

    /// Move to `state` and publish it with `accepted_controls`.
    ///
    /// An invalid transition is rejected and nothing is published. A publish
    /// failure is logged and swallowed; the transition still takes effect.
    pub fn set_state(
        &mut self,
        accepted_controls: AcceptedControls,
        state: ServiceState,
        exit_code: u32,
    ) -> ServiceResult<()> {
        self.set_state_with_reason(accepted_controls, state, exit_code, None)
    }

    pub fn set_state_with_reason(
        &mut self,
        accepted_controls: AcceptedControls,
        state: ServiceState,
        exit_code: u32,
        reason: Option<String>,
    ) -> ServiceResult<()> {
        if !self.is_valid_transition(state) {
            return Err(ServiceError::invalid_transition(
                self.current.state.to_string(),
                state.to_string(),
            ));
        }

        let now = Utc::now();
        let status = ServiceStatus {
            accepted_controls: if state.is_terminal() {
                AcceptedControls::NONE
            } else {
                accepted_controls
            },
            state,
            exit_code: if state.is_terminal() { exit_code } else { 0 },
        };

        self.state_history.push(StateTransition {
            from_state: self.current.state,
            to_state: state,
            exit_code: status.exit_code,
            timestamp: now,
            reason,
        });
        if self.state_history.len() > MAX_HISTORY {
            self.state_history.remove(0);
        }

        tracing::debug!(
            "Service {} transitioned from {} to {} (exit code {})",
            self.service_name,
            self.current.state,
            state,
            status.exit_code
        );

        self.current = status;
        self.last_transition_time = now;

        if let Err(e) = self.reporter.publish(&status) {
            tracing::warn!("Service {}: {}", self.service_name, e);
        }

        Ok(())
    }

    /// Republish the current status without changing it.
    pub fn republish(&self) {
        if let Err(e) = self.reporter.publish(&self.current) {
            tracing::warn!("Service {}: {}", self.service_name, e);
        }
    }

    /// Count transitions to a specific state.
    pub fn count_transitions_to(&self, state: ServiceState) -> usize {
        self.state_history
            .iter()
            .filter(|t| t.to_state == state)
            .count()
    }
}
