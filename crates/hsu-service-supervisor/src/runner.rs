//! Service runner: the service entry point once the host has registered the
//! control handler.
//!
//! ```text
//! load config ──err──► Stopped(diagnostic code)
//!     │
//! launch ──────err──► Stopped(diagnostic code)
//!     │
//! Running ──► monitor ──► NormalStop / stop control ──► Stopped(0)
//!                    └──► Policy/ForcedFailure ──────► process exit 1 / 2
//! ```

use crate::control::{lock_state, ControlHandler};
use crate::exit_policy::ExitDecision;
use crate::monitor::{run_monitor, MonitorOutcome};
use crate::stop_signal::StopSignal;
use crate::supervisor::ProcessSupervisor;
use hsu_common::{ServiceError, ServiceName};
use hsu_service_config::ConfigProvider;
use hsu_service_state::{AcceptedControls, ServiceState, ServiceStateMachine, StatusReporter};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// How a run ended, and what the supervisor process should exit with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped cleanly; `Stopped` with code 0 has been published.
    Stopped,
    /// Configuration or launch failed; `Stopped` with `code` has been
    /// published.
    StartupFailed { code: u32 },
    /// The child exited against policy. No final status was published: the
    /// caller must exit the process immediately with the decision's code.
    FailFast(ExitDecision),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Stopped => 0,
            RunOutcome::StartupFailed { code } => *code as i32,
            RunOutcome::FailFast(decision) => decision.exit_code(),
        }
    }
}

pub struct ServiceRunner {
    service_name: ServiceName,
    stop: Arc<StopSignal>,
    supervisor: Arc<ProcessSupervisor>,
    state: Arc<Mutex<ServiceStateMachine>>,
}

impl ServiceRunner {
    /// Create a runner in `StartPending`. Nothing is published yet.
    pub fn new(service_name: ServiceName, reporter: Arc<dyn StatusReporter>) -> Self {
        let state = ServiceStateMachine::new(service_name.as_str(), reporter);
        Self {
            service_name,
            stop: Arc::new(StopSignal::new()),
            supervisor: Arc::new(ProcessSupervisor::new()),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn service_name(&self) -> &ServiceName {
        &self.service_name
    }

    /// The handler to register with the host.
    pub fn control_handler(&self) -> ControlHandler {
        ControlHandler::new(
            self.stop.clone(),
            self.supervisor.clone(),
            self.state.clone(),
        )
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn current_state(&self) -> ServiceState {
        lock_state(&self.state).current_state()
    }

    pub async fn run(&self, provider: &dyn ConfigProvider) -> RunOutcome {
        let config = match provider.load(&self.service_name) {
            Ok(config) => Arc::new(config),
            Err(e) => return self.startup_failed(e),
        };

        if self.stop.is_set() {
            info!("Stop requested before launch");
            return self.finish();
        }

        if let Err(e) = self.supervisor.launch(&config) {
            return self.startup_failed(e);
        }

        {
            let mut state = lock_state(&self.state);
            if self.stop.is_set() {
                drop(state);
                info!("Stop requested during launch");
                return self.finish();
            }
            if let Err(e) = state.set_state(AcceptedControls::RUNNING, ServiceState::Running, 0) {
                debug!("Running not published: {}", e);
            }
        }
        info!("Service {} running", self.service_name);

        let monitor = tokio::spawn(run_monitor(
            self.supervisor.clone(),
            self.stop.clone(),
            config.clone(),
        ));

        let outcome = match monitor.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Monitor task failed: {}", e);
                MonitorOutcome::ChildExited {
                    exit_code: None,
                    decision: ExitDecision::PolicyFailure,
                }
            }
        };

        match outcome {
            MonitorOutcome::ChildExited { exit_code, decision }
                if decision.is_failure() && !self.stop.is_set() =>
            {
                error!(
                    "Child exited ({:?}): {}, exiting with {}",
                    exit_code,
                    decision,
                    decision.exit_code()
                );
                RunOutcome::FailFast(decision)
            }
            _ => self.finish(),
        }
    }

    fn startup_failed(&self, e: ServiceError) -> RunOutcome {
        let code = e.exit_code();
        error!("Service {} failed to start: {} (code {})", self.service_name, e, code);

        let mut state = lock_state(&self.state);
        if let Err(e) = state.set_state_with_reason(
            AcceptedControls::NONE,
            ServiceState::Stopped,
            code,
            Some(e.to_string()),
        ) {
            debug!("Startup failure not published: {}", e);
        }
        log_history(&self.service_name, &state);
        RunOutcome::StartupFailed { code }
    }

    fn finish(&self) -> RunOutcome {
        self.stop.set();
        self.supervisor.terminate();

        let mut state = lock_state(&self.state);
        if !state.current_state().is_terminal() {
            if let Err(e) = state.set_state(AcceptedControls::NONE, ServiceState::Stopped, 0) {
                debug!("Stopped not published: {}", e);
            }
        }
        log_history(&self.service_name, &state);
        info!("Service {} stopped", self.service_name);
        RunOutcome::Stopped
    }
}

fn log_history(service_name: &ServiceName, state: &ServiceStateMachine) {
    debug!(
        "Service {} history: {} transitions, {} pauses, last at {}",
        service_name,
        state.state_history().len(),
        state.count_transitions_to(ServiceState::Paused),
        state.last_transition_time().to_rfc3339()
    );
    for transition in state.state_history() {
        debug!(
            "  {} -> {} (code {}) at {}: {}",
            transition.from_state,
            transition.to_state,
            transition.exit_code,
            transition.timestamp.to_rfc3339(),
            transition.reason.as_deref().unwrap_or("-")
        );
    }
}
