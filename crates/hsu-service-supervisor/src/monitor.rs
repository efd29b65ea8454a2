//! Monitor loop: polls the stop signal and the child at a fixed cadence.

use crate::exit_policy::{ExitDecision, ExitPolicy};
use crate::stop_signal::StopSignal;
use crate::supervisor::ProcessSupervisor;
use hsu_service_config::ServiceConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why the monitor returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The stop signal was observed; the child may still need terminating.
    StopRequested,
    /// The child exited on its own (or could not be probed) and the exit
    /// policy was applied. `NormalStop` has already set the stop signal.
    ChildExited {
        exit_code: Option<i32>,
        decision: ExitDecision,
    },
}

/// Poll until a stop is requested or the child exits.
///
/// The configuration is read-only here; it is the same snapshot the child
/// was launched from.
pub async fn run_monitor(
    supervisor: Arc<ProcessSupervisor>,
    stop: Arc<StopSignal>,
    config: Arc<ServiceConfig>,
) -> MonitorOutcome {
    let policy = ExitPolicy::from_config(&config);
    let poll_interval = config.poll_interval;
    debug!("Monitor started (interval {:?})", poll_interval);

    loop {
        if stop.is_set() {
            debug!("Monitor observed stop signal");
            return MonitorOutcome::StopRequested;
        }

        let (exit_code, decision) = match supervisor.is_alive() {
            Ok(true) => {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = stop.wait() => {}
                }
                continue;
            }
            Ok(false) => {
                // A stop that raced the exit wins: the exit was likely caused
                // by the control handler's terminate.
                if stop.is_set() {
                    debug!("Child exit observed after stop signal");
                    return MonitorOutcome::StopRequested;
                }
                let exit_code = supervisor.exit_code();
                let decision = policy.decide(&exit_code);
                (exit_code, decision)
            }
            Err(e) => {
                warn!("Liveness probe failed: {}", e);
                (Err(e), policy.liveness_failed())
            }
        };

        let exit_code = match exit_code {
            Ok(code) => {
                info!("Child exited with code {}: {}", code, decision);
                Some(code)
            }
            Err(e) => {
                warn!("Child exit code unavailable ({}): {}", e, decision);
                None
            }
        };

        if !decision.is_failure() {
            stop.set();
        }

        return MonitorOutcome::ChildExited {
            exit_code,
            decision,
        };
    }
}
