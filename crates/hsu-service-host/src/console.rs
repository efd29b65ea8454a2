//! Console host: runs the service in the foreground.
//!
//! Status updates go to the log. SIGTERM and SIGINT (Ctrl+C on Windows) are
//! delivered to the control handler as Stop.

use crate::{build_runtime, complete, config_provider, HostOptions, ServiceHost};
use hsu_common::{ServiceName, ServiceResult};
use hsu_service_state::{ServiceStatus, StatusReporter};
use hsu_service_supervisor::{ControlCode, ControlHandler, ServiceRunner};
use std::sync::Arc;
use tracing::{info, warn};

/// Reports status transitions through `tracing`.
#[derive(Debug, Clone)]
pub struct LogStatusReporter {
    service_name: ServiceName,
}

impl LogStatusReporter {
    pub fn new(service_name: ServiceName) -> Self {
        Self { service_name }
    }
}

impl StatusReporter for LogStatusReporter {
    fn publish(&self, status: &ServiceStatus) -> ServiceResult<()> {
        if status.state.is_terminal() {
            info!(
                "Service {} status: {} (exit code {})",
                self.service_name, status.state, status.exit_code
            );
        } else {
            info!(
                "Service {} status: {} (accepts {:#x})",
                self.service_name,
                status.state,
                status.accepted_controls.bits()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleHost;

impl ServiceHost for ConsoleHost {
    fn run(&self, options: &HostOptions) -> ServiceResult<i32> {
        let runtime = build_runtime(&options.service_name)?;
        Ok(runtime.block_on(run_console(options)))
    }
}

/// Run the service until it stops; fail-fast outcomes exit the process.
pub async fn run_console(options: &HostOptions) -> i32 {
    info!("Starting service {} in console mode", options.service_name);

    let reporter = Arc::new(LogStatusReporter::new(options.service_name.clone()));
    let runner = ServiceRunner::new(options.service_name.clone(), reporter);

    let signals = tokio::spawn(forward_shutdown_signals(
        ShutdownSignals::install(),
        runner.control_handler(),
    ));

    let provider = config_provider(options);
    let outcome = runner.run(provider.as_ref()).await;
    signals.abort();

    complete(&runner, outcome)
}

async fn forward_shutdown_signals(signals: std::io::Result<ShutdownSignals>, handler: ControlHandler) {
    match signals {
        Ok(mut signals) => {
            signals.recv().await;
            handler.handle(ControlCode::Stop);
        }
        Err(e) => warn!("Failed to install signal handlers: {}", e),
    }
}

/// Shutdown signal streams, installed before the child is launched.
struct ShutdownSignals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
                sigint: signal(SignalKind::interrupt())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.sigterm.recv() => {
                    info!("Received SIGTERM signal");
                }
                _ = self.sigint.recv() => {
                    info!("Received SIGINT signal");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C signal");
            }
        }
    }
}
