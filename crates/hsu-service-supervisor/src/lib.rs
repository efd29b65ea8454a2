//! # HSU Service Supervisor
//!
//! Supervises a single child process on behalf of a host service runtime.
//!
//! The [`ServiceRunner`] loads the configuration, launches the child through
//! the [`ProcessSupervisor`], and runs the monitor loop until either the
//! child exits or the host sends Stop through the [`ControlHandler`]. The
//! two sides share only the [`StopSignal`] and the supervisor.
//!
//! # Example
//!
//! ```no_run
//! use hsu_common::ServiceName;
//! use hsu_service_config::YamlConfigProvider;
//! use hsu_service_supervisor::ServiceRunner;
//! # use hsu_service_state::{ServiceStatus, StatusReporter};
//! # struct Log;
//! # impl StatusReporter for Log {
//! #     fn publish(&self, _: &ServiceStatus) -> hsu_common::ServiceResult<()> { Ok(()) }
//! # }
//! # async fn example() {
//! let runner = ServiceRunner::new(ServiceName::from("my-app"), std::sync::Arc::new(Log));
//! let _handler = runner.control_handler();
//! // ... hand the handler to the host, which calls handle(ControlCode::Stop)
//! let outcome = runner.run(&YamlConfigProvider::new("services.yaml")).await;
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

pub mod control;
pub mod exit_policy;
pub mod monitor;
pub mod runner;
pub mod stop_signal;
pub mod supervisor;

pub use control::{ControlCode, ControlHandler, ControlResponse};
pub use exit_policy::{decide, ExitDecision, ExitPolicy};
pub use monitor::{run_monitor, MonitorOutcome};
pub use runner::{RunOutcome, ServiceRunner};
pub use stop_signal::StopSignal;
pub use supervisor::ProcessSupervisor;
