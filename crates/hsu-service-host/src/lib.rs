//! # HSU Service Host
//!
//! Host service runtimes that drive a [`ServiceRunner`]:
//! - [`ConsoleHost`]: foreground process, Stop on SIGTERM / SIGINT / Ctrl+C
//! - `WindowsServiceHost` (Windows only): the Service Control Manager
//!
//! Both publish status through a [`StatusReporter`] and forward controls to
//! the runner's [`ControlHandler`].
//!
//! [`StatusReporter`]: hsu_service_state::StatusReporter
//! [`ControlHandler`]: hsu_service_supervisor::ControlHandler

pub mod console;

#[cfg(windows)]
pub mod scm;

use hsu_common::{ServiceError, ServiceName, ServiceResult};
use hsu_service_config::{ConfigProvider, YamlConfigProvider};
use hsu_service_supervisor::{RunOutcome, ServiceRunner};
use std::path::PathBuf;
use tracing::error;

#[cfg(not(windows))]
use hsu_service_config::StaticConfigProvider;

pub use console::{ConsoleHost, LogStatusReporter};

#[cfg(windows)]
pub use scm::{ScmStatusReporter, WindowsServiceHost};

/// What a host needs to start the service.
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    pub service_name: ServiceName,
    /// YAML configuration file. Without one the registry is used on
    /// Windows.
    pub config_file: Option<PathBuf>,
}

/// A host service runtime.
pub trait ServiceHost {
    /// Run the service to completion and return the process exit code.
    ///
    /// Fails only if the host itself could not be set up; startup failures
    /// of the service are reported through the returned code.
    fn run(&self, options: &HostOptions) -> ServiceResult<i32>;
}

/// Pick the configuration source for `options`.
pub fn config_provider(options: &HostOptions) -> Box<dyn ConfigProvider> {
    if let Some(ref path) = options.config_file {
        return Box::new(YamlConfigProvider::new(path));
    }

    #[cfg(windows)]
    {
        Box::new(hsu_service_config::RegistryConfigProvider::new())
    }

    #[cfg(not(windows))]
    {
        Box::new(StaticConfigProvider::failing(ServiceError::config(
            options.service_name.as_str(),
            "No configuration file given",
        )))
    }
}

/// Turn a run outcome into the process exit code.
///
/// A fail-fast outcome exits the process right here, so no further status
/// reaches the host.
pub fn complete(runner: &ServiceRunner, outcome: RunOutcome) -> i32 {
    if let RunOutcome::FailFast(decision) = outcome {
        error!(
            "Service {}: {}, exiting with {}",
            runner.service_name(),
            decision,
            decision.exit_code()
        );
        std::process::exit(decision.exit_code());
    }
    outcome.exit_code()
}

pub(crate) fn build_runtime(service_name: &ServiceName) -> ServiceResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            ServiceError::registration(
                service_name.as_str(),
                format!("Failed to build runtime: {}", e),
                e.raw_os_error(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(windows))]
    fn test_no_config_file_is_config_error() {
        let provider = config_provider(&HostOptions::default());
        let err = provider.load(&ServiceName::default()).unwrap_err();
        assert!(matches!(err, ServiceError::Config { .. }));
    }

    #[test]
    fn test_config_file_selects_yaml() {
        let options = HostOptions {
            service_name: ServiceName::from("svc"),
            config_file: Some(PathBuf::from("/no/such/hsu-services.yaml")),
        };
        let err = config_provider(&options)
            .load(&options.service_name)
            .unwrap_err();
        assert!(err.to_string().contains("hsu-services.yaml"));
    }
}
