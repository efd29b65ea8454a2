//! # HSU Service Config
//!
//! The immutable configuration snapshot the supervisor runs from, and the
//! providers that build it:
//! - [`YamlConfigProvider`]: a YAML file keyed by service name
//! - `RegistryConfigProvider` (Windows only): the service's `Parameters` key

pub mod validation;
pub mod yaml;

#[cfg(windows)]
pub mod registry;

use hsu_common::{ServiceName, ServiceResult};
use hsu_process::CommandSpec;
use std::path::PathBuf;
use std::time::Duration;

pub use validation::parse_environment;
pub use yaml::{ServiceEntry, YamlConfigProvider, YamlServicesFile};

#[cfg(windows)]
pub use registry::RegistryConfigProvider;

/// Default cadence of the monitor loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration snapshot for one supervised child.
///
/// Built once before supervision starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Executable path, optionally quoted. Never empty.
    pub application_path: String,
    /// Argument string, passed through verbatim.
    pub arguments: String,
    /// `None` inherits the supervisor's working directory.
    pub working_directory: Option<PathBuf>,
    /// `None` inherits the supervisor's environment.
    pub environment: Option<Vec<(String, String)>>,
    /// Exit code that counts as success; `None` disables the check.
    pub expected_exit_code: Option<i32>,
    /// Any exit of the child is a failure.
    pub run_forever: bool,
    pub poll_interval: Duration,
}

impl ServiceConfig {
    pub fn new(application_path: impl Into<String>) -> Self {
        Self {
            application_path: application_path.into(),
            arguments: String::new(),
            working_directory: None,
            environment: None,
            expected_exit_code: None,
            run_forever: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// What to hand to the launcher.
    pub fn command_spec(&self) -> CommandSpec {
        CommandSpec {
            application_path: self.application_path.clone(),
            arguments: self.arguments.clone(),
            working_directory: self.working_directory.clone(),
            environment: self.environment.clone(),
        }
    }
}

/// Source of the configuration snapshot.
///
/// A missing or empty application path must be reported as
/// [`ServiceError::Config`](hsu_common::ServiceError::Config).
pub trait ConfigProvider: Send + Sync {
    fn load(&self, service_name: &ServiceName) -> ServiceResult<ServiceConfig>;
}

/// Provider that hands out a fixed snapshot, or a fixed error.
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    config: ServiceResult<ServiceConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config: Ok(config) }
    }

    pub fn failing(error: hsu_common::ServiceError) -> Self {
        Self { config: Err(error) }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn load(&self, service_name: &ServiceName) -> ServiceResult<ServiceConfig> {
        let config = self.config.clone()?;
        validation::validate_service_config(service_name, &config)?;
        Ok(config)
    }
}
