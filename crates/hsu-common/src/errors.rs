//! Error types for the HSU service wrapper.
//!
//! # Rust Learning Note
//!
//! Every failure the wrapper can meet falls into one of a handful of
//! categories, and each category has a fixed consequence:
//!
//! | Variant        | Consequence                                          |
//! |----------------|------------------------------------------------------|
//! | `Config`       | fatal at startup, service reports `Stopped`          |
//! | `Launch`       | fatal at startup, service reports `Stopped`          |
//! | `Registration` | fatal, the binary exits with the OS error code       |
//! | `Query`        | routed through the exit policy                       |
//! | `Publish`      | logged only, execution continues                     |
//!
//! Because the consequence is encoded in the variant, callers `match` on the
//! error instead of inspecting strings.
//!
//! ```rust
//! use hsu_common::{ServiceError, ServiceResult};
//!
//! fn read_path(value: Option<&str>) -> ServiceResult<String> {
//!     value
//!         .map(str::to_string)
//!         .ok_or_else(|| ServiceError::config("my-service", "Application value is missing"))
//! }
//!
//! let err = read_path(None).unwrap_err();
//! assert!(matches!(err, ServiceError::Config { .. }));
//! ```

use thiserror::Error;

/// Win32 `ERROR_BAD_CONFIGURATION`, reported when configuration is unusable.
pub const ERROR_BAD_CONFIGURATION: u32 = 1610;

/// Win32 `ERROR_PROCESS_ABORTED`, reported when a launch failed without an OS code.
pub const ERROR_PROCESS_ABORTED: u32 = 1067;

/// Win32 `ERROR_SERVICE_SPECIFIC_ERROR`, fallback for registration failures.
pub const ERROR_SERVICE_SPECIFIC_ERROR: u32 = 1066;

/// Result type for service wrapper operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Error type for service wrapper operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A required configuration value is missing or malformed.
    #[error("Configuration error: {service} - {reason}")]
    Config { service: String, reason: String },

    /// The child process could not be created.
    #[error("Launch failed: {command} - {reason}")]
    Launch {
        command: String,
        reason: String,
        os_code: Option<i32>,
    },

    /// A liveness or exit-code probe on the child failed.
    #[error("Process query failed: pid {pid} - {reason}")]
    Query { pid: u32, reason: String },

    /// The host service manager rejected a status update.
    #[error("Status publish failed: {state} - {reason}")]
    Publish { state: String, reason: String },

    /// The entry point could not be registered with the host runtime.
    #[error("Service registration failed: {service} - {reason}")]
    Registration {
        service: String,
        reason: String,
        os_code: Option<i32>,
    },

    /// A state transition that the lifecycle does not allow.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl ServiceError {
    pub fn config(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn launch_failed(command: impl Into<String>, error: &std::io::Error) -> Self {
        Self::Launch {
            command: command.into(),
            reason: error.to_string(),
            os_code: error.raw_os_error(),
        }
    }

    pub fn launch(command: impl Into<String>, reason: impl Into<String>, os_code: Option<i32>) -> Self {
        Self::Launch {
            command: command.into(),
            reason: reason.into(),
            os_code,
        }
    }

    pub fn query(pid: u32, reason: impl Into<String>) -> Self {
        Self::Query {
            pid,
            reason: reason.into(),
        }
    }

    pub fn publish(state: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Publish {
            state: state.into(),
            reason: reason.into(),
        }
    }

    pub fn registration(
        service: impl Into<String>,
        reason: impl Into<String>,
        os_code: Option<i32>,
    ) -> Self {
        Self::Registration {
            service: service.into(),
            reason: reason.into(),
            os_code,
        }
    }

    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Diagnostic code reported with `Stopped` and used as the process exit
    /// code when startup fails.
    ///
    /// The OS error is used where one is available; otherwise a fixed Win32
    /// code for the category. Never returns 0, 1 or 2, which are reserved for
    /// the exit policy outcomes.
    pub fn exit_code(&self) -> u32 {
        let code = match self {
            Self::Config { .. } => ERROR_BAD_CONFIGURATION,
            Self::Launch { os_code, .. } => os_code
                .and_then(|c| u32::try_from(c).ok())
                .unwrap_or(ERROR_PROCESS_ABORTED),
            Self::Registration { os_code, .. } => os_code
                .and_then(|c| u32::try_from(c).ok())
                .unwrap_or(ERROR_SERVICE_SPECIFIC_ERROR),
            Self::Query { .. } | Self::Publish { .. } | Self::InvalidTransition { .. } => {
                ERROR_SERVICE_SPECIFIC_ERROR
            }
        };

        match code {
            0 => ERROR_SERVICE_SPECIFIC_ERROR,
            1 | 2 => ERROR_PROCESS_ABORTED,
            other => other,
        }
    }
}
