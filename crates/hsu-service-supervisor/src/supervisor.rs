//! Process supervisor: sole owner of the child handle.

use hsu_common::{ServiceError, ServiceResult};
use hsu_process::{launch, ChildHandle};
use hsu_service_config::ServiceConfig;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Owns at most one child for its whole lifetime.
///
/// Before launch there is no handle: probes report "not alive" and
/// termination is a no-op.
#[derive(Debug, Default)]
pub struct ProcessSupervisor {
    child: OnceLock<ChildHandle>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the configured child. Succeeds at most once.
    pub fn launch(&self, config: &ServiceConfig) -> ServiceResult<u32> {
        let spec = config.command_spec();
        if self.child.get().is_some() {
            return Err(ServiceError::launch(
                spec.command_line(),
                "Child already launched",
                None,
            ));
        }

        let handle = launch(&spec)?;
        let pid = handle.pid();
        self.child.set(handle).map_err(|lost| {
            lost.terminate();
            ServiceError::launch(spec.command_line(), "Child already launched", None)
        })?;

        info!("Supervising PID {}", pid);
        Ok(pid)
    }

    pub fn has_child(&self) -> bool {
        self.child.get().is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.get().map(ChildHandle::pid)
    }

    pub fn is_alive(&self) -> ServiceResult<bool> {
        match self.child.get() {
            Some(handle) => handle.is_alive(),
            None => Ok(false),
        }
    }

    pub fn exit_code(&self) -> ServiceResult<i32> {
        match self.child.get() {
            Some(handle) => handle.exit_code(),
            None => Err(ServiceError::query(0, "no child launched")),
        }
    }

    /// Idempotent; a no-op when nothing was launched.
    pub fn terminate(&self) {
        if let Some(handle) = self.child.get() {
            debug!("Terminating PID {}: {}", handle.pid(), handle.command_line());
            handle.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_child_before_launch() {
        let supervisor = ProcessSupervisor::new();
        assert!(!supervisor.has_child());
        assert!(!supervisor.is_alive().unwrap());
        assert!(supervisor.exit_code().is_err());
        supervisor.terminate();
        supervisor.terminate();
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_no_handle() {
        let supervisor = ProcessSupervisor::new();
        let err = supervisor
            .launch(&ServiceConfig::new("/no/such/dir/hsu-app"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Launch { .. }));
        assert!(!supervisor.has_child());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_launch_once() {
        let mut config = ServiceConfig::new("/bin/sh");
        config.arguments = "-c 'sleep 30'".to_string();

        let supervisor = ProcessSupervisor::new();
        let pid = supervisor.launch(&config).unwrap();
        assert_eq!(supervisor.pid(), Some(pid));
        assert!(supervisor.is_alive().unwrap());

        assert!(supervisor.launch(&config).is_err());
        assert_eq!(supervisor.pid(), Some(pid));

        supervisor.terminate();
        supervisor.terminate();
        assert!(!supervisor.is_alive().unwrap());
    }
}
