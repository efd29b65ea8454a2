//! Child process handle.
//!
//! The handle is shared between two threads of control: the monitor polls
//! it, the control handler may terminate it. Both operations are
//! non-blocking, so the `Child` sits behind a short-held mutex and
//! termination is idempotent rather than mutually exclusive with polling.
//!
//! The handle is closed exactly once: either when a poll observes the
//! natural exit (the exit status is cached) or when it is terminated.

use hsu_common::{ServiceError, ServiceResult};
use std::process::ExitStatus;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, info, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Owned handle to the supervised child.
#[derive(Debug)]
pub struct ChildHandle {
    pid: u32,
    command_line: String,
    /// `None` once the handle has been closed.
    child: Mutex<Option<Child>>,
    /// Exit status, recorded when the exit was observed.
    status: OnceLock<ExitStatus>,
}

impl ChildHandle {
    pub(crate) fn new(child: Child, pid: u32, command_line: String) -> Self {
        Self {
            pid,
            command_line,
            child: Mutex::new(Some(child)),
            status: OnceLock::new(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Whether the handle has been closed (exit observed or terminated).
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Non-blocking liveness probe.
    ///
    /// Returns `Ok(false)` once the child has exited or the handle has been
    /// closed. The first probe that observes the exit records the status and
    /// closes the handle.
    pub fn is_alive(&self) -> ServiceResult<bool> {
        if self.status.get().is_some() {
            return Ok(false);
        }

        let mut guard = self.lock();
        let Some(child) = guard.as_mut() else {
            return Ok(false);
        };

        match child.try_wait() {
            Ok(None) => Ok(true),
            Ok(Some(status)) => {
                info!("Child exited: PID {} with {}", self.pid, status);
                let _ = self.status.set(status);
                *guard = None;
                Ok(false)
            }
            Err(e) => Err(ServiceError::query(self.pid, e.to_string())),
        }
    }

    /// Exit code of the terminated child.
    ///
    /// Only meaningful after [`is_alive`](Self::is_alive) returned `false`.
    /// Fails if the child has not exited, if it was terminated before its
    /// exit was observed, or if it died from a signal and has no code.
    pub fn exit_code(&self) -> ServiceResult<i32> {
        match self.status.get() {
            Some(status) => status.code().ok_or_else(|| {
                ServiceError::query(self.pid, format!("no exit code ({})", status))
            }),
            None if self.is_closed() => {
                Err(ServiceError::query(self.pid, "handle closed before exit was observed"))
            }
            None => Err(ServiceError::query(self.pid, "process has not exited")),
        }
    }

    /// Unconditional, best-effort forced kill.
    ///
    /// Safe to call any number of times and concurrently with polling: a
    /// handle that has already exited or been terminated is left alone, and
    /// kill errors are logged rather than returned.
    pub fn terminate(&self) {
        let mut guard = self.lock();
        let Some(mut child) = guard.take() else {
            debug!("Terminate on closed handle ignored (PID: {})", self.pid);
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Child already exited before terminate (PID: {})", self.pid);
                let _ = self.status.set(status);
                return;
            }
            Ok(None) => {}
            Err(e) => debug!("Pre-terminate probe failed for PID {}: {}", self.pid, e),
        }

        match child.start_kill() {
            Ok(()) => info!("Child terminated (PID: {})", self.pid),
            Err(e) => warn!("Terminate failed for PID {}: {}", self.pid, e),
        }

        // Reap if the kill has already landed; otherwise the runtime reaps
        // the orphaned child in the background.
        if let Ok(Some(status)) = child.try_wait() {
            let _ = self.status.set(status);
        }
    }

    /// Poll until the child exits or `timeout` elapses, returning its exit
    /// code.
    pub async fn wait_for_exit(&self, timeout: Duration) -> ServiceResult<i32> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.is_alive()? {
                return self.exit_code();
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ServiceError::query(
                    self.pid,
                    format!("did not exit within {:?}", timeout),
                ));
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        // A panic while holding the lock cannot leave the Option half-updated.
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use crate::execute::{launch, CommandSpec};
    use hsu_common::ServiceError;
    use std::time::Duration;

    fn shell(script: &str) -> CommandSpec {
        CommandSpec::new("/bin/sh").with_arguments(format!("-c '{}'", script))
    }

    #[tokio::test]
    async fn test_natural_exit_code() {
        let handle = launch(&shell("exit 42")).unwrap();
        assert_eq!(handle.command_line(), "/bin/sh -c 'exit 42'");
        assert_eq!(handle.wait_for_exit(Duration::from_secs(10)).await.unwrap(), 42);
        assert!(handle.is_closed());
        assert!(!handle.is_alive().unwrap());
        assert_eq!(handle.exit_code().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_exit_code_before_exit_is_query_error() {
        let handle = launch(&shell("sleep 30")).unwrap();
        assert!(handle.is_alive().unwrap());
        assert!(matches!(handle.exit_code(), Err(ServiceError::Query { .. })));
        handle.terminate();
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let handle = launch(&shell("sleep 30")).unwrap();
        assert!(handle.is_alive().unwrap());

        handle.terminate();
        handle.terminate();

        assert!(handle.is_closed());
        assert!(!handle.is_alive().unwrap());
        // Killed by a signal: no exit code to report.
        assert!(handle.exit_code().is_err());
    }

    #[tokio::test]
    async fn test_terminate_after_natural_exit() {
        let handle = launch(&shell("exit 0")).unwrap();
        assert_eq!(handle.wait_for_exit(Duration::from_secs(10)).await.unwrap(), 0);

        handle.terminate();
        assert_eq!(handle.exit_code().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_terminate_and_poll() {
        let handle = std::sync::Arc::new(launch(&shell("sleep 30")).unwrap());

        let poller = {
            let handle = handle.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let _ = handle.is_alive();
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };
        let killers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                tokio::task::spawn_blocking(move || handle.terminate())
            })
            .collect();

        for killer in killers {
            killer.await.unwrap();
        }
        poller.await.unwrap();
        assert!(!handle.is_alive().unwrap());
    }
}
