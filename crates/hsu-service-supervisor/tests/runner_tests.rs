//! Runner scenarios against a recording host.

use hsu_common::{ServiceName, ServiceResult, ERROR_BAD_CONFIGURATION};
use hsu_service_config::{ServiceConfig, StaticConfigProvider};
use hsu_service_state::{ServiceState, ServiceStatus, StatusReporter};
use hsu_service_supervisor::{ControlCode, ExitDecision, RunOutcome, ServiceRunner};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingHost {
    published: Mutex<Vec<ServiceStatus>>,
}

impl RecordingHost {
    fn states(&self) -> Vec<(ServiceState, u32)> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|s| (s.state, s.exit_code))
            .collect()
    }
}

impl StatusReporter for RecordingHost {
    fn publish(&self, status: &ServiceStatus) -> ServiceResult<()> {
        self.published.lock().unwrap().push(*status);
        Ok(())
    }
}

fn runner() -> (Arc<ServiceRunner>, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::default());
    let runner = ServiceRunner::new(ServiceName::from("test-service"), host.clone());
    (Arc::new(runner), host)
}

#[cfg(unix)]
fn shell(script: &str) -> ServiceConfig {
    let mut config = ServiceConfig::new("/bin/sh");
    config.arguments = format!("-c '{}'", script);
    config.poll_interval = Duration::from_millis(20);
    config
}

async fn run_with(runner: &ServiceRunner, config: ServiceConfig) -> RunOutcome {
    let provider = StaticConfigProvider::new(config);
    tokio::time::timeout(Duration::from_secs(20), runner.run(&provider))
        .await
        .expect("runner timed out")
}

#[tokio::test]
async fn test_missing_application_stops_without_launch() {
    let (runner, host) = runner();

    let outcome = run_with(&runner, ServiceConfig::new("")).await;

    assert_eq!(
        outcome,
        RunOutcome::StartupFailed {
            code: ERROR_BAD_CONFIGURATION
        }
    );
    assert_eq!(host.states(), vec![(ServiceState::Stopped, ERROR_BAD_CONFIGURATION)]);
    assert!(!runner.supervisor().has_child());
}

#[tokio::test]
async fn test_launch_failure_publishes_diagnostic_code() {
    let (runner, host) = runner();

    let outcome = run_with(&runner, ServiceConfig::new("/no/such/dir/hsu-app")).await;

    let RunOutcome::StartupFailed { code } = outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert!(code > 2);
    assert_eq!(host.states(), vec![(ServiceState::Stopped, code)]);
    assert!(!runner.supervisor().has_child());
}

#[tokio::test]
async fn test_stop_before_run_never_launches() {
    let (runner, host) = runner();
    runner.control_handler().handle(ControlCode::Stop);

    let outcome = run_with(&runner, ServiceConfig::new("/bin/sh")).await;

    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(host.states(), vec![(ServiceState::Stopped, 0)]);
    assert!(!runner.supervisor().has_child());
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[tokio::test]
    async fn test_expected_exit_stops_cleanly() {
        let (runner, host) = runner();
        let mut config = shell("exit 0");
        config.expected_exit_code = Some(0);

        assert_eq!(run_with(&runner, config).await, RunOutcome::Stopped);
        assert_eq!(
            host.states(),
            vec![(ServiceState::Running, 0), (ServiceState::Stopped, 0)]
        );
    }

    #[tokio::test]
    async fn test_unchecked_exit_code_stops_cleanly() {
        let (runner, _) = runner();
        assert_eq!(run_with(&runner, shell("exit 7")).await, RunOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_signal_killed_child_without_check_stops_cleanly() {
        let (runner, host) = runner();

        let outcome = run_with(&runner, shell("kill -TERM $$")).await;

        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(
            host.states(),
            vec![(ServiceState::Running, 0), (ServiceState::Stopped, 0)]
        );
    }

    #[tokio::test]
    async fn test_unexpected_exit_fails_fast_without_final_status() {
        let (runner, host) = runner();
        let mut config = shell("exit 42");
        config.expected_exit_code = Some(0);

        let outcome = run_with(&runner, config).await;

        assert_eq!(outcome, RunOutcome::FailFast(ExitDecision::PolicyFailure));
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(host.states(), vec![(ServiceState::Running, 0)]);
    }

    #[tokio::test]
    async fn test_run_forever_exit_fails_fast() {
        let (runner, host) = runner();
        let mut config = shell("exit 0");
        config.run_forever = true;

        let outcome = run_with(&runner, config).await;

        assert_eq!(outcome, RunOutcome::FailFast(ExitDecision::ForcedFailure));
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(host.states(), vec![(ServiceState::Running, 0)]);
    }

    #[tokio::test]
    async fn test_stop_control_terminates_child_and_wins_race() {
        let (runner, host) = runner();
        let handler = runner.control_handler();
        let mut config = shell("sleep 30");
        config.expected_exit_code = Some(0);

        let task = {
            let runner = runner.clone();
            tokio::spawn(async move { run_with(&runner, config).await })
        };

        for _ in 0..200 {
            if runner.current_state() == ServiceState::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(runner.current_state(), ServiceState::Running);

        handler.handle(ControlCode::Pause);
        handler.handle(ControlCode::Stop);

        let outcome = task.await.unwrap();
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(
            host.states(),
            vec![
                (ServiceState::Running, 0),
                (ServiceState::Paused, 0),
                (ServiceState::Stopped, 0),
            ]
        );
        assert!(!runner.supervisor().is_alive().unwrap());
    }

    #[tokio::test]
    async fn test_stop_after_failing_exit_before_next_poll_wins() {
        let (runner, host) = runner();
        let handler = runner.control_handler();
        let mut config = shell("sleep 1; exit 42");
        config.expected_exit_code = Some(0);
        config.poll_interval = Duration::from_secs(60);

        let task = {
            let runner = runner.clone();
            tokio::spawn(async move { run_with(&runner, config).await })
        };

        for _ in 0..200 {
            if runner.current_state() == ServiceState::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(runner.current_state(), ServiceState::Running);

        for _ in 0..500 {
            if !runner.supervisor().is_alive().unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!runner.supervisor().is_alive().unwrap());
        assert_eq!(runner.supervisor().exit_code().unwrap(), 42);
        assert_eq!(runner.current_state(), ServiceState::Running);

        handler.handle(ControlCode::Stop);

        let outcome = task.await.unwrap();
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(
            host.states(),
            vec![(ServiceState::Running, 0), (ServiceState::Stopped, 0)]
        );
    }
}
