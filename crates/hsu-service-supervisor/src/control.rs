//! Control handler: reacts to asynchronous requests from the host.
//!
//! Pause and Continue are advisory. They change the published state only;
//! the child and the monitor keep running.

use crate::stop_signal::StopSignal;
use crate::supervisor::ProcessSupervisor;
use hsu_service_state::{AcceptedControls, ServiceState, ServiceStateMachine};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Control codes delivered by the host, with the Win32 `SERVICE_CONTROL_*`
/// numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCode {
    Stop,
    Pause,
    Continue,
    Interrogate,
    Other(u32),
}

impl ControlCode {
    pub fn from_raw(code: u32) -> Self {
        match code {
            1 => ControlCode::Stop,
            2 => ControlCode::Pause,
            3 => ControlCode::Continue,
            4 => ControlCode::Interrogate,
            other => ControlCode::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResponse {
    Handled,
    NotImplemented,
}

/// Cheap to clone; every clone acts on the same service.
#[derive(Debug, Clone)]
pub struct ControlHandler {
    stop: Arc<StopSignal>,
    supervisor: Arc<ProcessSupervisor>,
    state: Arc<Mutex<ServiceStateMachine>>,
}

impl ControlHandler {
    pub(crate) fn new(
        stop: Arc<StopSignal>,
        supervisor: Arc<ProcessSupervisor>,
        state: Arc<Mutex<ServiceStateMachine>>,
    ) -> Self {
        Self {
            stop,
            supervisor,
            state,
        }
    }

    pub fn handle(&self, control: ControlCode) -> ControlResponse {
        let mut state = lock_state(&self.state);
        let current = state.current_state();

        match (control, current) {
            (
                ControlCode::Stop,
                ServiceState::StartPending | ServiceState::Running | ServiceState::Paused,
            ) => {
                info!("Stop requested in state {}", current);
                self.stop.set();
                self.supervisor.terminate();
                if let Err(e) = state.set_state_with_reason(
                    AcceptedControls::NONE,
                    ServiceState::Stopped,
                    0,
                    Some("stop control".to_string()),
                ) {
                    warn!("Stop: {}", e);
                }
                ControlResponse::Handled
            }
            (ControlCode::Pause, ServiceState::Running) => {
                self.transition(&mut state, ServiceState::Paused);
                ControlResponse::Handled
            }
            (ControlCode::Continue, ServiceState::Paused) => {
                self.transition(&mut state, ServiceState::Running);
                ControlResponse::Handled
            }
            (ControlCode::Interrogate, _) => {
                state.republish();
                ControlResponse::Handled
            }
            (ControlCode::Other(code), _) => {
                debug!("Ignoring unsupported control code {}", code);
                ControlResponse::NotImplemented
            }
            (control, current) => {
                debug!("Ignoring {:?} in state {}", control, current);
                ControlResponse::Handled
            }
        }
    }

    pub fn stop_signal(&self) -> &Arc<StopSignal> {
        &self.stop
    }

    fn transition(&self, state: &mut ServiceStateMachine, target: ServiceState) {
        info!("Service {} (advisory)", target);
        if let Err(e) = state.set_state(AcceptedControls::RUNNING, target, 0) {
            warn!("{:?}: {}", target, e);
        }
    }
}

pub(crate) fn lock_state(
    state: &Mutex<ServiceStateMachine>,
) -> MutexGuard<'_, ServiceStateMachine> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsu_common::ServiceResult;
    use hsu_service_state::{ServiceStatus, StatusReporter};

    #[derive(Default)]
    struct RecordingReporter {
        published: Mutex<Vec<ServiceStatus>>,
    }

    impl StatusReporter for RecordingReporter {
        fn publish(&self, status: &ServiceStatus) -> ServiceResult<()> {
            self.published.lock().unwrap().push(*status);
            Ok(())
        }
    }

    fn handler_in(state: ServiceState) -> (ControlHandler, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        let mut sm = ServiceStateMachine::new("test", reporter.clone());
        if state != ServiceState::StartPending {
            sm.set_state(AcceptedControls::RUNNING, ServiceState::Running, 0).unwrap();
            if state == ServiceState::Paused {
                sm.set_state(AcceptedControls::RUNNING, ServiceState::Paused, 0).unwrap();
            }
        }
        reporter.published.lock().unwrap().clear();

        let handler = ControlHandler::new(
            Arc::new(StopSignal::new()),
            Arc::new(ProcessSupervisor::new()),
            Arc::new(Mutex::new(sm)),
        );
        (handler, reporter)
    }

    fn states(reporter: &RecordingReporter) -> Vec<ServiceState> {
        reporter.published.lock().unwrap().iter().map(|s| s.state).collect()
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(ControlCode::from_raw(1), ControlCode::Stop);
        assert_eq!(ControlCode::from_raw(2), ControlCode::Pause);
        assert_eq!(ControlCode::from_raw(3), ControlCode::Continue);
        assert_eq!(ControlCode::from_raw(4), ControlCode::Interrogate);
        assert_eq!(ControlCode::from_raw(5), ControlCode::Other(5));
    }

    #[test]
    fn test_stop_while_running() {
        let (handler, reporter) = handler_in(ServiceState::Running);
        assert_eq!(handler.handle(ControlCode::Stop), ControlResponse::Handled);
        assert!(handler.stop_signal().is_set());

        let published = reporter.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].state, ServiceState::Stopped);
        assert_eq!(published[0].exit_code, 0);
    }

    #[test]
    fn test_stop_while_start_pending_and_paused() {
        for state in [ServiceState::StartPending, ServiceState::Paused] {
            let (handler, reporter) = handler_in(state);
            handler.handle(ControlCode::Stop);
            assert_eq!(states(&reporter), vec![ServiceState::Stopped]);
        }
    }

    #[test]
    fn test_second_stop_is_ignored() {
        let (handler, reporter) = handler_in(ServiceState::Running);
        handler.handle(ControlCode::Stop);
        handler.handle(ControlCode::Stop);
        assert_eq!(states(&reporter), vec![ServiceState::Stopped]);
    }

    #[test]
    fn test_pause_continue_round_trip() {
        let (handler, reporter) = handler_in(ServiceState::Running);
        handler.handle(ControlCode::Pause);
        handler.handle(ControlCode::Continue);
        assert_eq!(
            states(&reporter),
            vec![ServiceState::Paused, ServiceState::Running]
        );
        assert!(!handler.stop_signal().is_set());
    }

    #[test]
    fn test_invalid_controls_are_ignored() {
        let (handler, reporter) = handler_in(ServiceState::Running);
        handler.handle(ControlCode::Continue);

        let (paused, paused_reporter) = handler_in(ServiceState::Paused);
        paused.handle(ControlCode::Pause);

        let (pending, pending_reporter) = handler_in(ServiceState::StartPending);
        pending.handle(ControlCode::Pause);

        assert!(states(&reporter).is_empty());
        assert!(states(&paused_reporter).is_empty());
        assert!(states(&pending_reporter).is_empty());
    }

    #[test]
    fn test_unknown_control_not_implemented() {
        let (handler, reporter) = handler_in(ServiceState::Running);
        assert_eq!(
            handler.handle(ControlCode::Other(0x80)),
            ControlResponse::NotImplemented
        );
        assert!(states(&reporter).is_empty());
    }

    #[test]
    fn test_interrogate_republishes() {
        let (handler, reporter) = handler_in(ServiceState::Paused);
        handler.handle(ControlCode::Interrogate);
        assert_eq!(states(&reporter), vec![ServiceState::Paused]);
    }
}
