//! Windows Service Control Manager host.
//!
//! The SCM calls `service_main` on its own thread after
//! `StartServiceCtrlDispatcherW`, and delivers controls on the dispatcher
//! thread. Both are plain `extern "system"` callbacks, so the runner's
//! control handler and the host options live in process-wide statics.

use crate::{build_runtime, complete, config_provider, HostOptions, ServiceHost};
use hsu_common::{ServiceError, ServiceResult};
use hsu_service_state::{AcceptedControls, ServiceState, ServiceStatus, StatusReporter};
use hsu_service_supervisor::{ControlCode, ControlHandler, ControlResponse, ServiceRunner};
use std::ffi::c_void;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{error, info};
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{ERROR_CALL_NOT_IMPLEMENTED, NO_ERROR};
use windows::Win32::System::Services::{
    RegisterServiceCtrlHandlerExW, SetServiceStatus, StartServiceCtrlDispatcherW,
    SERVICE_STATUS, SERVICE_STATUS_CURRENT_STATE, SERVICE_STATUS_HANDLE,
    SERVICE_TABLE_ENTRYW, SERVICE_WIN32_OWN_PROCESS,
};

static OPTIONS: OnceLock<HostOptions> = OnceLock::new();
static HANDLER: OnceLock<ControlHandler> = OnceLock::new();
static EXIT_CODE: AtomicI32 = AtomicI32::new(0);

/// Publishes status with `SetServiceStatus`.
#[derive(Debug)]
pub struct ScmStatusReporter {
    handle: SERVICE_STATUS_HANDLE,
}

// The status handle is valid for the life of the process and
// SetServiceStatus may be called from any thread.
unsafe impl Send for ScmStatusReporter {}
unsafe impl Sync for ScmStatusReporter {}

impl StatusReporter for ScmStatusReporter {
    fn publish(&self, status: &ServiceStatus) -> ServiceResult<()> {
        let raw = SERVICE_STATUS {
            dwServiceType: SERVICE_WIN32_OWN_PROCESS,
            dwCurrentState: SERVICE_STATUS_CURRENT_STATE(status.state.as_raw()),
            dwControlsAccepted: status.accepted_controls.bits(),
            dwWin32ExitCode: status.exit_code,
            dwServiceSpecificExitCode: 0,
            dwCheckPoint: 0,
            dwWaitHint: 0,
        };
        unsafe { SetServiceStatus(self.handle, &raw) }
            .map_err(|e| ServiceError::publish(status.state.to_string(), e.to_string()))
    }
}

/// Runs the service under the Service Control Manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsServiceHost;

impl ServiceHost for WindowsServiceHost {
    fn run(&self, options: &HostOptions) -> ServiceResult<i32> {
        let service = options.service_name.as_str();
        OPTIONS
            .set(options.clone())
            .map_err(|_| ServiceError::registration(service, "Dispatcher already started", None))?;

        let mut name = to_wide(service);
        let table = [
            SERVICE_TABLE_ENTRYW {
                lpServiceName: PWSTR(name.as_mut_ptr()),
                lpServiceProc: Some(service_main),
            },
            SERVICE_TABLE_ENTRYW::default(),
        ];

        info!("Connecting service {} to the dispatcher", service);
        unsafe { StartServiceCtrlDispatcherW(table.as_ptr()) }
            .map_err(|e| ServiceError::registration(service, e.to_string(), Some(win32_code(&e))))?;

        Ok(EXIT_CODE.load(Ordering::SeqCst))
    }
}

unsafe extern "system" fn service_main(_argc: u32, _argv: *mut PWSTR) {
    let Some(options) = OPTIONS.get() else {
        return;
    };
    EXIT_CODE.store(run_service(options), Ordering::SeqCst);
}

fn run_service(options: &HostOptions) -> i32 {
    let service = &options.service_name;
    let name = to_wide(service.as_str());

    let handle = match unsafe {
        RegisterServiceCtrlHandlerExW(PCWSTR(name.as_ptr()), Some(control_handler), None)
    } {
        Ok(handle) => handle,
        Err(e) => {
            error!("RegisterServiceCtrlHandlerExW failed: {}", e);
            return win32_code(&e);
        }
    };

    let reporter = Arc::new(ScmStatusReporter { handle });
    let _ = reporter.publish(&ServiceStatus {
        accepted_controls: AcceptedControls::NONE,
        state: ServiceState::StartPending,
        exit_code: 0,
    });

    let runner = ServiceRunner::new(service.clone(), reporter.clone());
    let _ = HANDLER.set(runner.control_handler());

    let runtime = match build_runtime(service) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("{}", e);
            let code = e.exit_code();
            let _ = reporter.publish(&ServiceStatus {
                accepted_controls: AcceptedControls::NONE,
                state: ServiceState::Stopped,
                exit_code: code,
            });
            return code as i32;
        }
    };

    let provider = config_provider(options);
    let outcome = runtime.block_on(runner.run(provider.as_ref()));
    complete(&runner, outcome)
}

unsafe extern "system" fn control_handler(
    control: u32,
    _event_type: u32,
    _event_data: *mut c_void,
    _context: *mut c_void,
) -> u32 {
    let Some(handler) = HANDLER.get() else {
        return NO_ERROR.0;
    };
    match handler.handle(ControlCode::from_raw(control)) {
        ControlResponse::Handled => NO_ERROR.0,
        ControlResponse::NotImplemented => ERROR_CALL_NOT_IMPLEMENTED.0,
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Win32 error code carried in a `windows` error's HRESULT.
fn win32_code(e: &windows::core::Error) -> i32 {
    e.code().0 & 0xFFFF
}
