//! Process execution primitives.
//!
//! This module turns a [`CommandSpec`] into a running child and hands back
//! the [`ChildHandle`] that owns it.

use crate::handle::ChildHandle;
use crate::validation::{unquote, validate_executable};
use hsu_common::{ServiceError, ServiceResult};
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, info};

/// Everything needed to start the supervised child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable path, optionally wrapped in double quotes.
    pub application_path: String,
    /// Argument string appended verbatim after the path.
    pub arguments: String,
    /// Working directory; `None` inherits the supervisor's.
    pub working_directory: Option<PathBuf>,
    /// Complete environment block; `None` inherits the supervisor's.
    pub environment: Option<Vec<(String, String)>>,
}

impl CommandSpec {
    pub fn new(application_path: impl Into<String>) -> Self {
        Self {
            application_path: application_path.into(),
            ..Default::default()
        }
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    /// The full invocation string, path and arguments joined by one space.
    pub fn command_line(&self) -> String {
        command_line(&self.application_path, &self.arguments)
    }
}

/// Join a path and an argument string with a single space.
///
/// No quoting or escaping is performed: callers quote paths containing
/// spaces themselves. An empty argument string yields the path alone.
pub fn command_line(application_path: &str, arguments: &str) -> String {
    if arguments.is_empty() {
        application_path.to_string()
    } else {
        format!("{} {}", application_path, arguments)
    }
}

/// Launch the child described by `spec`.
///
/// The child gets no window and a null stdin. Any OS-level creation failure
/// (bad path, permissions, resource exhaustion) is returned as
/// [`ServiceError::Launch`].
pub fn launch(spec: &CommandSpec) -> ServiceResult<ChildHandle> {
    let command_line = spec.command_line();
    validate_executable(&spec.application_path)?;

    let mut cmd = build_command(spec);
    cmd.stdin(Stdio::null());

    if let Some(ref dir) = spec.working_directory {
        cmd.current_dir(dir);
    }

    if let Some(ref environment) = spec.environment {
        cmd.env_clear();
        cmd.envs(environment.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    debug!("Launching child: {}", command_line);

    // kill_on_drop stays off: terminate() is the only path that kills.
    let mut cmd = tokio::process::Command::from(cmd);
    match cmd.spawn() {
        Ok(child) => {
            let pid = child.id().unwrap_or(0);
            info!("Child launched: {} (PID: {})", command_line, pid);
            Ok(ChildHandle::new(child, pid, command_line))
        }
        Err(e) => Err(ServiceError::launch_failed(command_line, &e)),
    }
}

#[cfg(windows)]
fn build_command(spec: &CommandSpec) -> std::process::Command {
    use std::os::windows::process::CommandExt;

    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut cmd = std::process::Command::new(unquote(&spec.application_path));
    if !spec.arguments.is_empty() {
        cmd.raw_arg(&spec.arguments);
    }
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(windows))]
fn build_command(spec: &CommandSpec) -> std::process::Command {
    // The shell applies the caller's quoting; exec makes the child replace
    // it so the handle refers to the application itself.
    let invocation = command_line(&spec.application_path, &spec.arguments);
    debug!("Resolved program: {}", unquote(&spec.application_path));

    let mut cmd = std::process::Command::new("/bin/sh");
    cmd.arg("-c").arg(format!("exec {}", invocation));
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_joins_with_single_space() {
        assert_eq!(command_line("app.exe", "-a -b"), "app.exe -a -b");
        assert_eq!(
            command_line("\"C:\\Program Files\\app.exe\"", "--flag"),
            "\"C:\\Program Files\\app.exe\" --flag"
        );
    }

    #[test]
    fn test_command_line_without_arguments() {
        assert_eq!(command_line("app.exe", ""), "app.exe");
    }

    #[test]
    fn test_command_line_is_verbatim() {
        // No escaping of embedded quotes or spaces.
        assert_eq!(command_line("app", "\"a b\"  c"), "app \"a b\"  c");
    }

    #[tokio::test]
    async fn test_launch_empty_path_fails() {
        let err = launch(&CommandSpec::new("")).unwrap_err();
        assert!(matches!(err, ServiceError::Launch { .. }));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_launch_missing_executable_fails() {
        let err = launch(&CommandSpec::new("/no/such/dir/hsu-app")).unwrap_err();
        match err {
            ServiceError::Launch { os_code, .. } => assert_eq!(os_code, Some(2)),
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_launch_non_executable_file_fails() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-exec");
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = launch(&CommandSpec::new(path.to_str().unwrap())).unwrap_err();
        match err {
            ServiceError::Launch { os_code, .. } => assert_eq!(os_code, Some(13)),
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_launch_with_environment_block() {
        let dir = std::env::temp_dir();
        let marker = dir.join(format!("hsu-env-{}", std::process::id()));
        let spec = CommandSpec {
            application_path: "/bin/sh".to_string(),
            arguments: format!("-c 'echo \"$HSU_TEST_VALUE\" > {}'", marker.display()),
            working_directory: Some(dir.clone()),
            environment: Some(vec![("HSU_TEST_VALUE".to_string(), "from-block".to_string())]),
        };

        let handle = launch(&spec).unwrap();
        let code = handle.wait_for_exit(std::time::Duration::from_secs(10)).await;
        assert_eq!(code.unwrap(), 0);

        let written = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(written.trim(), "from-block");
        let _ = std::fs::remove_file(marker);
    }
}
