//! Process validation utilities.
//!
//! Checks run before a launch is attempted, so that an unusable application
//! path surfaces as a launch error instead of a child that dies immediately.

use hsu_common::{ServiceError, ServiceResult};

/// Strip one pair of surrounding double quotes, as callers quote paths that
/// contain spaces.
pub fn unquote(path: &str) -> &str {
    let trimmed = path.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
}

/// Validate that an executable path is present and, on Unix, resolvable and
/// executable.
///
/// On Unix the invocation string is handed to the shell, which would happily
/// start and then exit with 127 (missing) or 126 (not executable). Checking
/// up front keeps both a launch failure on every platform. On Windows process
/// creation itself reports them.
pub fn validate_executable(path: &str) -> ServiceResult<()> {
    let path = unquote(path);
    if path.is_empty() {
        return Err(ServiceError::launch(
            path,
            "Executable path cannot be empty",
            None,
        ));
    }

    #[cfg(unix)]
    {
        let candidate = std::path::Path::new(path);
        let found = if path.contains('/') {
            candidate.is_file()
        } else {
            which::which(path).is_ok()
        };

        if !found {
            return Err(ServiceError::launch(
                path,
                "Executable not found",
                Some(ENOENT),
            ));
        }

        if path.contains('/') && !is_executable(candidate) {
            return Err(ServiceError::launch(
                path,
                "Permission denied",
                Some(EACCES),
            ));
        }
    }

    Ok(())
}

#[cfg(unix)]
const ENOENT: i32 = 2;
#[cfg(unix)]
const EACCES: i32 = 13;

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
