//! Windows registry configuration provider.
//!
//! Values are read from
//! `HKLM\SYSTEM\CurrentControlSet\Services\<service>\Parameters`:
//!
//! | value            | type                   |
//! |------------------|------------------------|
//! | `Application`    | REG_SZ / REG_EXPAND_SZ |
//! | `AppParameters`  | REG_SZ                 |
//! | `AppDirectory`   | REG_SZ                 |
//! | `AppEnvironment` | REG_MULTI_SZ           |
//! | `AppExitCode`    | REG_DWORD              |
//! | `AppRunsForever` | REG_DWORD              |

use crate::validation::{parse_environment, validate_service_config};
use crate::{ConfigProvider, ServiceConfig};
use hsu_common::{ServiceError, ServiceName, ServiceResult};
use tracing::{debug, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::System::Registry::{
    RegCloseKey, RegOpenKeyExW, RegQueryValueExW, HKEY, HKEY_LOCAL_MACHINE, KEY_READ,
    REG_DWORD, REG_EXPAND_SZ, REG_MULTI_SZ, REG_SZ, REG_VALUE_TYPE,
};

const MAX_DATA_LENGTH: usize = 8192;

/// Reads the snapshot from the service's `Parameters` registry key.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfigProvider;

impl RegistryConfigProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn key_path(service_name: &ServiceName) -> String {
        format!(
            "SYSTEM\\CurrentControlSet\\Services\\{}\\Parameters",
            service_name
        )
    }
}

impl ConfigProvider for RegistryConfigProvider {
    fn load(&self, service_name: &ServiceName) -> ServiceResult<ServiceConfig> {
        let service = service_name.as_str();
        let key = ParametersKey::open(&Self::key_path(service_name))
            .map_err(|code| ServiceError::config(service, format!("Cannot open Parameters key (error {})", code.0)))?;

        let application_path = key
            .string("Application")
            .map_err(|code| ServiceError::config(service, format!("Application value is missing (error {})", code.0)))?;
        if application_path.trim().is_empty() {
            return Err(ServiceError::config(service, "Application value is empty"));
        }

        let mut config = ServiceConfig::new(application_path);
        config.arguments = key.string("AppParameters").unwrap_or_default();

        config.working_directory = match key.string("AppDirectory") {
            Ok(dir) if !dir.is_empty() => Some(dir.into()),
            _ => std::env::current_dir().ok(),
        };

        config.environment = match key.multi_string("AppEnvironment") {
            Ok(entries) => Some(
                parse_environment(&entries).map_err(|e| ServiceError::config(service, e.to_string()))?,
            ),
            Err(code) if code == ERROR_FILE_NOT_FOUND => None,
            Err(code) => {
                warn!("AppEnvironment unreadable (error {}), inheriting", code.0);
                None
            }
        };

        config.expected_exit_code = key.dword("AppExitCode").ok().map(|code| code as i32);
        config.run_forever = key.dword("AppRunsForever").map(|v| v != 0).unwrap_or(false);

        validate_service_config(service_name, &config)?;
        debug!("Loaded registry configuration for {}", service_name);
        Ok(config)
    }
}

/// Open registry key, closed on drop.
struct ParametersKey(HKEY);

impl ParametersKey {
    fn open(path: &str) -> Result<Self, WIN32_ERROR> {
        let path = to_wide(path);
        let mut hkey = HKEY::default();
        let status = unsafe {
            RegOpenKeyExW(HKEY_LOCAL_MACHINE, PCWSTR(path.as_ptr()), 0, KEY_READ, &mut hkey)
        };
        if status != ERROR_SUCCESS {
            return Err(status);
        }
        Ok(Self(hkey))
    }

    fn query(&self, name: &str) -> Result<(REG_VALUE_TYPE, Vec<u8>), WIN32_ERROR> {
        let name = to_wide(name);
        let mut value_type = REG_VALUE_TYPE::default();
        let mut data = vec![0u8; MAX_DATA_LENGTH * 2];
        let mut len = data.len() as u32;

        let status = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR(name.as_ptr()),
                None,
                Some(&mut value_type),
                Some(data.as_mut_ptr()),
                Some(&mut len),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(status);
        }

        data.truncate(len as usize);
        Ok((value_type, data))
    }

    fn string(&self, name: &str) -> Result<String, WIN32_ERROR> {
        match self.query(name)? {
            (t, data) if t == REG_SZ || t == REG_EXPAND_SZ => Ok(from_wide(&data)
                .into_iter()
                .next()
                .unwrap_or_default()),
            _ => Err(ERROR_FILE_NOT_FOUND),
        }
    }

    fn multi_string(&self, name: &str) -> Result<Vec<String>, WIN32_ERROR> {
        match self.query(name)? {
            (t, data) if t == REG_MULTI_SZ || t == REG_SZ => Ok(from_wide(&data)),
            _ => Err(ERROR_FILE_NOT_FOUND),
        }
    }

    fn dword(&self, name: &str) -> Result<u32, WIN32_ERROR> {
        match self.query(name)? {
            (t, data) if t == REG_DWORD && data.len() >= 4 => {
                Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            _ => Err(ERROR_FILE_NOT_FOUND),
        }
    }
}

impl Drop for ParametersKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Split a UTF-16LE buffer on NULs, dropping empty strings.
fn from_wide(data: &[u8]) -> Vec<String> {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    units
        .split(|&unit| unit == 0)
        .filter(|s| !s.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}
