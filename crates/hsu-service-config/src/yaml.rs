//! YAML configuration provider.
//!
//! ```yaml
//! services:
//!   - name: my-app
//!     application: /opt/my-app/bin/server
//!     parameters: --port 8080
//!     directory: /opt/my-app
//!     environment:
//!       - RUST_LOG=info
//!     exit_code: 0
//!     runs_forever: false
//!     poll_interval: 500ms
//! ```

use crate::validation::{parse_environment, validate_service_config};
use crate::{ConfigProvider, ServiceConfig, DEFAULT_POLL_INTERVAL};
use anyhow::{anyhow, Context, Result};
use hsu_common::{ServiceError, ServiceName, ServiceResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Top-level YAML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlServicesFile {
    pub services: Vec<ServiceEntry>,
}

/// One service as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    /// Optional here so a missing key reports as a configuration error
    /// rather than a parse error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default)]
    pub parameters: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub runs_forever: bool,
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
}

impl YamlServicesFile {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")
    }

    pub fn find(&self, service_name: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|entry| entry.name == service_name)
    }
}

impl ServiceEntry {
    /// Convert to a snapshot; a working directory that does not exist is
    /// dropped so the child inherits the supervisor's.
    pub fn to_service_config(&self) -> Result<ServiceConfig> {
        let application_path = self
            .application
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| anyhow!("Application path is missing"))?;

        let environment = match self.environment {
            Some(ref entries) => Some(parse_environment(entries)?),
            None => None,
        };

        let working_directory = match self.directory {
            Some(ref dir) if dir.is_dir() => Some(dir.clone()),
            Some(ref dir) => {
                debug!("Working directory {} not found, inheriting", dir.display());
                None
            }
            None => None,
        };

        Ok(ServiceConfig {
            application_path: application_path.to_string(),
            arguments: self.parameters.clone(),
            working_directory,
            environment,
            expected_exit_code: self.exit_code,
            run_forever: self.runs_forever,
            poll_interval: self.poll_interval,
        })
    }
}

/// Reads the snapshot for a service from a YAML file at load time.
#[derive(Debug, Clone)]
pub struct YamlConfigProvider {
    path: PathBuf,
}

impl YamlConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_config(&self, service_name: &ServiceName) -> Result<ServiceConfig> {
        let file = YamlServicesFile::load_from_file(&self.path)?;
        let entry = file
            .find(service_name.as_str())
            .ok_or_else(|| anyhow!("Service {} not found in {}", service_name, self.path.display()))?;
        entry.to_service_config()
    }
}

impl ConfigProvider for YamlConfigProvider {
    fn load(&self, service_name: &ServiceName) -> ServiceResult<ServiceConfig> {
        let config = self
            .load_config(service_name)
            .map_err(|e| ServiceError::config(service_name.as_str(), format!("{:#}", e)))?;
        validate_service_config(service_name, &config)?;

        debug!(
            "Loaded configuration for {}: {} {}",
            service_name, config.application_path, config.arguments
        );
        Ok(config)
    }
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis();
        if millis % 1000 == 0 {
            serializer.serialize_str(&format!("{}s", millis / 1000))
        } else {
            serializer.serialize_str(&format!("{}ms", millis))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        // "ms" before "s", since "ms" ends with 's'
        if let Some(num_str) = s.strip_suffix("ms") {
            let millis: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num_str) = s.strip_suffix('s') {
            let secs: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num_str) = s.strip_suffix('m') {
            let mins: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
