//! Configuration validation.

use crate::ServiceConfig;
use anyhow::{anyhow, Result};
use hsu_common::{ServiceError, ServiceName, ServiceResult};

/// Validate a snapshot before it is handed to the supervisor.
pub fn validate_service_config(service: &ServiceName, config: &ServiceConfig) -> ServiceResult<()> {
    check_config(config).map_err(|e| ServiceError::config(service.as_str(), e.to_string()))
}

fn check_config(config: &ServiceConfig) -> Result<()> {
    if config.application_path.trim().is_empty() {
        return Err(anyhow!("Application path is missing"));
    }

    if config.poll_interval.is_zero() {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }

    if let Some(ref environment) = config.environment {
        for (key, _) in environment {
            check_env_key(key)?;
        }
    }

    Ok(())
}

/// Parse `KEY=VALUE` entries into an environment block.
///
/// The value may be empty and may itself contain `=`; the key may not be
/// empty. Blank entries are skipped.
pub fn parse_environment<I, S>(entries: I) -> Result<Vec<(String, String)>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut block = Vec::new();
    for entry in entries {
        let entry = entry.as_ref();
        if entry.is_empty() {
            continue;
        }

        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Malformed environment entry (expected KEY=VALUE): {}", entry))?;
        check_env_key(key)?;
        block.push((key.to_string(), value.to_string()));
    }
    Ok(block)
}

fn check_env_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(anyhow!("Environment variable name cannot be empty"));
    }
    if key.contains('\0') {
        return Err(anyhow!("Environment variable name contains NUL: {:?}", key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_environment() {
        let block = parse_environment(["PATH=/usr/bin", "EMPTY=", "EQ=a=b", ""]).unwrap();
        assert_eq!(
            block,
            vec![
                ("PATH".to_string(), "/usr/bin".to_string()),
                ("EMPTY".to_string(), String::new()),
                ("EQ".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_environment_rejects_malformed() {
        assert!(parse_environment(["NOEQUALS"]).is_err());
        assert!(parse_environment(["=value"]).is_err());
    }

    #[test]
    fn test_validate_service_config() {
        let name = ServiceName::from("svc");
        assert!(validate_service_config(&name, &ServiceConfig::new("app")).is_ok());
        assert!(validate_service_config(&name, &ServiceConfig::new("   ")).is_err());

        let mut config = ServiceConfig::new("app");
        config.poll_interval = Duration::ZERO;
        let err = validate_service_config(&name, &config).unwrap_err();
        assert!(err.to_string().contains("Poll interval"));
    }
}
