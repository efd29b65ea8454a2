//! Core domain types shared by the service wrapper crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name the wrapper registers under when none is given.
pub const DEFAULT_SERVICE_NAME: &str = "hsu-service-wrapper";

/// Service instance name - the key under which configuration is stored and
/// the name the host runtime knows the service by.
///
/// # Example
/// ```
/// use hsu_common::ServiceName;
///
/// let name = ServiceName::from("my-app");
/// assert_eq!(name.as_str(), "my-app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a new ServiceName from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the service name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ServiceName {
    fn default() -> Self {
        Self(DEFAULT_SERVICE_NAME.to_string())
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
