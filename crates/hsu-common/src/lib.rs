//! # HSU Common
//!
//! Common types shared across the HSU service wrapper crates.
//!
//! This crate provides the foundational pieces every other crate builds on:
//! the error taxonomy with its startup exit-code mapping, and the service
//! name type used as the configuration key.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{
    ServiceError, ServiceResult, ERROR_BAD_CONFIGURATION, ERROR_PROCESS_ABORTED,
    ERROR_SERVICE_SPECIFIC_ERROR,
};
pub use types::{ServiceName, DEFAULT_SERVICE_NAME};
