//! # HSU Process
//!
//! Low-level process operations for the HSU service wrapper.
//!
//! This crate provides the primitives the supervisor is built on:
//! - Command line formatting and child launch
//! - Non-blocking liveness probing and exit-code retrieval
//! - Idempotent forced termination
//! - Executable validation

pub mod execute;
pub mod handle;
pub mod validation;

// Re-export main types
pub use execute::{command_line, launch, CommandSpec};
pub use handle::ChildHandle;
pub use validation::{unquote, validate_executable};
