//! Error types for hauler operations.
//!
//! This module defines [`HaulerError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Contract violations (nil ids, empty required arguments) fail fast with
//!   [`HaulerError::InvalidArgument`]
//! - Delivery failures are [`HaulerError::Telemetry`]; the queue decides
//!   whether to retry, drop, or surface them
//! - Failures during the final queue drain are collected into
//!   [`HaulerError::QueueDrain`]
//! - Use `anyhow::Error` (via `HaulerError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for hauler operations.
#[derive(Debug, Error)]
pub enum HaulerError {
    /// Job file not found at expected location.
    #[error("Job file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse job file.
    #[error("Failed to parse job file at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid job structure or values.
    #[error("Invalid job configuration: {message}")]
    ConfigValidationError { message: String },

    /// A required argument was missing or empty.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// A secret pattern failed to compile.
    #[error("Invalid secret pattern '{pattern}': {message}")]
    InvalidSecretPattern { pattern: String, message: String },

    /// A call to the remote telemetry service failed.
    #[error("Telemetry call '{operation}' failed: {message}")]
    Telemetry { operation: String, message: String },

    /// Step execution failed unexpectedly.
    #[error("Step '{step}' failed: {message}")]
    StepExecutionError { step: String, message: String },

    /// Some sends in one delivery cycle failed.
    #[error("{} of the '{queue}' queue's sends failed: {}", errors.len(), join_errors(errors))]
    DeliveryFailed {
        queue: String,
        errors: Vec<HaulerError>,
    },

    /// Work was enqueued after the delivery queue shut down.
    #[error("Delivery queue is closed")]
    QueueClosed,

    /// One or more queues failed while draining at shutdown.
    #[error("{} failure(s) while draining delivery queues: {}", errors.len(), join_errors(errors))]
    QueueDrain { errors: Vec<HaulerError> },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HaulerError {
    /// Shorthand for a failed telemetry call.
    pub fn telemetry(operation: impl Into<String>, message: impl Into<String>) -> Self {
        HaulerError::Telemetry {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a contract violation.
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        HaulerError::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }
}

fn join_errors(errors: &[HaulerError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for hauler operations.
pub type Result<T> = std::result::Result<T, HaulerError>;
