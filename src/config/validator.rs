//! Job file validation rules.
//!
//! - Every step needs a name and a command
//! - Step names must be unique
//! - Delivery intervals and caps must be positive

use crate::config::schema::{DeliverySettings, JobConfig};
use crate::error::{HaulerError, Result};
use std::collections::HashSet;

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Step index if error is step-specific
    pub step: Option<usize>,
}

/// Validate a job and return all errors.
///
/// Collects every problem rather than stopping at the first one.
pub fn validate_job(config: &JobConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_steps(config));
    errors.extend(validate_delivery(&config.delivery));

    errors
}

fn validate_steps(config: &JobConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, step) in config.steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            errors.push(ValidationError {
                rule: "missing-name".to_string(),
                message: format!("Step #{} has no name", index + 1),
                step: Some(index),
            });
        } else if !seen.insert(step.name.as_str()) {
            errors.push(ValidationError {
                rule: "duplicate-name".to_string(),
                message: format!("Step name '{}' is used more than once", step.name),
                step: Some(index),
            });
        }

        if step.run.trim().is_empty() {
            errors.push(ValidationError {
                rule: "missing-command".to_string(),
                message: format!("Step #{} ('{}') has no 'run' command", index + 1, step.name),
                step: Some(index),
            });
        }
    }

    errors
}

fn validate_delivery(settings: &DeliverySettings) -> Vec<ValidationError> {
    settings
        .zero_fields()
        .into_iter()
        .map(|name| ValidationError {
            rule: "non-positive-delivery-setting".to_string(),
            message: format!("delivery.{} must be greater than zero", name),
            step: None,
        })
        .collect()
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &JobConfig) -> Result<()> {
    let errors = validate_job(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(HaulerError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
