//! Job file loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File loading in [`loader`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use hauler::config::load_job_config;
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let path = temp.path().join("job.yml");
//! fs::write(&path, "name: build\nsteps:\n  - name: hello\n    run: echo hello\n").unwrap();
//!
//! let job = load_job_config(&path).unwrap();
//! assert_eq!(job.name, "build");
//! assert_eq!(job.delivery.console_batch_size, 100);
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{load_job_config, parse_job_config};
pub use schema::{DeliverySettings, JobConfig, PatternConfig, SecretsConfig, StepConfig};
pub use validator::{validate, validate_job, ValidationError};
