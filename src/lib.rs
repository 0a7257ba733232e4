//! Hauler - the execution core of a build agent.
//!
//! Hauler runs a job's steps in order, streams their output and timeline
//! records to a telemetry service in the background, and masks registered
//! secrets in everything it reports.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Job file loading, parsing, and validation
//! - [`context`] - Services shared by every job of an agent
//! - [`delivery`] - Timeline records, telemetry clients, and the delivery queue
//! - [`error`] - Error types and result aliases
//! - [`logging`] - Tracing setup with secret masking
//! - [`runner`] - The steps runner state machine and job execution
//! - [`secrets`] - Secret registration and output masking
//! - [`steps`] - Step results, execution contexts, and shell command steps
//!
//! # Example
//!
//! ```
//! use hauler::secrets::SecretMasker;
//! use hauler::steps::TaskResult;
//!
//! let masker = SecretMasker::new();
//! masker.add_value("hunter2");
//! assert_eq!(masker.mask("pw=hunter2"), "pw=********");
//!
//! // A continue-on-error failure never outranks a real one.
//! let result = TaskResult::merge(Some(TaskResult::SucceededWithIssues), TaskResult::Failed);
//! assert_eq!(result, Some(TaskResult::Failed));
//! ```
//!
//! For end-to-end job runs, see the integration tests.

pub mod cli;
pub mod config;
pub mod context;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod runner;
pub mod secrets;
pub mod steps;

pub use context::AgentContext;
pub use error::{HaulerError, Result};
