//! Steps and their execution.
//!
//! - [`TaskResult`] - Step and job outcomes and the merge rule between them
//! - [`Step`] - The unit of work the runner schedules
//! - [`ExecutionContext`] - Per-step output, issues, and timeline record
//! - [`CommandStep`] - A step that runs a shell command
//! - [`LoggingCommand`] - `##vso[...]` commands a step writes to its output
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hauler::secrets::SecretMasker;
//! use hauler::steps::{CommandStep, ExecutionContext, Step, TaskResult};
//! use uuid::Uuid;
//!
//! # #[tokio::main]
//! # async fn main() -> hauler::Result<()> {
//! let job = ExecutionContext::new("build", Uuid::new_v4(), Arc::new(SecretMasker::new()));
//! let mut context = job.child("compile", 1);
//!
//! let step = CommandStep::new("compile", "cargo build");
//! let result = step.run(&mut context).await?;
//! assert_eq!(result, TaskResult::Succeeded);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod context;
pub mod logging_command;
pub mod result;
pub mod step;

pub use command::CommandStep;
pub use context::ExecutionContext;
pub use logging_command::LoggingCommand;
pub use result::TaskResult;
pub use step::{Step, StepFlags};
