//! Step execution orchestration.
//!
//! - [`StepsRunner`] - Decides which steps run and folds their results
//! - [`JobRunner`] - Wraps a steps run with a job record and a delivery queue

pub mod job;
pub mod steps;

pub use job::{JobOutcome, JobRequest, JobRunner};
pub use steps::{RunProgress, StepOutcome, StepsRunner};
