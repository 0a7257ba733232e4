//! Task result model and the job-level merge rule.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HaulerError;

/// Outcome of a step or a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Canceled,
    Skipped,
    Abandoned,
}

impl TaskResult {
    /// Rank used by [`TaskResult::merge`]. `None` for results that never
    /// change the job result.
    fn severity(self) -> Option<u8> {
        match self {
            TaskResult::Succeeded => Some(0),
            TaskResult::SucceededWithIssues => Some(1),
            TaskResult::Failed => Some(2),
            TaskResult::Canceled | TaskResult::Skipped | TaskResult::Abandoned => None,
        }
    }

    /// Fold a step's contribution into the current job result.
    ///
    /// `Failed` beats `SucceededWithIssues`, which beats `Succeeded`. A job
    /// result is never downgraded, and `Canceled`, `Skipped` and `Abandoned`
    /// leave it untouched.
    ///
    /// # Example
    ///
    /// ```
    /// use hauler::steps::TaskResult;
    ///
    /// let job = TaskResult::merge(None, TaskResult::SucceededWithIssues);
    /// let job = TaskResult::merge(job, TaskResult::Succeeded);
    /// assert_eq!(job, Some(TaskResult::SucceededWithIssues));
    ///
    /// let job = TaskResult::merge(job, TaskResult::Abandoned);
    /// assert_eq!(job, Some(TaskResult::SucceededWithIssues));
    /// ```
    pub fn merge(current: Option<TaskResult>, incoming: TaskResult) -> Option<TaskResult> {
        let Some(rank) = incoming.severity() else {
            return current;
        };
        match current {
            Some(existing) if existing.severity().unwrap_or(0) >= rank => Some(existing),
            _ => Some(incoming),
        }
    }

    /// Whether a job with this result counts as passing.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            TaskResult::Succeeded | TaskResult::SucceededWithIssues
        )
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TaskResult::Succeeded => "succeeded",
            TaskResult::SucceededWithIssues => "succeeded with issues",
            TaskResult::Failed => "failed",
            TaskResult::Canceled => "canceled",
            TaskResult::Skipped => "skipped",
            TaskResult::Abandoned => "abandoned",
        };
        write!(f, "{}", text)
    }
}

/// Parses result names case-insensitively, e.g. `SucceededWithIssues`.
impl FromStr for TaskResult {
    type Err = HaulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "succeeded" => Ok(TaskResult::Succeeded),
            "succeededwithissues" => Ok(TaskResult::SucceededWithIssues),
            "failed" => Ok(TaskResult::Failed),
            "canceled" | "cancelled" => Ok(TaskResult::Canceled),
            "skipped" => Ok(TaskResult::Skipped),
            "abandoned" => Ok(TaskResult::Abandoned),
            _ => Err(HaulerError::invalid_argument(
                "result",
                format!("unknown task result '{}'", s),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(results: &[TaskResult]) -> TaskResult {
        results
            .iter()
            .fold(None, |job, r| TaskResult::merge(job, *r))
            .unwrap_or(TaskResult::Succeeded)
    }

    #[test]
    fn failed_wins() {
        assert_eq!(
            fold(&[TaskResult::Succeeded, TaskResult::Failed, TaskResult::Succeeded]),
            TaskResult::Failed
        );
        assert_eq!(
            fold(&[TaskResult::Failed, TaskResult::SucceededWithIssues]),
            TaskResult::Failed
        );
    }

    #[test]
    fn issues_beat_success() {
        assert_eq!(
            fold(&[TaskResult::SucceededWithIssues, TaskResult::Succeeded]),
            TaskResult::SucceededWithIssues
        );
    }

    #[test]
    fn inert_results_contribute_nothing() {
        assert_eq!(fold(&[TaskResult::Abandoned]), TaskResult::Succeeded);
        assert_eq!(fold(&[TaskResult::Canceled]), TaskResult::Succeeded);
        assert_eq!(fold(&[TaskResult::Skipped]), TaskResult::Succeeded);
        assert_eq!(
            TaskResult::merge(Some(TaskResult::Failed), TaskResult::Canceled),
            Some(TaskResult::Failed)
        );
    }

    #[test]
    fn none_stays_none_for_inert_results() {
        assert_eq!(TaskResult::merge(None, TaskResult::Skipped), None);
    }

    #[test]
    fn is_success() {
        assert!(TaskResult::Succeeded.is_success());
        assert!(TaskResult::SucceededWithIssues.is_success());
        assert!(!TaskResult::Failed.is_success());
        assert!(!TaskResult::Canceled.is_success());
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Succeeded".parse::<TaskResult>().unwrap(), TaskResult::Succeeded);
        assert_eq!(
            "succeededWithIssues".parse::<TaskResult>().unwrap(),
            TaskResult::SucceededWithIssues
        );
        assert_eq!("FAILED".parse::<TaskResult>().unwrap(), TaskResult::Failed);
        assert_eq!("Cancelled".parse::<TaskResult>().unwrap(), TaskResult::Canceled);
        assert!("done".parse::<TaskResult>().is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&TaskResult::SucceededWithIssues).unwrap();
        assert_eq!(json, "\"succeededWithIssues\"");
    }
}
