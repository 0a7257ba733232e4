//! Job file schema.
//!
//! These structs map one-to-one onto the YAML job file:
//!
//! ```yaml
//! name: build
//! secrets:
//!   values: ["literal-secret"]
//!   patterns:
//!     - pattern: "ghp_[A-Za-z0-9]{36}"
//! delivery:
//!   console_interval_ms: 200
//! steps:
//!   - name: compile
//!     run: cargo build
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HaulerError, Result};
use crate::secrets::{SecretEnvDetector, SecretMasker};

/// Root of a job file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Job display name
    pub name: String,

    /// Directory the steps run in, relative to the job file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Secrets to register before any step runs
    pub secrets: SecretsConfig,

    /// Delivery queue tuning
    pub delivery: DeliverySettings,

    /// Steps, in execution order
    pub steps: Vec<StepConfig>,
}

/// Secret sources for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Literal secret values
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    /// Regular-expression secrets
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<PatternConfig>,

    /// Environment variables whose values are secret, by exact name
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    /// Also register variables whose names look secret (`*_TOKEN`, ...)
    pub detect_env: bool,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            patterns: Vec::new(),
            env: Vec::new(),
            detect_env: true,
        }
    }
}

impl SecretsConfig {
    /// Register every configured secret with `masker`.
    ///
    /// `vars` is the environment the steps will see. Returns the number of
    /// matchers added.
    pub fn register(
        &self,
        masker: &SecretMasker,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<usize> {
        let before = masker.matcher_count();

        masker.add_values(self.values.iter().cloned());
        for pattern in &self.patterns {
            masker.add_regex(pattern.pattern.clone(), pattern.case_insensitive)?;
        }

        let detector = if self.detect_env {
            SecretEnvDetector::with_builtins_and_custom(&self.env)
        } else {
            SecretEnvDetector::with_names(&self.env)
        };
        masker.register_env_secrets(&detector, vars);

        Ok(masker.matcher_count() - before)
    }
}

/// A regular-expression secret.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternConfig {
    pub pattern: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub case_insensitive: bool,
}

/// Intervals and per-cycle caps of the delivery queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    /// Wait between console drain cycles
    pub console_interval_ms: u64,

    /// Wait between timeline drain cycles
    pub timeline_interval_ms: u64,

    /// Wait between upload drain cycles
    pub upload_interval_ms: u64,

    /// Lines per console batch
    pub console_batch_size: usize,

    /// Console batches sent per cycle
    pub console_batches_per_cycle: usize,

    /// Records sent per timeline per cycle
    pub timeline_records_per_cycle: usize,

    /// Files uploaded per cycle
    pub uploads_per_cycle: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            console_interval_ms: 200,
            timeline_interval_ms: 500,
            upload_interval_ms: 1000,
            console_batch_size: 100,
            console_batches_per_cycle: 5,
            timeline_records_per_cycle: 25,
            uploads_per_cycle: 10,
        }
    }
}

impl DeliverySettings {
    pub fn console_interval(&self) -> Duration {
        Duration::from_millis(self.console_interval_ms)
    }

    pub fn timeline_interval(&self) -> Duration {
        Duration::from_millis(self.timeline_interval_ms)
    }

    pub fn upload_interval(&self) -> Duration {
        Duration::from_millis(self.upload_interval_ms)
    }

    /// Names of settings that are zero. Every interval and cap must be positive.
    pub fn zero_fields(&self) -> Vec<&'static str> {
        let fields = [
            ("console_interval_ms", self.console_interval_ms == 0),
            ("timeline_interval_ms", self.timeline_interval_ms == 0),
            ("upload_interval_ms", self.upload_interval_ms == 0),
            ("console_batch_size", self.console_batch_size == 0),
            ("console_batches_per_cycle", self.console_batches_per_cycle == 0),
            ("timeline_records_per_cycle", self.timeline_records_per_cycle == 0),
            ("uploads_per_cycle", self.uploads_per_cycle == 0),
        ];
        fields
            .into_iter()
            .filter(|(_, zero)| *zero)
            .map(|(name, _)| name)
            .collect()
    }

    /// Fails with [`HaulerError::InvalidArgument`] naming the first zero setting.
    pub fn validate(&self) -> Result<()> {
        match self.zero_fields().first() {
            Some(name) => Err(HaulerError::invalid_argument(
                format!("delivery.{}", name),
                "must be greater than zero",
            )),
            None => Ok(()),
        }
    }
}

/// One step of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Display name
    pub name: String,

    /// Shell command to run
    pub run: String,

    /// Skip the step entirely when false
    pub enabled: bool,

    /// Run even after an earlier non-critical failure
    #[serde(skip_serializing_if = "is_false")]
    pub always_run: bool,

    /// A failure only marks the job as succeeded with issues
    #[serde(skip_serializing_if = "is_false")]
    pub continue_on_error: bool,

    /// A failure stops everything except finally steps
    #[serde(skip_serializing_if = "is_false")]
    pub critical: bool,

    /// Cleanup step that runs regardless of earlier failures
    #[serde(rename = "finally", skip_serializing_if = "is_false")]
    pub is_finally: bool,

    /// Extra environment variables for the command
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            run: String::new(),
            enabled: true,
            always_run: false,
            continue_on_error: false,
            critical: false,
            is_finally: false,
            env: HashMap::new(),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}
