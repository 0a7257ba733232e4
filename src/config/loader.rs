//! Job file loading.

use crate::config::schema::JobConfig;
use crate::config::validator::validate;
use crate::error::{HaulerError, Result};
use std::fs;
use std::path::Path;

/// Load, parse, and validate a job file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
/// Returns `ConfigValidationError` if the job is malformed.
pub fn load_job_config(path: &Path) -> Result<JobConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            HaulerError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            HaulerError::Io(e)
        }
    })?;

    let config = parse_job_config(&content, path)?;
    validate(&config)?;
    tracing::debug!(path = %path.display(), steps = config.steps.len(), "loaded job file");
    Ok(config)
}

/// Parse YAML content into a [`JobConfig`] without validating it.
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_job_config(content: &str, source_path: &Path) -> Result<JobConfig> {
    if content.trim().is_empty() {
        return Ok(JobConfig::default());
    }

    serde_yaml::from_str(content).map_err(|e| HaulerError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_job_config_parses_valid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("job.yml");
        fs::write(
            &path,
            "name: build\nsteps:\n  - name: compile\n    run: echo hi\n",
        )
        .unwrap();

        let config = load_job_config(&path).unwrap();
        assert_eq!(config.name, "build");
        assert_eq!(config.steps.len(), 1);
        assert_eq!(config.steps[0].run, "echo hi");
    }

    #[test]
    fn load_job_config_returns_not_found_error() {
        let result = load_job_config(Path::new("/nonexistent/job.yml"));
        assert!(matches!(result, Err(HaulerError::ConfigNotFound { .. })));
    }

    #[test]
    fn parse_job_config_returns_parse_error_for_invalid_yaml() {
        let result = parse_job_config("steps: [", Path::new("job.yml"));
        assert!(matches!(result, Err(HaulerError::ConfigParseError { .. })));
    }

    #[test]
    fn parse_job_config_handles_empty_content() {
        let config = parse_job_config("", Path::new("job.yml")).unwrap();
        assert!(config.steps.is_empty());
    }

    #[test]
    fn load_job_config_validates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("job.yml");
        fs::write(&path, "steps:\n  - name: compile\n").unwrap();

        let result = load_job_config(&path);
        assert!(matches!(
            result,
            Err(HaulerError::ConfigValidationError { .. })
        ));
    }
}
