//! Integration tests for the hauler binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_job(job: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("job.yml"), job).unwrap();
    temp
}

fn hauler(temp: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("hauler"));
    cmd.current_dir(temp.path()).env_remove("RUST_LOG");
    cmd
}

const SIMPLE_JOB: &str = r#"
name: simple
steps:
  - name: hello
    run: echo hello
"#;

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("hauler"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("hauler"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_run_without_job_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("hauler"));
    cmd.arg("run");
    cmd.assert().failure();
    Ok(())
}

#[test]
fn cli_missing_job_file_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    hauler(&temp)
        .args(["run", "missing.yml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Job file not found"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_runs_simple_job() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job(SIMPLE_JOB);
    hauler(&temp)
        .args(["run", "job.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/1] hello"))
        .stdout(predicate::str::contains("Job simple: succeeded"));

    assert!(temp.path().join("hauler-out").join("timelines").is_dir());
    assert!(temp.path().join("hauler-out").join("console").is_dir());
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_failing_job_exits_one() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job(
        r#"
name: broken
steps:
  - name: fail
    run: exit 7
  - name: never
    run: echo never
  - name: cleanup
    run: echo cleaning
    finally: true
"#,
    );
    hauler(&temp)
        .args(["run", "job.yml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("never skipped"))
        .stdout(predicate::str::contains("cleanup succeeded"))
        .stdout(predicate::str::contains("Job broken: failed"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_masks_secrets_in_console_and_logs() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job(
        r#"
name: leaky
steps:
  - name: leak
    run: echo the password is opensesame
"#,
    );
    hauler(&temp)
        .args(["run", "job.yml", "--secret", "opensesame", "--output", "out", "--debug"])
        .assert()
        .success()
        .stderr(predicate::str::contains("opensesame").not());

    let mut seen = String::new();
    for dir in ["console", "logs"] {
        for entry in fs::read_dir(temp.path().join("out").join(dir))? {
            seen.push_str(&fs::read_to_string(entry?.path())?);
        }
    }
    assert!(seen.contains("the password is ********"));
    assert!(!seen.contains("opensesame"));
    Ok(())
}

#[test]
fn cli_rejects_invalid_job() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job("steps:\n  - name: nothing\n");
    hauler(&temp)
        .args(["run", "job.yml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no 'run' command"));
    Ok(())
}
