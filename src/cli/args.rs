//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Hauler - Build agent job runner.
#[derive(Debug, Parser)]
#[command(name = "hauler")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a job file
    Run(RunArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the job file
    pub job_file: PathBuf,

    /// Directory telemetry is written to
    #[arg(short, long, default_value = "hauler-out")]
    pub output: PathBuf,

    /// Directory steps run in (overrides the job file's working_directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Secret value to mask (repeatable)
    #[arg(short, long = "secret", env = "HAULER_SECRET", value_name = "VALUE")]
    pub secret: Vec<String>,
}

impl RunArgs {
    pub fn new(job_file: impl Into<PathBuf>) -> Self {
        Self {
            job_file: job_file.into(),
            output: PathBuf::from("hauler-out"),
            workdir: None,
            secret: Vec::new(),
        }
    }
}
