//! Hauler CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use hauler::cli::{Cli, CommandDispatcher, Commands};
use hauler::logging::init_tracing;
use hauler::secrets::SecretMasker;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // One masker for logs and step output, seeded before anything is logged.
    let masker = Arc::new(SecretMasker::new());
    let Commands::Run(args) = &cli.command;
    masker.add_values(args.secret.iter().cloned());
    init_tracing(cli.debug, masker.clone());

    tracing::debug!("hauler starting with args: {:?}", cli);

    let dispatcher = CommandDispatcher::new(masker);
    match dispatcher.dispatch(&cli).await {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            eprintln!("Error: {}", dispatcher.masker().mask(&e.to_string()));
            ExitCode::from(1)
        }
    }
}
