//! tutorsheet operator CLI entry point.

use std::io::Write;
use std::process::ExitCode;
use tutorsheet_client::cli::Command;
use tutorsheet_client::config::ClientConfig;
use tutorsheet_client::error::ClientError;
use tutorsheet_client::service::SheetService;
use tutorsheet_client::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    telemetry::init_tracing(&config.log_filter, config.log_json)?;

    let command = Command::parse(std::env::args().skip(1))?;
    let service = SheetService::from_config(&config)?;
    tracing::debug!(command = ?command, "running command");

    let output = command.run(&service).await?;
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &output)?;
    writeln!(stdout)?;
    Ok(())
}
