use std::{path::PathBuf, process::ExitCode, str::FromStr};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

mod cli;
mod driver;
mod record;
mod run;

use cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli.log_level, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Failed to set up logging: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Run(args) => run::run(args).await,
    };
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("Run failed: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Installs the stdout subscriber and, if requested, a JSON log file. Records
/// of the `log` facade used by the library crates end up in both.
fn setup_logging(log_level: &str, log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let level = tracing::Level::from_str(log_level)
        .with_context(|| format!("Invalid log level: {}", log_level))?;

    let (file_layer, guard) = match log_file {
        Some(log_file) => {
            let path = log_file_path(log_file)?;
            let dir = path
                .parent()
                .context("Log file path has no parent directory")?;
            let name = path.file_name().context("Log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(non_blocking);
            eprintln!("Saving logs to {}", path.display());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .without_time()
                .with_filter(LevelFilter::from_level(level)),
        )
        .with(file_layer)
        .try_init()
        .context("Unable to set global tracing subscriber")?;
    Ok(guard)
}

/// Resolves `--log-file`. `auto` picks a timestamped file in the local data
/// directory.
fn log_file_path(log_file: &str) -> Result<PathBuf> {
    if log_file != "auto" {
        let path = PathBuf::from(log_file);
        if path.exists() {
            anyhow::bail!("Log file already exists: {}", path.display());
        }
        return Ok(path);
    }

    let time = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let filename = format!("kicksim-{time}.log");
    let path = dirs::data_local_dir()
        .map(|p| p.join("kicksim").join(&filename))
        .unwrap_or_else(|| PathBuf::from(&filename));
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    }
    Ok(path)
}
