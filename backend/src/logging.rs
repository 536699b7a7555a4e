use anyhow::Context;
use clap::ValueEnum;
use std::{fs::OpenOptions, path::PathBuf};
use tracing::Level;
use tracing_subscriber::{filter::FromEnvError, fmt, layer::SubscriberExt, EnvFilter, Layer};

#[derive(Clone, Debug, Copy, ValueEnum, PartialEq)]
pub enum LogOutput {
    Console,
    Json,
}

/// Directives from `var`, or `level` and above when it is unset.
fn level_filter(var: &str, level: Level) -> Result<EnvFilter, FromEnvError> {
    EnvFilter::builder()
        .with_env_var(var)
        .with_default_directive(level.into())
        .from_env()
}

/// Installs the global subscriber.
///
/// Stdout is filtered by `RUST_LOG` and the optional log file by
/// `WRITE_RUST_LOG`. Both fall back to `level`.
pub fn init_logging(
    output: LogOutput,
    level: Level,
    write_logs_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let stdout_filter = level_filter(EnvFilter::DEFAULT_ENV, level)?;
    let stdout_layer = match output {
        LogOutput::Console => fmt::layer()
            .with_writer(std::io::stdout)
            .with_filter(stdout_filter)
            .boxed(),
        LogOutput::Json => fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .flatten_event(true)
            .with_current_span(true)
            .with_filter(stdout_filter)
            .boxed(),
    };

    let file_layer = match write_logs_file {
        Some(path) => {
            let log_file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {path:?}"))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(log_file)
                    .with_filter(level_filter("WRITE_RUST_LOG", level)?),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
