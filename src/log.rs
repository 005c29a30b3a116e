use crate::error::Error;
use once_cell::sync::OnceCell;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

const DEFAULT_LEVEL: &str = "info";

/// Sends `tracing` output to `log_file_path`. `RUST_LOG` overrides `log_level` when set.
///
/// Returns the path logs are written to. Calling it again after a successful init is a no-op.
pub fn init_tracing(log_file_path: &str, log_level: Option<&str>) -> Result<String, Error> {
    let path = Path::new(log_file_path);
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidPath(log_file_path.to_string()))?;

    if LOG_GUARD.get().is_some() {
        return Ok(log_file_path.to_string());
    }

    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(directory)?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or(DEFAULT_LEVEL)))
        .map_err(|e| Error::Tracing(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_thread_names(true),
        )
        .try_init()
        .map_err(|e| Error::Tracing(e.to_string()))?;

    let _ = LOG_GUARD.set(guard);
    tracing::info!("Logging initialized at {}", log_file_path);
    Ok(log_file_path.to_string())
}

/// Plain stderr logging for command line tools.
pub fn init_stderr_tracing(log_level: Option<&str>) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or(DEFAULT_LEVEL)))
        .map_err(|e| Error::Tracing(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Tracing(e.to_string()))
}
