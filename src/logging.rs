use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "charity-map.log";

/// Routes `tracing` output to a daily rolling file under `dir`.
///
/// The terminal belongs to the UI, so nothing is written to stdout. `RUST_LOG`
/// overrides the default `info` level. Keep the returned guard alive for the
/// lifetime of the program or buffered lines are lost.
pub fn initialize_logging(dir: impl AsRef<Path>) -> io::Result<WorkerGuard> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("Logging to {}", dir.join(LOG_FILE).display());
    Ok(guard)
}
