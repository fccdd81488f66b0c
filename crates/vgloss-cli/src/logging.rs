use std::env;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "vgloss.log";

/// Log to stdout and, when there is somewhere to put it, to a file.
///
/// The file is `LOG_FILE_PATH` if set, otherwise `vgloss.log` inside the
/// gallery's data directory. Nothing is written to disk for a gallery that
/// has not been initialised yet.
pub fn init_logger(data_dir: &Path) -> Option<WorkerGuard> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_file_path = match env::var("LOG_FILE_PATH") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) if data_dir.is_dir() => Some(data_dir.join(LOG_FILE_NAME)),
        Err(_) => None,
    };

    let (file_layer, guard) = match log_file_path {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| LOG_FILE_NAME.into());
            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(file_layer)
        .with(filter_layer)
        .init();

    info!("Tracing is configured for stdout and file logging.");

    guard
}
