//! Tracing configuration and log routing.
//!
//! Events go to stdout through a compact formatter and to a log file through a non-blocking
//! writer. The file is `RUSTY_RAG_LOG_FILE` when set, `logs/rusty-rag.log` otherwise; setting
//! the variable to `off` disables the file layer.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "RUSTY_RAG_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "rusty-rag.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and file logging.
///
/// Respects `RUST_LOG` for filtering (defaults to `info`). Call once, at binary start; library
/// code only emits events.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let file_layer = log_file_path(std::env::var(LOG_FILE_ENV).ok().as_deref())
        .and_then(|path| open_writer(&path))
        .map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact()
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

/// Resolve the log file location from the environment override.
fn log_file_path(override_value: Option<&str>) -> Option<PathBuf> {
    match override_value.map(str::trim) {
        Some(value) if value.eq_ignore_ascii_case("off") => None,
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => Some(Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_FILE)),
    }
}

/// Build a non-blocking appender for `path`, creating its directory when needed.
///
/// Returns `None` when the directory cannot be created.
fn open_writer(path: &Path) -> Option<NonBlocking> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if let Err(err) = std::fs::create_dir_all(directory) {
        eprintln!("Failed to create log directory {}: {err}", directory.display());
        return None;
    }
    let file_name = path.file_name()?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
