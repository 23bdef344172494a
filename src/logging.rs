use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use parking_lot::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::{self, time::LocalTime},
    prelude::*,
};

/// File log filter when `RUST_LOG` is unset. The GUI stack is noisy below warn.
pub const DEFAULT_FILTER: &str = "info,eframe=warn,egui_glow=warn,egui_wgpu=warn,wgpu=warn,winit=warn";

/// Terminal filter. Fixed, so the operator prompts stay readable whatever
/// `RUST_LOG` says.
pub const STDERR_FILTER: &str = "point_clicker=warn";

static LOG_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

pub fn log_dir() -> std::path::PathBuf {
    std::env::temp_dir().join("point_clicker")
}

/// Directives for the file log: `RUST_LOG` when set and non-blank,
/// [`DEFAULT_FILTER`] otherwise.
pub fn file_directives(rust_log: Option<String>) -> String {
    rust_log
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Sets up diagnostics: everything the file filter allows goes to a daily
/// log file under [`log_dir`], only this crate's warnings and errors reach
/// the terminal.
///
/// The appender's guard is held until [`flush_logs`].
pub fn init_logs() -> Result<()> {
    let appender = tracing_appender::rolling::daily(log_dir(), "point_clicker.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let directives = file_directives(std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("Ignoring bad {} {:?}: {}", EnvFilter::DEFAULT_ENV, directives, e);
        EnvFilter::new(DEFAULT_FILTER)
    });

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_timer(LocalTime::rfc_3339())
        .with_filter(filter);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(EnvFilter::new(STDERR_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    /// eframe and winit log through the `log` crate
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;

    hold_guard(guard);
    debug!("logging to {}", log_dir().display());
    Ok(())
}

fn hold_guard(guard: WorkerGuard) {
    *LOG_GUARD.lock() = Some(guard);
}

/// Writes out buffered log lines. Must run before the process exits, on
/// every path, or the tail of the log is lost. Returns whether there was
/// anything to flush.
pub fn flush_logs() -> bool {
    /// dropping the guard blocks until the writer thread has drained
    LOG_GUARD.lock().take().is_some()
}
