//! Shared plumbing for the two binaries.

use std::process::ExitCode;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use crate::{capture::CaptureError, interrupt, SessionOutcome};

/// Whether `err` came from the operator aborting a capture window.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| matches!(e.downcast_ref::<CaptureError>(), Some(CaptureError::Cancelled)))
}

/// Turns a session result into the process exit status.
///
/// An aborted capture ends like an interrupt: notice, status 0. Any other
/// error is logged, printed and fails the process. Logs are flushed last.
pub fn finish(result: Result<SessionOutcome>) -> ExitCode {
    let code = match result {
        Ok(SessionOutcome::Saved { path, result }) => {
            debug!("session done: {} entries in {}", result.len(), path.display());
            ExitCode::SUCCESS
        }
        Ok(SessionOutcome::Declined) => ExitCode::SUCCESS,
        Err(e) if is_cancelled(&e) => {
            interrupt::announce_interrupt();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:?}", e);
            eprintln!("\n\n❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    };
    crate::logging::flush_logs();
    code
}

/// Logging and Ctrl-C handling for a binary. Failures here are reported but
/// not fatal; the session itself can still run.
pub fn init() {
    if let Err(e) = crate::logging::init_logs() {
        eprintln!("Failed to set up logging: {:#}", e);
    }
    if let Err(e) = interrupt::spawn_ctrl_c_watcher() {
        warn!("{:#}", e);
    }
}
