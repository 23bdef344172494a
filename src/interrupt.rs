use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

pub const INTERRUPT_NOTICE: &str = "\n\n⚠ Interrupted by user. Exiting...";

pub fn announce_interrupt() {
    println!("{}", INTERRUPT_NOTICE);
}

/// Catches Ctrl-C for the rest of the process.
///
/// The main thread spends its life blocked on stdin or inside a window event
/// loop, so the signal is awaited on a separate thread with its own runtime.
/// On interrupt the notice is printed, buffered log lines are flushed and
/// the process exits with status 0, which also tears down any open window.
pub fn spawn_ctrl_c_watcher() -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            rt.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("interrupted by operator");
                        announce_interrupt();
                        crate::logging::flush_logs();
                        std::process::exit(0);
                    }
                    Err(e) => {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                }
            });
        })
        .context("Failed to spawn Ctrl-C watcher")?;

    Ok(())
}
