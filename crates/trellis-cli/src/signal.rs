//! Ctrl-C handling
//!
//! The pipeline is blocking, so the signal is awaited on a helper thread
//! running its own current-thread runtime. The first Ctrl-C cancels the run,
//! which abandons any in-flight download or generation. A second one removes
//! the run's scratch directory and exits immediately.

use std::path::{Path, PathBuf};
use std::thread;
use tracing::{error, warn};
use trellis_core::CancelToken;

const INTERRUPTED_EXIT_CODE: i32 = 130;

pub fn spawn_watcher(cancel: CancelToken, scratch_root: PathBuf) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
                warn!("Interrupt received, stopping (Ctrl-C again to abort)");
                cancel.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Second interrupt, exiting");
                    // process::exit skips destructors, so the scratch dir goes first
                    discard_scratch(&scratch_root);
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            });
        })?;
    Ok(())
}

/// Remove a scratch tree, including attempts still in progress
fn discard_scratch(root: &Path) {
    if let Err(e) = std::fs::remove_dir_all(root) {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!(error = %e, path = %root.display(), "Failed to remove scratch directory");
        }
    }
}
