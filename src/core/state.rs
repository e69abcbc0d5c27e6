//! Process-wide shutdown signal.
//!
//! The gateway itself is an explicit handle owned by the command that
//! started it; the only ambient state left is the Ctrl+C handler.

use crossbeam::channel::{self, Receiver};

/// Setup the global Ctrl+C handler. Call once at program start.
///
/// Returns a receiver that fires once per Ctrl+C. Commands that own a
/// long-running gateway block on it and then stop the gateway themselves.
pub fn setup_shutdown_handler() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        // A full channel means a shutdown is already pending
        let _ = tx.try_send(());
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))?;
    Ok(rx)
}
