use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use nix::sys::signal::{self, SigHandler, Signal};

use crate::error::Result;

static RUNNING: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Install SIGTERM/SIGINT handlers that clear `running`.
///
/// Only the flag passed to the first call is ever cleared; later calls just
/// reinstall the handlers.
pub fn install_shutdown_handlers(running: Arc<AtomicBool>) -> Result<()> {
    let _ = RUNNING.set(running);

    // SAFETY: the handler only performs an atomic store.
    unsafe {
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_shutdown))?;
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_shutdown))?;
    }

    Ok(())
}

extern "C" fn handle_shutdown(_: i32) {
    if let Some(running) = RUNNING.get() {
        running.store(false, Ordering::SeqCst);
    }
}
