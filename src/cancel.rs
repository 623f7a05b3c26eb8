// src/cancel.rs

//! Cooperative cancellation
//!
//! Long-running work (downloads, build steps) polls a [`CancelToken`]. A
//! token trips either when [`CancelToken::cancel`] is called or, once
//! [`install_signal_handlers`] has run, when the process receives SIGINT or
//! SIGTERM. Polling instead of unwinding from the handler lets every stage
//! return through its normal error path, so scoped cleanup (workspace
//! removal, partial install removal) always runs.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM into every [`CancelToken`]
pub fn install_signal_handlers() -> Result<()> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe
        unsafe { sigaction(signal, &action) }
            .map_err(|e| Error::IoError(format!("Failed to install {} handler: {}", signal, e)))?;
    }
    debug!("Installed SIGINT/SIGTERM handlers");
    Ok(())
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || INTERRUPTED.load(Ordering::SeqCst)
    }

    /// Return `Err(Error::Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
