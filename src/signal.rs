//! Interrupt handling
//!
//! SIGINT and SIGTERM set a process-wide flag. The server's accept loop
//! checks it and stops accepting; in-flight handlers are left to finish.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signum: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT/SIGTERM handler
pub fn install_interrupt_handler() -> io::Result<()> {
    for signum in [libc::SIGINT, libc::SIGTERM] {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe
        if unsafe { libc::signal(signum, handler) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Whether an interrupt signal has been received
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}
