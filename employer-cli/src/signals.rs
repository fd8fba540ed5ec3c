// SPDX-License-Identifier: MIT

//! SIGINT/SIGTERM wiring: the first signal stops the boss gracefully, any
//! further one forces in-flight jobs to stop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use employer::StopHandle;
use libc::c_int;
use log::warn;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

// Set once in install(); the handler only reads it.
static STOP: OnceLock<StopHandle> = OnceLock::new();
static RECEIVED: AtomicUsize = AtomicUsize::new(0);

extern "C" fn on_stop_signal(_signal: c_int) {
    // atomics only, anything else is not async-signal-safe
    let count = RECEIVED.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(stop) = STOP.get() {
        if count == 1 {
            stop.stop_managing();
        } else {
            stop.stop_now();
        }
    }
}

pub fn install(stop: StopHandle) -> nix::Result<()> {
    if STOP.set(stop).is_err() {
        warn!("Stop signals were already wired up");
        return Ok(());
    }
    let action = SigAction::new(
        SigHandler::Handler(on_stop_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        unsafe { signal::sigaction(sig, &action)? };
    }
    Ok(())
}

/// Number of stop signals seen so far.
pub fn received() -> usize {
    RECEIVED.load(Ordering::SeqCst)
}
