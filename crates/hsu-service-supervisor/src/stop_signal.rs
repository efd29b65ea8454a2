//! One-shot, monotonic stop flag shared by the monitor and the control
//! handler.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Unset until the first [`set`](StopSignal::set); never reset.
#[derive(Debug, Default)]
pub struct StopSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns `true` only for the call that performed the
    /// unset to set transition.
    pub fn set(&self) -> bool {
        let first = !self.flag.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once the signal is set.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent set() is not missed.
        notified.as_mut().enable();
        if self.is_set() {
            return;
        }
        notified.await;
    }
}
