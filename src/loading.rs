//! Process-wide loading coordination.
//!
//! The [`LoadingGate`] is a reference-counted busy signal shared by every
//! non-suppressed request. It is an injected value, not module-level state:
//! each [`crate::api::ApiClient`] (and each test) constructs its own, so
//! tests run in isolation.
//!
//! Subscribers are notified only when the boolean state actually changes
//! (0→1 "busy", 1→0 "idle"); interior count changes are silent, which avoids
//! redundant wakeups when many requests overlap.
//!
//! # Example
//!
//! ```
//! use linkfeed::loading::LoadingGate;
//!
//! let gate = LoadingGate::new();
//! let mut busy = gate.subscribe();
//!
//! assert!(!gate.is_busy());
//! {
//!     let _a = gate.enter();
//!     let _b = gate.enter();
//!     assert!(gate.is_busy());
//! } // both guards dropped: exactly one idle transition
//! assert!(!gate.is_busy());
//! # let _ = busy.borrow();
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

/// A reference-counted busy signal.
///
/// Cloning is cheap and every clone observes the same counter. The gate is
/// agnostic to *which* request is in flight, only *how many*.
#[derive(Debug, Clone)]
pub struct LoadingGate {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    count: Mutex<usize>,
    busy_tx: watch::Sender<bool>,
}

impl LoadingGate {
    /// Creates an idle gate.
    #[must_use]
    pub fn new() -> Self {
        let (busy_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                count: Mutex::new(0),
                busy_tx,
            }),
        }
    }

    /// Increments the counter and returns a guard that decrements it when
    /// dropped. The pairing holds on every path, including early returns and
    /// panics; this is the finally-equivalent the transport relies on.
    #[must_use]
    pub fn enter(&self) -> BusyGuard {
        self.increment();
        BusyGuard { gate: self.clone() }
    }

    /// Increments the counter. Prefer [`LoadingGate::enter`], which cannot
    /// leave an unmatched increment behind.
    pub fn increment(&self) {
        let mut count = self.lock();
        *count += 1;
        if *count == 1 {
            self.inner.busy_tx.send_if_modified(|busy| {
                let changed = !*busy;
                *busy = true;
                changed
            });
        }
    }

    /// Decrements the counter. Decrementing an idle gate is a no-op, not an
    /// error; the counter never goes below zero.
    pub fn decrement(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.inner.busy_tx.send_if_modified(|busy| {
                let changed = *busy;
                *busy = false;
                changed
            });
        }
    }

    /// `true` while at least one non-suppressed request is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *self.inner.busy_tx.borrow()
    }

    /// The current number of outstanding requests.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Subscribes to busy/idle transitions.
    ///
    /// The receiver yields a change only when the boolean flips, never for
    /// count changes that stay on one side of the 0/1 boundary.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.busy_tx.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, usize> {
        // A poisoned counter only means a panicking holder; the count itself
        // is still consistent.
        match self.inner.count.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for LoadingGate {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII pairing token returned by [`LoadingGate::enter`].
#[must_use = "dropping the guard immediately ends the busy window"]
#[derive(Debug)]
pub struct BusyGuard {
    gate: LoadingGate,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.gate.decrement();
    }
}
