//! Cooperative pause/stop primitives shared by search workers
//!
//! A search run owns one `PauseGate`/`CancellationScope` pair. Workers call
//! [`PauseGate::wait_if_paused`] at safe suspension points (between rows and
//! between partitions) and poll [`CancellationScope::is_stop_requested`] at
//! the same granularity. The two handles share state so a stop request wakes
//! workers parked in the gate; a pure pause wait would otherwise deadlock a
//! stop issued while paused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

struct ControlInner {
    paused: Mutex<bool>,
    resumed: Condvar,
    stopped: AtomicBool,
}

/// Blocking suspension gate, safe to share across any number of workers
#[derive(Clone)]
pub struct PauseGate {
    inner: Arc<ControlInner>,
}

/// Stop signal observed cooperatively by workers
#[derive(Clone)]
pub struct CancellationScope {
    inner: Arc<ControlInner>,
}

/// Create a fresh, linked gate/scope pair for one search run
pub fn control_pair() -> (PauseGate, CancellationScope) {
    let inner = Arc::new(ControlInner {
        paused: Mutex::new(false),
        resumed: Condvar::new(),
        stopped: AtomicBool::new(false),
    });
    (
        PauseGate {
            inner: Arc::clone(&inner),
        },
        CancellationScope { inner },
    )
}

impl PauseGate {
    /// Idempotent; workers block at their next suspension point
    pub fn pause(&self) {
        *self.inner.paused.lock().unwrap() = true;
    }

    /// Idempotent; releases every worker blocked in `wait_if_paused`
    pub fn resume(&self) {
        *self.inner.paused.lock().unwrap() = false;
        self.inner.resumed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.lock().unwrap()
    }

    /// Block while paused. Returns immediately when not paused, and wakes on
    /// either `resume` or a stop request on the linked scope. Callers must
    /// not hold locks across this call.
    pub fn wait_if_paused(&self) {
        let mut paused = self.inner.paused.lock().unwrap();
        while *paused && !self.inner.stopped.load(Ordering::Acquire) {
            paused = self.inner.resumed.wait(paused).unwrap();
        }
    }
}

impl CancellationScope {
    /// Idempotent; also wakes any worker parked in the linked gate
    pub fn request_stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        let _guard = self.inner.paused.lock().unwrap();
        self.inner.resumed.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }
}
