//! CPU-GPU synchronization primitives.
//!
//! Every queue submission is identified by an [`Epoch`] and signals one
//! [`Fence`] when the GPU finishes it. A queue folds its signaled fences, in
//! submission order, into a [`Timeline`] holding the highest epoch known to
//! be complete. Retiring resources only ever looks at that timeline value.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Monotonically increasing submission identifier.
///
/// Epoch 0 means "nothing submitted yet" and is always complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(u64);

impl Epoch {
    pub const ZERO: Epoch = Epoch(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Unsignaled,
    /// GPU work complete.
    Signaled,
}

/// Signaled by the backend when one submission completes.
///
/// Clones share state. Waiters sleep on a condition variable until the
/// backend signals.
#[derive(Debug, Clone, Default)]
pub struct Fence {
    state: Arc<FenceState>,
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Fence {
    pub(crate) fn new_unsignaled() -> Self {
        Self::default()
    }

    pub fn status(&self) -> FenceStatus {
        if *self.state.signaled.lock() {
            FenceStatus::Signaled
        } else {
            FenceStatus::Unsignaled
        }
    }

    /// Non-blocking.
    pub fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }

    /// Wait for the fence with a timeout.
    ///
    /// Returns `true` if the fence was signaled, `false` if timeout elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        // An unrepresentable deadline waits forever.
        let deadline = Instant::now().checked_add(timeout);
        let mut signaled = self.state.signaled.lock();
        while !*signaled {
            match deadline {
                Some(deadline) => {
                    if self.state.cond.wait_until(&mut signaled, deadline).timed_out() {
                        return *signaled;
                    }
                }
                None => self.state.cond.wait(&mut signaled),
            }
        }
        true
    }

    /// Called by backends when the GPU finishes the submission. Wakes every
    /// waiter.
    pub(crate) fn signal(&self) {
        *self.state.signaled.lock() = true;
        self.state.cond.notify_all();
    }
}

/// Highest completed epoch, only ever moving forward.
#[derive(Debug, Default)]
pub struct Timeline {
    ready: AtomicU64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last epoch known to be complete.
    pub fn last_ready(&self) -> Epoch {
        Epoch(self.ready.load(Ordering::Acquire))
    }

    pub fn is_reached(&self, epoch: Epoch) -> bool {
        self.last_ready() >= epoch
    }

    /// Raises the timeline to `epoch`. Lower values are ignored.
    pub(crate) fn advance(&self, epoch: Epoch) {
        self.ready.fetch_max(epoch.0, Ordering::AcqRel);
    }
}
