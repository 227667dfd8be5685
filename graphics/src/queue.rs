//! Hardware queues.
//!
//! Queues are created once by [`Device::new`](crate::Device::new), one per
//! family the backend reports, and shared as `Arc<Queue>` afterwards. Each
//! submission gets the next [`Epoch`] and a fresh [`Fence`]; [`Queue::poll`]
//! folds signaled fences into the queue's [`Timeline`] strictly in
//! submission order, so the completed epoch never runs ahead of the GPU.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ember_core::profile_function;
use parking_lot::Mutex;

use crate::backend::GpuBackend;
use crate::command::RecordedCmdBuffer;
use crate::error::{GraphicsError, Result};
use crate::sync::{Epoch, Fence, Timeline};

/// Waits longer than this are reported at warn level.
const SLOW_WAIT: Duration = Duration::from_millis(100);

/// Class of hardware queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Graphics,
    Transfer,
    Compute,
}

/// A queue family as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueFamily {
    pub kind: QueueKind,
    /// Family index on the device.
    pub index: u32,
    /// Number of hardware queues in the family.
    pub count: u32,
}

impl QueueFamily {
    pub const fn new(kind: QueueKind, index: u32, count: u32) -> Self {
        Self { kind, index, count }
    }
}

struct InFlight {
    last_submitted: Epoch,
    /// Unretired submissions, oldest first.
    fences: VecDeque<(Epoch, Fence)>,
}

/// A hardware queue. Submission is serialized by an internal lock.
pub struct Queue {
    family: QueueFamily,
    backend: Arc<dyn GpuBackend>,
    in_flight: Mutex<InFlight>,
    timeline: Timeline,
}

impl Queue {
    pub(crate) fn new(family: QueueFamily, backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            family,
            backend,
            in_flight: Mutex::new(InFlight {
                last_submitted: Epoch::ZERO,
                fences: VecDeque::new(),
            }),
            timeline: Timeline::new(),
        }
    }

    pub fn family(&self) -> &QueueFamily {
        &self.family
    }

    pub fn kind(&self) -> QueueKind {
        self.family.kind
    }

    /// Hands a recorded buffer to the hardware and returns its epoch.
    pub fn submit(&self, cmd: &RecordedCmdBuffer) -> Result<Epoch> {
        profile_function!();

        let mut in_flight = self.in_flight.lock();
        let epoch = in_flight.last_submitted.next();
        let fence = Fence::new_unsignaled();

        if let Err(err) = self.backend.submit(&self.family, cmd, fence.clone()) {
            log::error!(
                "Submission of epoch {epoch} to the {:?} queue failed: {err}",
                self.family.kind
            );
            return Err(err);
        }

        in_flight.last_submitted = epoch;
        in_flight.fences.push_back((epoch, fence));
        log::trace!(
            "Queue {:?}: submitted command buffer {} as epoch {epoch}",
            self.family.kind,
            cmd.id()
        );
        Ok(epoch)
    }

    /// Advances the completed epoch over every signaled fence, in
    /// submission order, and returns it.
    pub fn poll(&self) -> Result<Epoch> {
        if self.backend.is_device_lost() {
            log::error!("Queue {:?}: device lost while polling", self.family.kind);
            return Err(GraphicsError::DeviceLost);
        }

        let mut in_flight = self.in_flight.lock();
        while let Some((epoch, fence)) = in_flight.fences.front() {
            if !fence.is_signaled() {
                break;
            }
            self.timeline.advance(*epoch);
            in_flight.fences.pop_front();
        }
        Ok(self.timeline.last_ready())
    }

    /// Last completed epoch as of the previous [`poll`](Self::poll).
    pub fn completed_epoch(&self) -> Epoch {
        self.timeline.last_ready()
    }

    pub fn last_submitted(&self) -> Epoch {
        self.in_flight.lock().last_submitted
    }

    /// Number of submissions not yet known to be complete.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().fences.len()
    }

    /// Blocks until `epoch` is complete.
    ///
    /// # Panics
    ///
    /// Panics if `epoch` was never submitted on this queue; such a wait
    /// could never finish.
    pub fn wait_for(&self, epoch: Epoch, timeout: Duration) -> Result<()> {
        profile_function!();

        let last_submitted = self.last_submitted();
        assert!(
            epoch <= last_submitted,
            "waiting for epoch {epoch} on the {:?} queue, which has only submitted up to {last_submitted}",
            self.family.kind
        );

        let start = Instant::now();
        loop {
            if self.poll()? >= epoch {
                let waited = start.elapsed();
                if waited > SLOW_WAIT {
                    log::warn!(
                        "Queue {:?}: waited {} ms for epoch {epoch}",
                        self.family.kind,
                        waited.as_millis()
                    );
                }
                return Ok(());
            }

            // The oldest unsignaled fence is the next one that can move the timeline.
            let Some(fence) = self.in_flight.lock().fences.front().map(|(_, f)| f.clone()) else {
                continue;
            };

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() || !fence.wait_timeout(remaining) {
                if self.backend.is_device_lost() {
                    log::error!("Queue {:?}: device lost while waiting", self.family.kind);
                    return Err(GraphicsError::DeviceLost);
                }
                let waited_ms = start.elapsed().as_millis() as u64;
                log::error!(
                    "Queue {:?}: fence for epoch {epoch} did not signal within {waited_ms} ms",
                    self.family.kind
                );
                return Err(GraphicsError::FenceTimeout { epoch, waited_ms });
            }
        }
    }

    /// Blocks until everything submitted so far is complete.
    pub fn wait_idle(&self, timeout: Duration) -> Result<()> {
        self.wait_for(self.last_submitted(), timeout)
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("family", &self.family)
            .field("completed", &self.timeline.last_ready())
            .finish()
    }
}

static_assertions::assert_impl_all!(Queue: Send, Sync);
