//! Frame pipeline for managing multiple frames in flight.
//!
//! This module provides [`FramePipeline`], which coordinates CPU-GPU
//! synchronization across multiple frames, enabling frame overlap (the CPU
//! prepares frame N+1 while the GPU renders frame N).
//!
//! # Synchronization Model
//!
//! | Level | Primitive | Purpose |
//! |-------|-----------|---------|
//! | Node → Node | Barriers | Resource visibility within one frame graph |
//! | Submission → CPU | Fence per submission | Completion of one command buffer |
//! | Frame → Frame | Epoch per slot | Slot reuse and resource retirement |
//!
//! # Frame Overlap (Pipelining)
//!
//! With 2 frames in flight, the CPU and GPU work in parallel:
//!
//! ```text
//! Frame 0: [CPU build] [submit] ─────────────────────────────────────────────►
//!                               [GPU execute frame 0] ───────────────────────►
//!
//! Frame 1:              [CPU build] [submit] ────────────────────────────────►
//!                                            [GPU execute frame 1] ──────────►
//!
//! Frame 2:                          [wait F0] [CPU build] [submit] ──────────►
//!                                                         [GPU execute F2] ──►
//!
//! Time ──────────────────────────────────────────────────────────────────────►
//! ```
//!
//! Every wait is bounded. A slot whose epoch does not complete within the
//! timeout fails the frame with [`GraphicsError::FenceTimeout`], which the
//! caller treats as fatal.
//!
//! # Choosing Frames in Flight
//!
//! | Count | Behavior |
//! |-------|----------|
//! | 1 | CPU waits for GPU every frame. Simple but slow. |
//! | 2 | Good balance. CPU can work on N+1 while GPU renders N. |
//! | 3 | More overlap, higher latency. |
//!
//! [`GraphicsError::FenceTimeout`]: crate::GraphicsError::FenceTimeout

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::frame::FrameToken;
use crate::queue::Queue;
use crate::sync::Epoch;
use crate::types::Extent2d;

/// Default buffering depth.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Manages multiple frames in flight for CPU-GPU parallelism.
///
/// With N frames in flight there are N slots. Each slot remembers the epoch
/// of the last frame submitted from it; [`begin_frame`](Self::begin_frame)
/// blocks until that epoch has completed.
///
/// ```text
/// frames_in_flight = 2
///
/// Slot 0: [Frame 0] ──► [Frame 2] ──► [Frame 4] ──►
/// Slot 1: [Frame 1] ──► [Frame 3] ──► [Frame 5] ──►
/// ```
///
/// # Thread Safety
///
/// `FramePipeline` is owned by a single thread (the one driving frames).
#[derive(Debug)]
pub struct FramePipeline {
    /// Epoch of the last frame submitted from each slot.
    slot_epochs: Vec<Option<Epoch>>,
    current_slot: usize,
    frames_in_flight: usize,
    /// Total frames started.
    frame_count: u64,
    frame_open: bool,
}

impl FramePipeline {
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is 0.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");

        Self {
            slot_epochs: vec![None; frames_in_flight],
            current_slot: 0,
            frames_in_flight,
            frame_count: 0,
            frame_open: false,
        }
    }

    /// Begin a new frame.
    ///
    /// Waits, at most `timeout`, until the GPU has finished the frame that
    /// last used the current slot, then returns the token for the new frame.
    ///
    /// # Panics
    ///
    /// Panics if the previous frame was not ended.
    pub fn begin_frame(
        &mut self,
        queue: &Queue,
        extent: Extent2d,
        timeout: Duration,
    ) -> Result<FrameToken> {
        assert!(!self.frame_open, "begin_frame called twice without end_frame");

        if let Some(epoch) = self.slot_epochs[self.current_slot] {
            let start = Instant::now();
            queue.wait_for(epoch, timeout)?;
            log::trace!(
                "Slot {} free after {} us (epoch {epoch})",
                self.current_slot,
                start.elapsed().as_micros()
            );
        }

        let token = FrameToken::new(
            self.frame_count,
            self.current_slot as u32,
            self.frames_in_flight as u32,
            extent,
        );
        self.frame_count += 1;
        self.frame_open = true;

        log::trace!(
            "Begin frame {} (slot {})",
            token.frame_id(),
            self.current_slot
        );
        Ok(token)
    }

    /// End the current frame.
    ///
    /// Records the epoch of the frame's last submission and advances to the
    /// next slot.
    pub fn end_frame(&mut self, epoch: Epoch) {
        assert!(self.frame_open, "end_frame called without begin_frame");
        log::trace!(
            "End frame {} (slot {}, epoch {epoch})",
            self.frame_count - 1,
            self.current_slot
        );

        self.slot_epochs[self.current_slot] = Some(epoch);
        self.current_slot = (self.current_slot + 1) % self.frames_in_flight;
        self.frame_open = false;
    }

    /// Closes a frame that failed before submitting anything.
    ///
    /// The slot keeps its previous epoch and is used again by the next frame.
    pub fn cancel_frame(&mut self) {
        assert!(self.frame_open, "cancel_frame called without begin_frame");
        log::warn!("Frame {} cancelled (slot {})", self.frame_count - 1, self.current_slot);
        self.frame_open = false;
    }

    /// Wait for all in-flight frames to complete.
    ///
    /// `timeout` bounds the total wait across all slots.
    pub fn wait_idle(&self, queue: &Queue, timeout: Duration) -> Result<()> {
        log::trace!("Waiting for GPU idle ({} slots)", self.frames_in_flight);

        // Epochs on one queue complete in order: waiting for the newest covers the rest.
        if let Some(latest) = self.slot_epochs.iter().flatten().max() {
            queue.wait_for(*latest, timeout)?;
        }

        log::trace!("GPU idle");
        Ok(())
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Returns a value from 0 to `frames_in_flight - 1`.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Check if a specific frame slot is ready (non-blocking).
    ///
    /// Uses the queue's completed epoch as of its last poll.
    pub fn is_slot_ready(&self, queue: &Queue, slot: usize) -> bool {
        assert!(slot < self.frames_in_flight, "Invalid slot index");

        match self.slot_epochs[slot] {
            Some(epoch) => queue.completed_epoch() >= epoch,
            None => true,
        }
    }

    /// Check if all frame slots are ready (non-blocking).
    pub fn is_idle(&self, queue: &Queue) -> bool {
        (0..self.frames_in_flight).all(|slot| self.is_slot_ready(queue, slot))
    }
}

impl Default for FramePipeline {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_IN_FLIGHT)
    }
}
