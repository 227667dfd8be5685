//! Dummy GPU backend for testing and development.
//!
//! No GPU work is performed. Resource ids come from per-kind
//! [`SharedIdAllocator`]s so destroyed ids are reused the way a driver
//! reuses handles, which makes use-after-free bugs observable in tests.
//! Submissions either complete immediately or wait for the test to call
//! [`DummyBackend::complete_next`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ember_core::id_alloc::SharedIdAllocator;
use parking_lot::Mutex;

use crate::command::{Command, RecordedCmdBuffer};
use crate::error::{GraphicsError, Result};
use crate::queue::{QueueFamily, QueueKind};
use crate::resources::ResourceKey;
use crate::sync::Fence;
use crate::types::{BufferDescriptor, TextureDescriptor};

use super::GpuBackend;

/// When submitted work is reported complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Fences are signaled inside `submit`.
    #[default]
    Immediate,
    /// Fences stay unsignaled until [`DummyBackend::complete_next`].
    Manual,
}

/// What the dummy device saw for one submission.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub queue: QueueKind,
    pub cmd_buffer: u32,
    pub commands: Vec<Command>,
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    mode: CompletionMode,
    buffers: SharedIdAllocator,
    textures: SharedIdAllocator,
    descriptor_sets: SharedIdAllocator,
    cmd_buffers: SharedIdAllocator,
    /// Upper bound on live command buffers; `usize::MAX` when unlimited.
    cmd_buffer_limit: AtomicUsize,
    pending: Mutex<VecDeque<Fence>>,
    submissions: Mutex<Vec<SubmissionRecord>>,
    destroyed: Mutex<Vec<ResourceKey>>,
    device_lost: AtomicBool,
}

impl DummyBackend {
    /// Backend whose submissions complete immediately.
    pub fn new() -> Self {
        Self::with_mode(CompletionMode::Immediate)
    }

    /// Backend whose submissions complete only when the caller says so.
    pub fn manual() -> Self {
        Self::with_mode(CompletionMode::Manual)
    }

    pub fn with_mode(mode: CompletionMode) -> Self {
        Self {
            mode,
            buffers: SharedIdAllocator::new(),
            textures: SharedIdAllocator::new(),
            descriptor_sets: SharedIdAllocator::new(),
            cmd_buffers: SharedIdAllocator::new(),
            cmd_buffer_limit: AtomicUsize::new(usize::MAX),
            pending: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
            device_lost: AtomicBool::new(false),
        }
    }

    /// Makes command buffer allocation fail once `limit` buffers are live.
    pub fn with_cmd_buffer_limit(self, limit: usize) -> Self {
        self.cmd_buffer_limit.store(limit, Ordering::Relaxed);
        self
    }

    pub fn mode(&self) -> CompletionMode {
        self.mode
    }

    /// Completes the oldest outstanding submission. Returns `false` if none.
    pub fn complete_next(&self) -> bool {
        match self.pending.lock().pop_front() {
            Some(fence) => {
                fence.signal();
                true
            }
            None => false,
        }
    }

    /// Completes every outstanding submission, returning how many there were.
    pub fn complete_all(&self) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        for fence in pending.drain(..) {
            fence.signal();
        }
        count
    }

    pub fn pending_submissions(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.submissions.lock().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    /// Every resource destroyed so far, in destruction order.
    pub fn destroyed(&self) -> Vec<ResourceKey> {
        self.destroyed.lock().clone()
    }

    pub fn destroy_count(&self, key: ResourceKey) -> usize {
        self.destroyed.lock().iter().filter(|&&k| k == key).count()
    }

    pub fn live_cmd_buffers(&self) -> usize {
        self.cmd_buffers.live_count()
    }

    /// Simulates device loss: pending fences never signal and new
    /// submissions fail.
    pub fn lose_device(&self) {
        log::warn!("DummyBackend: simulating device loss");
        self.device_lost.store(true, Ordering::Release);
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn queue_families(&self) -> Vec<QueueFamily> {
        vec![
            QueueFamily::new(QueueKind::Graphics, 0, 1),
            QueueFamily::new(QueueKind::Transfer, 1, 2),
            QueueFamily::new(QueueKind::Compute, 2, 1),
        ]
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<u32> {
        let id = self.buffers.allocate();
        log::trace!(
            "DummyBackend: creating buffer {id} {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        Ok(id)
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<u32> {
        let id = self.textures.allocate();
        log::trace!(
            "DummyBackend: creating texture {id} {:?} ({}x{} {:?})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.format
        );
        Ok(id)
    }

    fn create_descriptor_set(&self, label: &str) -> Result<u32> {
        let id = self.descriptor_sets.allocate();
        log::trace!("DummyBackend: creating descriptor set {id} '{label}'");
        Ok(id)
    }

    fn allocate_cmd_buffer(&self) -> Result<u32> {
        if self.cmd_buffers.live_count() >= self.cmd_buffer_limit.load(Ordering::Relaxed) {
            return Err(GraphicsError::OutOfMemory);
        }
        let id = self.cmd_buffers.allocate();
        log::trace!("DummyBackend: allocating command buffer {id}");
        Ok(id)
    }

    fn submit(&self, family: &QueueFamily, cmd: &RecordedCmdBuffer, fence: Fence) -> Result<()> {
        if self.is_device_lost() {
            return Err(GraphicsError::DeviceLost);
        }
        log::trace!(
            "DummyBackend: submitting command buffer {} to {:?} ({} commands)",
            cmd.id(),
            family.kind,
            cmd.commands().len()
        );
        self.submissions.lock().push(SubmissionRecord {
            queue: family.kind,
            cmd_buffer: cmd.id(),
            commands: cmd.commands().to_vec(),
        });
        match self.mode {
            CompletionMode::Immediate => fence.signal(),
            CompletionMode::Manual => self.pending.lock().push_back(fence),
        }
        Ok(())
    }

    fn destroy(&self, key: ResourceKey) {
        log::trace!("DummyBackend: destroying {key:?}");
        let freed = match key {
            ResourceKey::Buffer(id) => self.buffers.free(id),
            ResourceKey::Texture(id) => self.textures.free(id),
            ResourceKey::DescriptorSet(id) => self.descriptor_sets.free(id),
            ResourceKey::CmdBuffer(id) => self.cmd_buffers.free(id),
        };
        debug_assert!(freed, "{key:?} destroyed twice");
        self.destroyed.lock().push(key);
    }

    fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }
}
