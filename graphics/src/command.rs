//! Command buffer pool and recording.
//!
//! A [`CmdBufferPool`] belongs to exactly one thread: the one that created
//! it. Allocation is unsynchronized and checked against that thread on every
//! call. Buffers coming back after the GPU is done may be handed in from any
//! thread through the pool's [`CmdBufferReleaser`], which is the only
//! lock-protected part.
//!
//! ```text
//! create_buffer() ──> CmdBufferRecorder ──finish()──> RecordedCmdBuffer
//!       ^                    │ (dropped unfinished)          │ submit
//!       │                    v                               v
//!     free  <──────────  released  <──── collect() ──── LifetimeManager
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::backend::GpuBackend;
use crate::error::Result;
use crate::lifetime::ManagedResource;
use crate::resources::{Buffer, DescriptorSet, GpuResource, ResourceKey};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A command as seen by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRegion(String),
    EndRegion,
    /// Makes earlier writes to `resource` visible to later commands.
    Barrier {
        resource: ResourceKey,
    },
    Draw {
        label: String,
        vertex_count: u32,
        instance_count: u32,
    },
    Dispatch {
        label: String,
        groups: [u32; 3],
    },
    CopyBuffer {
        src: ResourceKey,
        dst: ResourceKey,
        size: u64,
    },
    Clear {
        target: ResourceKey,
        value: [f32; 4],
    },
    BindDescriptorSet {
        set: ResourceKey,
    },
    /// Small inline parameter block (push constants).
    SetParams {
        label: String,
        values: Vec<f32>,
    },
}

/// A backend command buffer owned by a pool.
#[derive(Debug, PartialEq, Eq)]
pub struct CmdBufferData {
    id: u32,
    pool: u64,
}

impl CmdBufferData {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::CmdBuffer(self.id)
    }
}

/// Thread-safe handle for returning buffers to a pool.
#[derive(Debug, Clone)]
pub struct CmdBufferReleaser {
    released: Arc<Mutex<Vec<CmdBufferData>>>,
}

impl CmdBufferReleaser {
    pub fn release(&self, data: CmdBufferData) {
        self.released.lock().push(data);
    }
}

/// Per-thread pool of reusable command buffers.
pub struct CmdBufferPool {
    id: u64,
    owner: ThreadId,
    backend: Arc<dyn GpuBackend>,
    free: Vec<CmdBufferData>,
    releaser: CmdBufferReleaser,
    allocated: usize,
}

impl CmdBufferPool {
    /// Creates a pool owned by the calling thread.
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("Command pool {id}: created on {:?}", thread::current().id());
        Self {
            id,
            owner: thread::current().id(),
            backend,
            free: Vec::new(),
            releaser: CmdBufferReleaser {
                released: Arc::new(Mutex::new(Vec::new())),
            },
            allocated: 0,
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns a recorder for a fresh or recycled command buffer.
    ///
    /// # Panics
    ///
    /// Panics when called from any thread other than the one that created
    /// the pool.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the pool has to grow and the backend cannot
    /// allocate another buffer.
    pub fn create_buffer(&mut self) -> Result<CmdBufferRecorder> {
        let current = thread::current().id();
        assert!(
            current == self.owner,
            "command pool {} used from thread {current:?}, which does not own it (owner: {:?})",
            self.id,
            self.owner
        );

        self.free.append(&mut self.releaser.released.lock());

        let data = match self.free.pop() {
            Some(data) => data,
            None => {
                let id = self.backend.allocate_cmd_buffer().inspect_err(|err| {
                    log::error!("Command pool {}: failed to grow: {err}", self.id);
                })?;
                self.allocated += 1;
                log::debug!(
                    "Command pool {}: grew to {} command buffers",
                    self.id,
                    self.allocated
                );
                CmdBufferData { id, pool: self.id }
            }
        };

        log::trace!("Command pool {}: recording into buffer {}", self.id, data.id);
        Ok(CmdBufferRecorder::new(data, self.releaser.clone()))
    }

    /// Returns a completed buffer for reuse.
    pub fn recycle(&mut self, data: CmdBufferData) {
        debug_assert_eq!(data.pool, self.id, "command buffer recycled into the wrong pool");
        self.free.push(data);
    }

    pub fn releaser(&self) -> CmdBufferReleaser {
        self.releaser.clone()
    }

    /// Buffers allocated from the backend over the pool's lifetime.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Buffers ready for reuse without growing.
    pub fn available(&self) -> usize {
        self.free.len() + self.releaser.released.lock().len()
    }
}

impl Drop for CmdBufferPool {
    fn drop(&mut self) {
        let mut idle = std::mem::take(&mut self.free);
        idle.append(&mut self.releaser.released.lock());
        let outstanding = self.allocated.saturating_sub(idle.len());
        if outstanding > 0 {
            log::error!(
                "Command pool {} dropped with {outstanding} command buffers still outstanding",
                self.id
            );
        }
        for data in idle {
            self.backend.destroy(data.key());
        }
    }
}

impl std::fmt::Debug for CmdBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdBufferPool")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("allocated", &self.allocated)
            .field("free", &self.free.len())
            .finish()
    }
}

/// Records commands into one pooled buffer.
///
/// Every resource passed to a recording method is pinned until the
/// submission completes.
pub struct CmdBufferRecorder {
    data: Option<CmdBufferData>,
    releaser: CmdBufferReleaser,
    commands: Vec<Command>,
    touched: Vec<ManagedResource>,
    touched_keys: HashSet<ResourceKey>,
    region_depth: usize,
}

impl CmdBufferRecorder {
    fn new(data: CmdBufferData, releaser: CmdBufferReleaser) -> Self {
        Self {
            data: Some(data),
            releaser,
            commands: Vec::new(),
            touched: Vec::new(),
            touched_keys: HashSet::new(),
            region_depth: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.data.as_ref().map_or(u32::MAX, CmdBufferData::id)
    }

    pub fn begin_region(&mut self, name: &str) {
        self.region_depth += 1;
        self.commands.push(Command::BeginRegion(name.to_string()));
    }

    pub fn end_region(&mut self) {
        assert!(self.region_depth > 0, "end_region without a matching begin_region");
        self.region_depth -= 1;
        self.commands.push(Command::EndRegion);
    }

    pub fn region_depth(&self) -> usize {
        self.region_depth
    }

    pub fn barrier(&mut self, resource: &impl GpuResource) {
        self.use_resource(resource);
        self.commands.push(Command::Barrier {
            resource: resource.resource_key(),
        });
    }

    pub fn draw(&mut self, label: &str, vertex_count: u32, instance_count: u32) {
        self.commands.push(Command::Draw {
            label: label.to_string(),
            vertex_count,
            instance_count,
        });
    }

    pub fn dispatch(&mut self, label: &str, groups: [u32; 3]) {
        self.commands.push(Command::Dispatch {
            label: label.to_string(),
            groups,
        });
    }

    /// Copies the overlapping prefix of `src` into `dst`.
    pub fn copy_buffer(&mut self, src: &Buffer, dst: &Buffer) {
        self.use_resource(src);
        self.use_resource(dst);
        self.commands.push(Command::CopyBuffer {
            src: src.key(),
            dst: dst.key(),
            size: src.size().min(dst.size()),
        });
    }

    pub fn clear(&mut self, target: &impl GpuResource, value: [f32; 4]) {
        self.use_resource(target);
        self.commands.push(Command::Clear {
            target: target.resource_key(),
            value,
        });
    }

    pub fn bind_descriptor_set(&mut self, set: &DescriptorSet) {
        self.use_resource(set);
        self.commands.push(Command::BindDescriptorSet { set: set.key() });
    }

    pub fn set_params(&mut self, label: &str, values: &[f32]) {
        self.commands.push(Command::SetParams {
            label: label.to_string(),
            values: values.to_vec(),
        });
    }

    /// Pins a resource without recording a command for it.
    pub fn use_resource(&mut self, resource: &impl GpuResource) {
        if self.touched_keys.insert(resource.resource_key()) {
            self.touched.push(resource.to_managed());
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Seals the buffer for submission.
    ///
    /// # Panics
    ///
    /// Panics if a region is still open.
    pub fn finish(mut self) -> RecordedCmdBuffer {
        assert!(
            self.region_depth == 0,
            "command buffer {} finished with {} unclosed region(s)",
            self.id(),
            self.region_depth
        );
        RecordedCmdBuffer {
            data: self.data.take(),
            releaser: self.releaser.clone(),
            commands: std::mem::take(&mut self.commands),
            touched: std::mem::take(&mut self.touched),
        }
    }
}

impl Drop for CmdBufferRecorder {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            log::debug!("Command buffer {} discarded before finish", data.id);
            self.releaser.release(data);
        }
    }
}

impl std::fmt::Debug for CmdBufferRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdBufferRecorder")
            .field("id", &self.id())
            .field("commands", &self.commands.len())
            .field("touched", &self.touched.len())
            .field("region_depth", &self.region_depth)
            .finish()
    }
}

/// A finished command buffer waiting for submission.
pub struct RecordedCmdBuffer {
    data: Option<CmdBufferData>,
    releaser: CmdBufferReleaser,
    commands: Vec<Command>,
    touched: Vec<ManagedResource>,
}

impl RecordedCmdBuffer {
    pub fn id(&self) -> u32 {
        self.data.as_ref().map_or(u32::MAX, CmdBufferData::id)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Resources the buffer references, in first-use order.
    pub fn touched(&self) -> &[ManagedResource] {
        &self.touched
    }

    /// Splits a submitted buffer into what the lifetime ledger must hold.
    pub(crate) fn into_parts(mut self) -> (Option<CmdBufferData>, Vec<ManagedResource>) {
        (self.data.take(), std::mem::take(&mut self.touched))
    }
}

impl Drop for RecordedCmdBuffer {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            log::debug!("Command buffer {} dropped without submission", data.id);
            self.releaser.release(data);
        }
    }
}

impl std::fmt::Debug for RecordedCmdBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordedCmdBuffer")
            .field("id", &self.id())
            .field("commands", &self.commands)
            .finish()
    }
}

static_assertions::assert_impl_all!(CmdBufferPool: Send);
static_assertions::assert_impl_all!(RecordedCmdBuffer: Send);
