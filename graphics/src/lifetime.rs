//! In-flight resource ledger.
//!
//! GPU commands execute asynchronously: when a buffer is submitted, the CPU
//! moves on while the GPU works one or more frames behind. A resource that a
//! submission references therefore cannot be released when the CPU side is
//! done with it, only once that submission's [`Epoch`] is known complete.
//!
//! The [`LifetimeManager`] holds a keep-alive clone of every such resource
//! tagged with the latest epoch that used it:
//!
//! ```text
//! register_use(R, 3) ──> { R: 3 }
//! register_use(R, 2) ──> { R: 3 }      lifetime is never shortened
//! retire(2)          ──> []            R stays alive
//! retire(3)          ──> [R]           released exactly once
//! retire(3)          ──> []            no-op
//! ```
//!
//! Command buffers are tracked separately so they can be handed back to
//! their pool instead of being destroyed.

use std::collections::{HashMap, VecDeque};

use crate::command::CmdBufferData;
use crate::resources::{Buffer, DescriptorSet, ResourceKey, Texture, TextureView};
use crate::sync::Epoch;

/// A GPU resource pinned by the ledger.
#[derive(Debug, Clone)]
pub enum ManagedResource {
    Buffer(Buffer),
    Texture(Texture),
    DescriptorSet(DescriptorSet),
}

impl ManagedResource {
    pub fn key(&self) -> ResourceKey {
        match self {
            Self::Buffer(buffer) => buffer.key(),
            Self::Texture(texture) => texture.key(),
            Self::DescriptorSet(set) => set.key(),
        }
    }
}

impl From<Buffer> for ManagedResource {
    fn from(buffer: Buffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<Texture> for ManagedResource {
    fn from(texture: Texture) -> Self {
        Self::Texture(texture)
    }
}

impl From<TextureView> for ManagedResource {
    fn from(view: TextureView) -> Self {
        Self::Texture(view.texture().clone())
    }
}

impl From<DescriptorSet> for ManagedResource {
    fn from(set: DescriptorSet) -> Self {
        Self::DescriptorSet(set)
    }
}

#[derive(Debug)]
struct InFlightRecord {
    epoch: Epoch,
    resource: ManagedResource,
}

/// Per-worker ledger of resources referenced by unfinished submissions.
///
/// Not shared between threads: each [`WorkerContext`](crate::WorkerContext)
/// owns one.
#[derive(Debug, Default)]
pub struct LifetimeManager {
    entries: HashMap<ResourceKey, InFlightRecord>,
    /// Sorted by epoch.
    cmd_buffers: VecDeque<(Epoch, CmdBufferData)>,
    retired: Epoch,
}

impl LifetimeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `resource` is referenced by submission `epoch`.
    ///
    /// The resource stays alive until an epoch at least as high as every
    /// epoch it was registered with has been retired.
    pub fn register_use(&mut self, resource: impl Into<ManagedResource>, epoch: Epoch) {
        let resource = resource.into();
        if epoch <= self.retired {
            log::warn!(
                "{:?} registered at epoch {epoch}, which is already retired (watermark {})",
                resource.key(),
                self.retired
            );
        }
        self.entries
            .entry(resource.key())
            .and_modify(|record| record.epoch = record.epoch.max(epoch))
            .or_insert(InFlightRecord { epoch, resource });
    }

    /// Releases every resource whose latest epoch is `<= epoch`.
    ///
    /// The returned resources are ordered by epoch. Dropping them destroys
    /// the backend objects unless other clones are still alive. Retiring an
    /// epoch at or below the current watermark returns nothing.
    #[must_use = "dropping the returned resources is what releases them"]
    pub fn retire(&mut self, epoch: Epoch) -> Vec<ManagedResource> {
        if epoch <= self.retired {
            return Vec::new();
        }
        self.retired = epoch;

        let done: Vec<ResourceKey> = self
            .entries
            .iter()
            .filter(|(_, record)| record.epoch <= epoch)
            .map(|(key, _)| *key)
            .collect();
        let mut released: Vec<InFlightRecord> = done
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .collect();
        released.sort_by_key(|record| (record.epoch, record.resource.key()));

        if !released.is_empty() {
            log::trace!(
                "Retired epoch {epoch}: releasing {} resources, {} still pending",
                released.len(),
                self.entries.len()
            );
        }
        released.into_iter().map(|record| record.resource).collect()
    }

    /// Number of resources awaiting retirement, excluding command buffers.
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Highest epoch retired so far.
    pub fn retired_epoch(&self) -> Epoch {
        self.retired
    }

    /// Keeps a submitted command buffer until `epoch` completes.
    pub fn track_cmd_buffer(&mut self, data: CmdBufferData, epoch: Epoch) {
        let at = self.cmd_buffers.partition_point(|(e, _)| *e <= epoch);
        self.cmd_buffers.insert(at, (epoch, data));
    }

    /// Hands back, oldest first, every command buffer whose epoch is complete.
    pub fn collect(&mut self, completed: Epoch) -> Vec<CmdBufferData> {
        let mut done = Vec::new();
        while let Some((epoch, _)) = self.cmd_buffers.front()
            && *epoch <= completed
        {
            if let Some((_, data)) = self.cmd_buffers.pop_front() {
                done.push(data);
            }
        }
        done
    }

    /// Command buffers still executing on the GPU.
    pub fn active_cmd_buffers(&self) -> usize {
        self.cmd_buffers.len()
    }

    pub fn is_idle(&self) -> bool {
        self.entries.is_empty() && self.cmd_buffers.is_empty()
    }
}

impl Drop for LifetimeManager {
    fn drop(&mut self) {
        if !self.cmd_buffers.is_empty() {
            log::error!(
                "LifetimeManager dropped with {} command buffers in flight; the device was not idle",
                self.cmd_buffers.len()
            );
        }
        if !self.entries.is_empty() {
            log::error!(
                "LifetimeManager dropped with {} unretired resources; leaking them",
                self.entries.len()
            );
            // The GPU may still read them, so they must never reach `destroy`.
            for (_, record) in self.entries.drain() {
                std::mem::forget(record.resource);
            }
        }
    }
}
