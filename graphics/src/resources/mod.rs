//! GPU resources.
//!
//! This module contains the GPU resource types that are created by [`Device`]:
//! - [`Buffer`] - GPU memory buffer (including staging buffers)
//! - [`Texture`] / [`TextureView`] - GPU image and a view onto it
//! - [`DescriptorSet`] - bound shader resources
//!
//! Resources are reference-counted with [`Arc`] and can be shared across threads.
//! The backend object is destroyed when the last clone is dropped, so keeping a
//! clone alive (see [`LifetimeManager`]) is how in-flight work pins a resource.
//!
//! [`Device`]: crate::Device
//! [`LifetimeManager`]: crate::LifetimeManager
//! [`Arc`]: std::sync::Arc

mod buffer;
mod descriptor_set;
mod texture;

pub use buffer::Buffer;
pub use descriptor_set::DescriptorSet;
pub use texture::{Texture, TextureView};

use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::lifetime::ManagedResource;

/// Backend identity of a GPU object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    Buffer(u32),
    Texture(u32),
    DescriptorSet(u32),
    CmdBuffer(u32),
}

/// Owns one backend object and destroys it on drop.
pub(crate) struct RawHandle {
    key: ResourceKey,
    backend: Arc<dyn GpuBackend>,
}

impl RawHandle {
    pub(crate) fn new(key: ResourceKey, backend: Arc<dyn GpuBackend>) -> Self {
        Self { key, backend }
    }

    pub(crate) fn key(&self) -> ResourceKey {
        self.key
    }
}

impl Drop for RawHandle {
    fn drop(&mut self) {
        log::trace!("Releasing {:?} on {}", self.key, self.backend.name());
        self.backend.destroy(self.key);
    }
}

impl std::fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RawHandle").field(&self.key).finish()
    }
}

/// Anything a command buffer can reference.
///
/// Recording a command against a resource pins a clone of it until the
/// submission that used it has completed.
pub trait GpuResource {
    fn resource_key(&self) -> ResourceKey;

    /// A keep-alive clone for the lifetime ledger.
    fn to_managed(&self) -> ManagedResource;
}

impl GpuResource for Buffer {
    fn resource_key(&self) -> ResourceKey {
        self.key()
    }

    fn to_managed(&self) -> ManagedResource {
        ManagedResource::Buffer(self.clone())
    }
}

impl GpuResource for Texture {
    fn resource_key(&self) -> ResourceKey {
        self.key()
    }

    fn to_managed(&self) -> ManagedResource {
        ManagedResource::Texture(self.clone())
    }
}

impl GpuResource for TextureView {
    fn resource_key(&self) -> ResourceKey {
        self.key()
    }

    fn to_managed(&self) -> ManagedResource {
        ManagedResource::Texture(self.texture().clone())
    }
}

impl GpuResource for DescriptorSet {
    fn resource_key(&self) -> ResourceKey {
        self.key()
    }

    fn to_managed(&self) -> ManagedResource {
        ManagedResource::DescriptorSet(self.clone())
    }
}
