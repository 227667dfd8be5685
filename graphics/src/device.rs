//! Graphics device.
//!
//! The [`Device`] is the main interface for creating GPU resources. It fetches
//! the backend's queue families exactly once and keeps one [`Queue`] per
//! family for its whole lifetime.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::GpuBackend;
use crate::error::{GraphicsError, Result};
use crate::queue::{Queue, QueueKind};
use crate::resources::{Buffer, DescriptorSet, RawHandle, ResourceKey, Texture};
use crate::types::{BufferDescriptor, TextureDescriptor};

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `Device` is `Send + Sync` and is shared as `Arc<Device>` by every worker
/// context. Queues are read-only after construction.
///
/// # Example
///
/// ```ignore
/// let device = Device::new(Arc::new(DummyBackend::new()))?;
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// ```
pub struct Device {
    backend: Arc<dyn GpuBackend>,
    queues: Vec<Arc<Queue>>,
    graphics_queue: usize,
}

impl Device {
    /// Creates a device on `backend`.
    ///
    /// # Errors
    ///
    /// Returns `InitializationFailed` if the backend exposes no graphics queue.
    pub fn new(backend: Arc<dyn GpuBackend>) -> Result<Arc<Self>> {
        let families = backend.queue_families();
        let Some(graphics_queue) = families.iter().position(|f| f.kind == QueueKind::Graphics)
        else {
            return Err(GraphicsError::InitializationFailed(format!(
                "backend '{}' exposes no graphics queue family",
                backend.name()
            )));
        };

        let queues = families
            .into_iter()
            .map(|family| Arc::new(Queue::new(family, Arc::clone(&backend))))
            .collect::<Vec<_>>();

        log::info!(
            "Created device on the {} backend with {} queue families",
            backend.name(),
            queues.len()
        );

        Ok(Arc::new(Self {
            backend,
            queues,
            graphics_queue,
        }))
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    pub fn queues(&self) -> &[Arc<Queue>] {
        &self.queues
    }

    /// First queue of the given kind, if the device has one.
    pub fn queue(&self, kind: QueueKind) -> Option<&Arc<Queue>> {
        self.queues.iter().find(|q| q.kind() == kind)
    }

    pub fn graphics_queue(&self) -> &Arc<Queue> {
        &self.queues[self.graphics_queue]
    }

    pub fn is_lost(&self) -> bool {
        self.backend.is_device_lost()
    }

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or the backend allocation fails.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<Buffer> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }
        let id = self.backend.create_buffer(descriptor)?;
        let handle = RawHandle::new(ResourceKey::Buffer(id), Arc::clone(&self.backend));
        Ok(Buffer::new(handle, descriptor.clone()))
    }

    /// Create a 2D texture.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero or the backend allocation fails.
    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<Texture> {
        if descriptor.size.is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture size {}x{} is empty",
                descriptor.size.width, descriptor.size.height
            )));
        }
        let id = self.backend.create_texture(descriptor)?;
        let handle = RawHandle::new(ResourceKey::Texture(id), Arc::clone(&self.backend));
        Ok(Texture::new(handle, descriptor.clone()))
    }

    pub fn create_descriptor_set(&self, label: &str) -> Result<DescriptorSet> {
        let id = self.backend.create_descriptor_set(label)?;
        let handle = RawHandle::new(ResourceKey::DescriptorSet(id), Arc::clone(&self.backend));
        Ok(DescriptorSet::new(handle, label))
    }

    /// Waits until every queue has finished all submitted work.
    pub fn wait_idle(&self, timeout: Duration) -> Result<()> {
        for queue in &self.queues {
            queue.wait_idle(timeout)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.backend.name())
            .field("queues", &self.queues)
            .finish()
    }
}

static_assertions::assert_impl_all!(Device: Send, Sync);
