//! GPU buffer resource.

use std::sync::Arc;

use super::{RawHandle, ResourceKey};
use crate::types::BufferDescriptor;

/// A GPU buffer resource.
///
/// Buffers are created by [`Device::create_buffer`] and are reference-counted.
/// Cloning is cheap; the backend buffer is destroyed with the last clone.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// println!("Buffer size: {}", buffer.size());
/// ```
///
/// [`Device::create_buffer`]: crate::Device::create_buffer
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

struct BufferInner {
    handle: RawHandle,
    descriptor: BufferDescriptor,
}

impl Buffer {
    pub(crate) fn new(handle: RawHandle, descriptor: BufferDescriptor) -> Self {
        Self {
            inner: Arc::new(BufferInner { handle, descriptor }),
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.inner.handle.key()
    }

    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.inner.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.inner.descriptor.size
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.descriptor.label.as_deref()
    }

    /// Whether both values refer to the same backend buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("key", &self.key())
            .field("size", &self.inner.descriptor.size)
            .field("usage", &self.inner.descriptor.usage)
            .field("label", &self.inner.descriptor.label)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, GpuBackend};
    use crate::types::BufferUsage;

    fn make_buffer(backend: &Arc<DummyBackend>, desc: BufferDescriptor) -> Buffer {
        let id = backend.create_buffer(&desc).unwrap();
        let backend: Arc<dyn GpuBackend> = backend.clone();
        Buffer::new(RawHandle::new(ResourceKey::Buffer(id), backend), desc)
    }

    #[test]
    fn test_buffer_debug() {
        let backend = Arc::new(DummyBackend::new());
        let buffer = make_buffer(&backend, BufferDescriptor::new(1024, BufferUsage::VERTEX));
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("Buffer"));
        assert!(debug.contains("1024"));
    }

    #[test]
    fn test_buffer_destroyed_with_last_clone() {
        let backend = Arc::new(DummyBackend::new());
        let buffer = make_buffer(&backend, BufferDescriptor::staging(64).with_label("upload"));
        let key = buffer.key();
        let clone = buffer.clone();
        assert!(clone.ptr_eq(&buffer));
        assert_eq!(clone.label(), Some("upload"));

        drop(buffer);
        assert_eq!(backend.destroy_count(key), 0);
        drop(clone);
        assert_eq!(backend.destroy_count(key), 1);
    }
}
