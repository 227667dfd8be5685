//! GPU texture resource.

use std::sync::Arc;

use super::{RawHandle, ResourceKey};
use crate::types::{Extent2d, TextureDescriptor, TextureFormat};

/// A GPU texture resource.
///
/// Textures are created by [`Device::create_texture`] and are reference-counted.
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture(&TextureDescriptor::new_2d(
///     1920, 1080,
///     TextureFormat::Rgba8Unorm,
///     TextureUsage::RENDER_ATTACHMENT,
/// ))?;
/// println!("Texture size: {}x{}", texture.width(), texture.height());
/// ```
///
/// [`Device::create_texture`]: crate::Device::create_texture
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

struct TextureInner {
    handle: RawHandle,
    descriptor: TextureDescriptor,
}

impl Texture {
    pub(crate) fn new(handle: RawHandle, descriptor: TextureDescriptor) -> Self {
        Self {
            inner: Arc::new(TextureInner { handle, descriptor }),
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.inner.handle.key()
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.inner.descriptor
    }

    pub fn size(&self) -> Extent2d {
        self.inner.descriptor.size
    }

    pub fn width(&self) -> u32 {
        self.inner.descriptor.size.width
    }

    pub fn height(&self) -> u32 {
        self.inner.descriptor.size.height
    }

    pub fn format(&self) -> TextureFormat {
        self.inner.descriptor.format
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.descriptor.label.as_deref()
    }

    /// Full view of the texture. The view keeps the texture alive.
    pub fn create_view(&self) -> TextureView {
        TextureView {
            texture: self.clone(),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("key", &self.key())
            .field("size", &self.inner.descriptor.size)
            .field("format", &self.inner.descriptor.format)
            .field("usage", &self.inner.descriptor.usage)
            .field("label", &self.inner.descriptor.label)
            .finish()
    }
}

/// Read-only view of a [`Texture`], the unit frame graph nodes hand to each
/// other and to UI panels.
#[derive(Debug, Clone)]
pub struct TextureView {
    texture: Texture,
}

impl TextureView {
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn key(&self) -> ResourceKey {
        self.texture.key()
    }

    pub fn format(&self) -> TextureFormat {
        self.texture.format()
    }

    pub fn size(&self) -> Extent2d {
        self.texture.size()
    }

    pub fn label(&self) -> Option<&str> {
        self.texture.label()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);
static_assertions::assert_impl_all!(TextureView: Send, Sync);
