//! Descriptor set resource.

use std::sync::Arc;

use super::{RawHandle, ResourceKey};

/// A set of bound shader resources. Written on the CPU and read by the GPU,
/// so it must outlive every submission that binds it.
#[derive(Clone)]
pub struct DescriptorSet {
    inner: Arc<DescriptorSetInner>,
}

struct DescriptorSetInner {
    handle: RawHandle,
    label: String,
}

impl DescriptorSet {
    pub(crate) fn new(handle: RawHandle, label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(DescriptorSetInner {
                handle,
                label: label.into(),
            }),
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.inner.handle.key()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl std::fmt::Debug for DescriptorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("key", &self.key())
            .field("label", &self.inner.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(DescriptorSet: Send, Sync);
