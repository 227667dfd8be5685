//! GPU backend abstraction.
//!
//! A backend hands out raw resource ids, accepts recorded command buffers
//! for a queue family, and signals a [`Fence`] for every submission once the
//! hardware is done with it. Everything above this trait (queues, lifetime
//! tracking, the frame graph) only relies on those three contracts.

#[cfg(feature = "dummy")]
pub mod dummy;

#[cfg(feature = "dummy")]
pub use dummy::{CompletionMode, DummyBackend, SubmissionRecord};

use crate::command::RecordedCmdBuffer;
use crate::error::Result;
use crate::queue::QueueFamily;
use crate::resources::ResourceKey;
use crate::sync::Fence;
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Implemented by every graphics backend.
///
/// All methods may be called from any thread. Submissions to one queue
/// family are serialized by the caller.
pub trait GpuBackend: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Queue families exposed by the device. Queried once at device creation.
    fn queue_families(&self) -> Vec<QueueFamily>;

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<u32>;

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<u32>;

    fn create_descriptor_set(&self, label: &str) -> Result<u32>;

    /// Allocates a new command buffer. Fails with `OutOfMemory` when the
    /// device cannot grow its command pools any further.
    fn allocate_cmd_buffer(&self) -> Result<u32>;

    /// Hands a recorded buffer to the hardware. `fence` must be signaled
    /// once the GPU has finished executing it.
    fn submit(&self, family: &QueueFamily, cmd: &RecordedCmdBuffer, fence: Fence) -> Result<()>;

    /// Releases a resource. Only called once nothing can still use it.
    fn destroy(&self, key: ResourceKey);

    fn is_device_lost(&self) -> bool;
}
