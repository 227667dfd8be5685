//! # Ember Graphics
//!
//! Frame-graph renderer core: per-frame dependency graphs, per-thread
//! command recording, and epoch-based lifetime tracking of GPU resources.
//!
//! ## Overview
//!
//! - [`FrameGraph`] - typed nodes with deferred operations, ordered by Kahn's algorithm
//! - [`WorkerContext`] - one thread's [`CmdBufferPool`] and [`LifetimeManager`]
//! - [`Queue`] - submissions, fences and the completed-epoch watermark
//! - [`FramePipeline`] - frames in flight and [`FrameToken`]s
//! - [`scene`] - cells, culling and the visibility snapshot
//! - [`Renderer`] - the default visibility, depth, lighting and tone mapping graph
//! - [`DummyBackend`] - a [`GpuBackend`] that records instead of rendering
//!
//! ## Example
//!
//! ```ignore
//! use ember_graphics::{Renderer, RendererConfig};
//!
//! let mut renderer = Renderer::with_dummy_backend(RendererConfig::default())?;
//! let outputs = renderer.render_frame(scene, &camera)?;
//! let image = outputs.tone_mapped();
//! renderer.shutdown()?;
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod debug_values;
pub mod device;
pub mod error;
pub mod frame;
pub mod frame_graph;
pub mod lifetime;
pub mod pipeline;
pub mod queue;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod sync;
pub mod types;
pub mod worker;

pub use backend::GpuBackend;
#[cfg(feature = "dummy")]
pub use backend::{CompletionMode, DummyBackend};
pub use command::{CmdBufferPool, CmdBufferRecorder, Command, RecordedCmdBuffer};
pub use config::RendererConfig;
pub use debug_values::{DebugValue, DebugValues};
pub use device::Device;
pub use error::{GraphicsError, Result};
pub use frame::FrameToken;
pub use frame_graph::{
    CompiledFrameGraph, Deferred, ExecutionEnv, FrameGraph, FrameOutputs, NodeId, NodeOutput,
    NodeRef, OpContext, PendingOp, ToneMapSettings, TransientPool,
};
pub use lifetime::{LifetimeManager, ManagedResource};
pub use pipeline::FramePipeline;
pub use queue::{Queue, QueueFamily, QueueKind};
pub use renderer::{RenderOutputs, Renderer};
pub use resources::{Buffer, DescriptorSet, GpuResource, ResourceKey, Texture, TextureView};
pub use sync::{Epoch, Fence};
pub use types::{BufferDescriptor, BufferUsage, Extent2d, TextureDescriptor, TextureFormat, TextureUsage};
pub use worker::{WorkerContext, WorkerId, WorkerRegistry};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
