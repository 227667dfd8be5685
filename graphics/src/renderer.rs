//! Renderer facade.
//!
//! [`Renderer`] owns the device, the frame pipeline and one
//! [`WorkerContext`] per thread that has rendered. Each
//! [`Renderer::render_frame`] declares the default frame graph:
//!
//! ```text
//! scene-visibility ──> depth-prepass ──> lighting ──> tone-mapping
//!         └──────────────────────────────────^
//! ```
//!
//! Tone mapping is declared first and wired to lighting afterwards, so the
//! graph order never depends on declaration order.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use ember_core::{frame_mark, profile_function, profile_plot};

use crate::backend::GpuBackend;
#[cfg(feature = "dummy")]
use crate::backend::{CompletionMode, DummyBackend};
use crate::config::RendererConfig;
use crate::debug_values::DebugValues;
use crate::device::Device;
use crate::error::Result;
use crate::frame::FrameToken;
use crate::frame_graph::{
    ExecutionEnv, FrameGraph, FrameOutputs, NodeRef, PendingOp, ToneMapSettings, TransientPool,
    TransientStats,
};
use crate::pipeline::FramePipeline;
use crate::resources::TextureView;
use crate::scene::{Camera, Scene, SceneVisibility};
use crate::sync::Epoch;
use crate::types::{Extent2d, TextureDescriptor, TextureFormat, TextureUsage};
use crate::worker::{WorkerContext, WorkerRegistry};

pub const DEFAULT_EXTENT: Extent2d = Extent2d::new(1280, 720);

/// Debug command that drops every idle transient resource.
pub const RESET_TRANSIENTS_COMMAND: &str = "renderer.reset_transients";

/// Handles on the nodes of the default frame graph.
#[derive(Debug, Clone, Copy)]
pub struct DefaultNodes {
    pub visibility: NodeRef<Arc<SceneVisibility>>,
    pub depth: NodeRef<TextureView>,
    pub lighting: NodeRef<TextureView>,
    pub tone_mapping: NodeRef<TextureView>,
}

/// Declares visibility, depth prepass, lighting and tone mapping for one
/// camera.
pub fn build_default_graph(
    scene: Arc<Scene>,
    camera: &Camera,
    extent: Extent2d,
    settings: ToneMapSettings,
) -> (FrameGraph, DefaultNodes) {
    let mut graph = FrameGraph::new();

    let tone_mapping = graph.add_node::<TextureView>("tone-mapping").node();

    let visibility = graph
        .add_node::<Arc<SceneVisibility>>("scene-visibility")
        .set_op(PendingOp::SceneVisibility {
            scene,
            camera: camera.clone(),
        });

    let depth_image = graph.create_image(
        TextureDescriptor::new_2d(
            extent.width,
            extent.height,
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
        .with_label("depth"),
    );
    let hdr_image = graph.create_image(
        TextureDescriptor::new_2d(
            extent.width,
            extent.height,
            TextureFormat::Rgba16Float,
            TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
        )
        .with_label("hdr"),
    );
    let output_image = graph.create_image(
        TextureDescriptor::new_2d(
            extent.width,
            extent.height,
            TextureFormat::Rgba8UnormSrgb,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
        )
        .with_label("tone-mapped"),
    );

    let mut depth = graph.add_node::<TextureView>("depth-prepass");
    let visible = depth.add_dependency(visibility);
    depth.writes(depth_image);
    let depth = depth.set_op(PendingOp::DepthPrepass {
        visibility: visible,
        depth: depth_image,
    });

    let mut lighting = graph.add_node::<TextureView>("lighting");
    let visible = lighting.add_dependency(visibility);
    let depth_view = lighting.add_dependency(depth);
    lighting.reads(depth_image).writes(hdr_image);
    let lighting = lighting.set_op(PendingOp::Lighting {
        visibility: visible,
        depth: depth_view,
        color: hdr_image,
    });

    let mut tone = graph.configure(tone_mapping);
    let hdr = tone.add_dependency(lighting);
    tone.reads(hdr_image).writes(output_image);
    tone.set_op(PendingOp::ToneMapping {
        hdr,
        output: output_image,
        settings,
    });

    let nodes = DefaultNodes {
        visibility,
        depth,
        lighting,
        tone_mapping,
    };
    (graph, nodes)
}

/// What one rendered frame produced.
#[derive(Debug)]
pub struct RenderOutputs {
    outputs: FrameOutputs,
    nodes: DefaultNodes,
}

impl RenderOutputs {
    pub fn depth(&self) -> &TextureView {
        self.outputs.get(self.nodes.depth)
    }

    /// Lit HDR color before tone mapping.
    pub fn hdr(&self) -> &TextureView {
        self.outputs.get(self.nodes.lighting)
    }

    pub fn tone_mapped(&self) -> &TextureView {
        self.outputs.get(self.nodes.tone_mapping)
    }

    pub fn visibility(&self) -> &Arc<SceneVisibility> {
        self.outputs.get(self.nodes.visibility)
    }

    pub fn epoch(&self) -> Epoch {
        self.outputs.epoch()
    }

    pub fn frame(&self) -> &FrameToken {
        self.outputs.frame()
    }

    pub fn frame_outputs(&self) -> &FrameOutputs {
        &self.outputs
    }
}

/// Renders scenes through the default frame graph.
pub struct Renderer {
    device: Arc<Device>,
    config: RendererConfig,
    pipeline: FramePipeline,
    registry: Arc<WorkerRegistry>,
    contexts: HashMap<ThreadId, WorkerContext>,
    transients: TransientPool,
    debug_values: Arc<DebugValues>,
    extent: Extent2d,
    shut_down: bool,
}

impl Renderer {
    pub fn new(backend: Arc<dyn GpuBackend>, config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let device = Device::new(backend)?;
        log::info!(
            "Renderer created: {} frames in flight, {} ms fence timeout",
            config.frames_in_flight,
            config.fence_timeout_ms
        );
        Ok(Self {
            device,
            pipeline: FramePipeline::new(config.frames_in_flight),
            transients: TransientPool::with_max_idle_frames(config.transient_idle_frames),
            config,
            registry: Arc::new(WorkerRegistry::new()),
            contexts: HashMap::new(),
            debug_values: Arc::new(DebugValues::new()),
            extent: DEFAULT_EXTENT,
            shut_down: false,
        })
    }

    #[cfg(feature = "dummy")]
    /// Renderer on a [`DummyBackend`] whose completion mode follows
    /// `auto_complete_submissions`.
    pub fn with_dummy_backend(config: RendererConfig) -> Result<Self> {
        let mode = if config.auto_complete_submissions {
            CompletionMode::Immediate
        } else {
            CompletionMode::Manual
        };
        Self::new(Arc::new(DummyBackend::with_mode(mode)), config)
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn debug_values(&self) -> &Arc<DebugValues> {
        &self.debug_values
    }

    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    pub fn resize(&mut self, extent: Extent2d) {
        if extent != self.extent {
            log::debug!(
                "Renderer resized to {}x{}",
                extent.width,
                extent.height
            );
            self.extent = extent;
        }
    }

    /// Worker contexts created so far, one per rendering thread.
    pub fn worker_count(&self) -> usize {
        self.contexts.len()
    }

    pub fn transient_stats(&self) -> TransientStats {
        self.transients.stats()
    }

    /// Resources still pinned by unfinished submissions, over all workers.
    pub fn pending_resources(&self) -> usize {
        self.contexts
            .values()
            .map(|ctx| ctx.lifetime().pending_count())
            .sum()
    }

    /// Resources pinned by the context of `thread`, if it ever rendered.
    pub fn pending_resources_on(&self, thread: ThreadId) -> Option<usize> {
        self.contexts
            .get(&thread)
            .map(|ctx| ctx.lifetime().pending_count())
    }

    /// Declares, executes and submits the default frame graph.
    ///
    /// Every worker context is collected first, so a context whose thread no
    /// longer renders still releases its resources. Blocks, at most the
    /// configured fence timeout, while the frame slot is still in use by the
    /// GPU.
    pub fn render_frame(&mut self, scene: Arc<Scene>, camera: &Camera) -> Result<RenderOutputs> {
        profile_function!();

        // Contexts of threads that stopped rendering still hold pins.
        for worker in self.contexts.values_mut() {
            worker.collect()?;
        }
        profile_plot!("pending resources", self.pending_resources());

        let worker = self
            .contexts
            .entry(thread::current().id())
            .or_insert_with(|| {
                WorkerContext::with_registry(Arc::clone(&self.device), Arc::clone(&self.registry))
            });

        if self.debug_values.command(RESET_TRANSIENTS_COMMAND) {
            self.transients.clear();
        }

        let frame = self.pipeline.begin_frame(
            self.device.graphics_queue(),
            self.extent,
            self.config.fence_timeout(),
        )?;

        let settings = ToneMapSettings {
            exposure: self.debug_values.float_value("tonemap.exposure", 1.0) as f32,
            white_point: self.debug_values.float_value("tonemap.white_point", 4.0) as f32,
        };
        let (graph, nodes) = build_default_graph(scene, camera, self.extent, settings);

        let mut env = ExecutionEnv::new(&frame, &mut self.transients);
        match graph.finalize().execute(worker, &mut env) {
            Ok(outputs) => {
                self.pipeline.end_frame(outputs.epoch());
                frame_mark!();
                Ok(RenderOutputs { outputs, nodes })
            }
            Err(err) => {
                log::error!("Frame {} failed: {err}", frame.frame_id());
                self.pipeline.cancel_frame();
                Err(err)
            }
        }
    }

    /// Waits for the GPU and releases everything the worker contexts hold.
    pub fn shutdown(&mut self) -> Result<()> {
        let timeout = self.config.fence_timeout();
        self.pipeline
            .wait_idle(self.device.graphics_queue(), timeout)?;
        for worker in self.contexts.values_mut() {
            worker.collect()?;
        }
        self.transients.clear();
        self.shut_down = true;
        log::info!(
            "Renderer shut down after {} frames",
            self.pipeline.frame_count()
        );
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if !self.shut_down
            && let Err(err) = self.shutdown()
        {
            log::error!("Renderer dropped without a clean shutdown: {err}");
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("backend", &self.device.backend().name())
            .field("extent", &self.extent)
            .field("frames", &self.pipeline.frame_count())
            .field("workers", &self.contexts.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Renderer: Send);
