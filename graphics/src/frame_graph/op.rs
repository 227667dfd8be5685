//! Node operations and results.
//!
//! A node's work is a [`PendingOp`]: the operation kind plus every input it
//! captured at declaration time. Nothing runs until the compiled graph
//! dispatches it, and by then every [`Deferred`] it holds has a value.

use std::sync::Arc;

use ember_core::math::Vec3;

use super::handle::{BufferId, Deferred, ImageId, NodeId, ResourceId};
use super::NodeResults;
use crate::command::CmdBufferRecorder;
use crate::frame::FrameToken;
use crate::resources::{Buffer, TextureView};
use crate::scene::{Camera, Scene, SceneVisibility};

/// Value a node hands to its dependents.
#[derive(Debug, Clone)]
pub enum NodeOutput {
    Unit,
    Scalar(f64),
    Visibility(Arc<SceneVisibility>),
    Texture(TextureView),
    Buffer(Buffer),
}

impl NodeOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Scalar(_) => "scalar",
            Self::Visibility(_) => "visibility",
            Self::Texture(_) => "texture",
            Self::Buffer(_) => "buffer",
        }
    }
}

/// Rust types a node may declare as its result.
pub trait NodeResult: 'static {
    fn from_output(output: &NodeOutput) -> Option<&Self>;
}

impl NodeResult for () {
    fn from_output(output: &NodeOutput) -> Option<&Self> {
        match output {
            NodeOutput::Unit => Some(&()),
            _ => None,
        }
    }
}

impl NodeResult for f64 {
    fn from_output(output: &NodeOutput) -> Option<&Self> {
        match output {
            NodeOutput::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

impl NodeResult for Arc<SceneVisibility> {
    fn from_output(output: &NodeOutput) -> Option<&Self> {
        match output {
            NodeOutput::Visibility(visibility) => Some(visibility),
            _ => None,
        }
    }
}

impl NodeResult for TextureView {
    fn from_output(output: &NodeOutput) -> Option<&Self> {
        match output {
            NodeOutput::Texture(view) => Some(view),
            _ => None,
        }
    }
}

impl NodeResult for Buffer {
    fn from_output(output: &NodeOutput) -> Option<&Self> {
        match output {
            NodeOutput::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }
}

/// Parameters of the tone mapping pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMapSettings {
    pub exposure: f32,
    /// Luminance mapped to pure white.
    pub white_point: f32,
}

impl Default for ToneMapSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            white_point: 4.0,
        }
    }
}

impl ToneMapSettings {
    /// Extended Reinhard on a linear HDR color.
    pub fn apply(&self, hdr: Vec3) -> Vec3 {
        let white_sq = self.white_point * self.white_point;
        hdr.map(|c| {
            let c = c * self.exposure;
            c * (1.0 + c / white_sq) / (1.0 + c)
        })
    }
}

type CustomOp = Box<dyn FnOnce(&mut OpContext<'_>) -> NodeOutput + Send>;

/// Deferred work of one node.
pub enum PendingOp {
    /// Culls `scene` for `camera`. Produces `Arc<SceneVisibility>`.
    SceneVisibility { scene: Arc<Scene>, camera: Camera },
    /// Draws visible meshes into `depth`. Produces its `TextureView`.
    DepthPrepass {
        visibility: Deferred<Arc<SceneVisibility>>,
        depth: ImageId,
    },
    /// Shades `color` from the visible lights. Produces its `TextureView`.
    Lighting {
        visibility: Deferred<Arc<SceneVisibility>>,
        depth: Deferred<TextureView>,
        color: ImageId,
    },
    /// Maps `hdr` into `output`. Produces the output `TextureView`.
    ToneMapping {
        hdr: Deferred<TextureView>,
        output: ImageId,
        settings: ToneMapSettings,
    },
    Custom(CustomOp),
}

impl PendingOp {
    pub fn custom<F>(op: F) -> Self
    where
        F: FnOnce(&mut OpContext<'_>) -> NodeOutput + Send + 'static,
    {
        Self::Custom(Box::new(op))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SceneVisibility { .. } => "scene-visibility",
            Self::DepthPrepass { .. } => "depth-prepass",
            Self::Lighting { .. } => "lighting",
            Self::ToneMapping { .. } => "tone-mapping",
            Self::Custom(_) => "custom",
        }
    }

    pub(crate) fn run(self, ctx: &mut OpContext<'_>) -> NodeOutput {
        match self {
            Self::SceneVisibility { scene, camera } => {
                NodeOutput::Visibility(Arc::new(SceneVisibility::compute(&scene, &camera)))
            }
            Self::DepthPrepass { visibility, depth } => {
                let visibility = Arc::clone(ctx.get(visibility));
                let target = ctx.image(depth).clone();
                let recorder = ctx.recorder();
                recorder.clear(&target, [1.0, 0.0, 0.0, 0.0]);
                for mesh in visibility.meshes() {
                    recorder.draw(&mesh.label, mesh.vertex_count, 1);
                }
                NodeOutput::Texture(target)
            }
            Self::Lighting {
                visibility,
                depth,
                color,
            } => {
                let visibility = Arc::clone(ctx.get(visibility));
                let depth = ctx.get(depth).clone();
                let target = ctx.image(color).clone();
                let extent = ctx.frame().extent();
                let recorder = ctx.recorder();

                recorder.use_resource(&depth);
                recorder.clear(&target, [0.0; 4]);
                recorder.set_params(
                    "light_counts",
                    &[
                        visibility.point_lights().len() as f32,
                        visibility.spot_lights().len() as f32,
                    ],
                );
                for light in visibility.point_lights() {
                    let radiance = light.color * light.intensity;
                    recorder.set_params(
                        "point_light",
                        &[
                            light.position.x,
                            light.position.y,
                            light.position.z,
                            light.radius,
                            radiance.x,
                            radiance.y,
                            radiance.z,
                        ],
                    );
                }
                for light in visibility.spot_lights() {
                    let radiance = light.color * light.intensity;
                    recorder.set_params(
                        "spot_light",
                        &[
                            light.position.x,
                            light.position.y,
                            light.position.z,
                            light.direction.x,
                            light.direction.y,
                            light.direction.z,
                            light.radius,
                            light.outer_angle.cos(),
                            radiance.x,
                            radiance.y,
                            radiance.z,
                        ],
                    );
                }
                recorder.dispatch(
                    "deferred_lighting",
                    [extent.width.div_ceil(8), extent.height.div_ceil(8), 1],
                );
                NodeOutput::Texture(target)
            }
            Self::ToneMapping {
                hdr,
                output,
                settings,
            } => {
                let hdr = ctx.get(hdr).clone();
                let target = ctx.image(output).clone();
                let recorder = ctx.recorder();
                recorder.use_resource(&hdr);
                recorder.set_params("tonemap", &[settings.exposure, settings.white_point]);
                recorder.draw("tonemap_fullscreen", 3, 1);
                NodeOutput::Texture(target)
            }
            Self::Custom(op) => op(ctx),
        }
    }
}

impl std::fmt::Debug for PendingOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What an executing node can see.
pub struct OpContext<'a> {
    pub(crate) node: NodeId,
    pub(crate) name: &'a str,
    pub(crate) dependencies: &'a [NodeId],
    pub(crate) resources: &'a [ResourceId],
    pub(crate) results: &'a NodeResults,
    pub(crate) images: &'a [TextureView],
    pub(crate) buffers: &'a [Buffer],
    pub(crate) recorder: &'a mut CmdBufferRecorder,
    pub(crate) frame: &'a FrameToken,
}

impl OpContext<'_> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn frame(&self) -> &FrameToken {
        self.frame
    }

    /// Result of a declared dependency.
    ///
    /// # Panics
    ///
    /// Panics if `deferred` belongs to a node this one did not declare as a
    /// dependency.
    pub fn get<T: NodeResult>(&self, deferred: Deferred<T>) -> &T {
        assert!(
            self.dependencies.contains(&deferred.node()),
            "frame graph node '{}' resolved the result of '{}' without declaring it as a dependency",
            self.name,
            self.results.name(deferred.node())
        );
        self.results.get(deferred)
    }

    /// A declared image.
    ///
    /// # Panics
    ///
    /// Panics if this node neither reads nor writes `id`.
    pub fn image(&self, id: ImageId) -> &TextureView {
        self.assert_declared(ResourceId::Image(id));
        &self.images[id.0 as usize]
    }

    /// A declared buffer.
    ///
    /// # Panics
    ///
    /// Panics if this node neither reads nor writes `id`.
    pub fn buffer(&self, id: BufferId) -> &Buffer {
        self.assert_declared(ResourceId::Buffer(id));
        &self.buffers[id.0 as usize]
    }

    pub fn recorder(&mut self) -> &mut CmdBufferRecorder {
        self.recorder
    }

    fn assert_declared(&self, resource: ResourceId) {
        assert!(
            self.resources.contains(&resource),
            "frame graph node '{}' used {resource:?} without declaring it",
            self.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reinhard_maps_white_point_to_one() {
        let settings = ToneMapSettings {
            exposure: 1.0,
            white_point: 4.0,
        };
        let mapped = settings.apply(Vec3::new(4.0, 0.0, 1.0));
        assert!((mapped.x - 1.0).abs() < 1e-6);
        assert_eq!(mapped.y, 0.0);
        assert!(mapped.z > 0.5 && mapped.z < 1.0);
    }

    #[test]
    fn test_exposure_scales_input() {
        let dark = ToneMapSettings {
            exposure: 0.5,
            ..Default::default()
        };
        let bright = ToneMapSettings::default();
        let hdr = Vec3::new(1.0, 1.0, 1.0);
        assert!(dark.apply(hdr).x < bright.apply(hdr).x);
    }

    #[test]
    fn test_result_type_matching() {
        assert_eq!(f64::from_output(&NodeOutput::Scalar(2.5)), Some(&2.5));
        assert!(f64::from_output(&NodeOutput::Unit).is_none());
        assert!(<()>::from_output(&NodeOutput::Unit).is_some());
        assert_eq!(NodeOutput::Scalar(0.0).kind(), "scalar");
    }
}
