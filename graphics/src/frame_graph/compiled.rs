//! Execution of an ordered frame graph.

use std::collections::HashSet;
use std::sync::Arc;

use ember_core::{profile_function, profile_scope_dynamic};

use super::handle::{Deferred, NodeId, NodeRef, ResourceId};
use super::op::{NodeOutput, NodeResult, OpContext};
use super::transient::TransientPool;
use super::{ImageDecl, NodeDecl};
use crate::error::Result;
use crate::frame::FrameToken;
use crate::resources::{Buffer, Texture, TextureView};
use crate::sync::Epoch;
use crate::types::BufferDescriptor;
use crate::worker::WorkerContext;

/// Where a node is in its single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Declared,
    Executing,
    Executed,
}

/// Per-frame inputs to [`CompiledFrameGraph::execute`].
#[derive(Debug)]
pub struct ExecutionEnv<'a> {
    pub frame: &'a FrameToken,
    pub transients: &'a mut TransientPool,
}

impl<'a> ExecutionEnv<'a> {
    pub fn new(frame: &'a FrameToken, transients: &'a mut TransientPool) -> Self {
        Self { frame, transients }
    }
}

/// Results of executed nodes, indexed by node id.
#[derive(Debug)]
pub struct NodeResults {
    names: Vec<String>,
    outputs: Vec<Option<NodeOutput>>,
}

impl NodeResults {
    fn new(names: Vec<String>) -> Self {
        let outputs = vec![None; names.len()];
        Self { names, outputs }
    }

    pub(crate) fn name(&self, id: NodeId) -> &str {
        self.names.get(id.index()).map_or("<unknown>", String::as_str)
    }

    /// # Panics
    ///
    /// Panics if the node has not executed yet.
    pub fn get<T: NodeResult>(&self, deferred: Deferred<T>) -> &T {
        self.get_by_id(deferred.node())
    }

    fn get_by_id<T: NodeResult>(&self, id: NodeId) -> &T {
        let Some(output) = self.outputs.get(id.index()).and_then(Option::as_ref) else {
            panic!(
                "result of frame graph node '{}' requested before it executed",
                self.name(id)
            );
        };
        match T::from_output(output) {
            Some(value) => value,
            None => panic!(
                "frame graph node '{}' holds a {} result, not {}",
                self.name(id),
                output.kind(),
                std::any::type_name::<T>()
            ),
        }
    }

    fn insert(&mut self, id: NodeId, output: NodeOutput) {
        self.outputs[id.index()] = Some(output);
    }
}

struct CompiledNode {
    decl: NodeDecl,
    /// Reads followed by writes, deduplicated.
    resources: Vec<ResourceId>,
    state: NodeState,
}

/// A frame graph in execution order.
pub struct CompiledFrameGraph {
    nodes: Vec<CompiledNode>,
    stages: Vec<Vec<NodeId>>,
    images: Vec<ImageDecl>,
    buffers: Vec<BufferDescriptor>,
}

impl CompiledFrameGraph {
    pub(crate) fn new(
        nodes: Vec<NodeDecl>,
        stages: Vec<Vec<NodeId>>,
        images: Vec<ImageDecl>,
        buffers: Vec<BufferDescriptor>,
    ) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|decl| {
                let mut resources = decl.reads.clone();
                for write in &decl.writes {
                    if !resources.contains(write) {
                        resources.push(*write);
                    }
                }
                CompiledNode {
                    decl,
                    resources,
                    state: NodeState::Declared,
                }
            })
            .collect();
        Self {
            nodes,
            stages,
            images,
            buffers,
        }
    }

    /// Groups of nodes with no dependencies on each other, in run order.
    pub fn stages(&self) -> Vec<Vec<&str>> {
        self.stages
            .iter()
            .map(|stage| stage.iter().map(|id| self.name(*id)).collect())
            .collect()
    }

    pub fn execution_order(&self) -> Vec<&str> {
        self.stages.iter().flatten().map(|id| self.name(*id)).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_state(&self, id: NodeId) -> NodeState {
        self.nodes[id.index()].state
    }

    fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].decl.name
    }

    /// Runs every node once, in order, into one command buffer and submits
    /// it on `worker`.
    ///
    /// Each node records inside a region named after it. A barrier precedes
    /// any access to a resource an earlier node wrote. Transient resources
    /// go back to `env.transients` tagged with the submission epoch, and
    /// starting the frame there evicts pooled resources left idle too long.
    ///
    /// # Panics
    ///
    /// Panics if a node produces a result of a type other than the one it was
    /// declared with, or resolves a result it did not declare a dependency on.
    pub fn execute(
        mut self,
        worker: &mut WorkerContext,
        env: &mut ExecutionEnv<'_>,
    ) -> Result<FrameOutputs> {
        profile_function!();

        let device = Arc::clone(worker.device());
        let completed = device.graphics_queue().completed_epoch();
        env.transients.begin_frame();

        let mut transient_textures: Vec<Texture> = Vec::new();
        let mut images: Vec<TextureView> = Vec::with_capacity(self.images.len());
        for decl in &self.images {
            match decl {
                ImageDecl::Transient(desc) => {
                    let texture = env.transients.acquire_texture(&device, desc, completed)?;
                    images.push(texture.create_view());
                    transient_textures.push(texture);
                }
                ImageDecl::Imported(view) => images.push(view.clone()),
            }
        }
        let mut buffers: Vec<Buffer> = Vec::with_capacity(self.buffers.len());
        for desc in &self.buffers {
            buffers.push(env.transients.acquire_buffer(&device, desc, completed)?);
        }

        let order: Vec<NodeId> = self.stages.iter().flatten().copied().collect();
        let mut results = NodeResults::new(
            self.nodes
                .iter()
                .map(|node| node.decl.name.clone())
                .collect(),
        );
        let mut written: HashSet<ResourceId> = HashSet::new();
        let mut recorder = worker.create_buffer()?;

        for &id in &order {
            let node = &mut self.nodes[id.index()];
            assert!(
                node.state == NodeState::Declared,
                "frame graph node '{}' scheduled twice",
                node.decl.name
            );
            let Some(op) = node.decl.op.take() else {
                panic!("frame graph node '{}' has no operation", node.decl.name);
            };
            node.state = NodeState::Executing;
            profile_scope_dynamic!(node.decl.name.as_str());
            log::trace!("Frame graph: executing '{}' ({op:?})", node.decl.name);

            recorder.begin_region(&node.decl.name);
            for resource in &node.resources {
                match *resource {
                    ResourceId::Image(image) => {
                        let view = &images[image.0 as usize];
                        if written.contains(resource) {
                            recorder.barrier(view);
                        } else {
                            recorder.use_resource(view);
                        }
                    }
                    ResourceId::Buffer(buffer) => {
                        let buffer = &buffers[buffer.0 as usize];
                        if written.contains(resource) {
                            recorder.barrier(buffer);
                        } else {
                            recorder.use_resource(buffer);
                        }
                    }
                }
            }

            let output = {
                let mut ctx = OpContext {
                    node: id,
                    name: &node.decl.name,
                    dependencies: &node.decl.dependencies,
                    resources: &node.resources,
                    results: &results,
                    images: &images,
                    buffers: &buffers,
                    recorder: &mut recorder,
                    frame: env.frame,
                };
                op.run(&mut ctx)
            };
            assert!(
                (node.decl.accepts)(&output),
                "frame graph node '{}' produced a {} result, but was declared as {}",
                node.decl.name,
                output.kind(),
                node.decl.result_type
            );
            recorder.end_region();

            written.extend(node.decl.writes.iter().copied());
            results.insert(id, output);
            node.state = NodeState::Executed;
        }

        let epoch = worker.submit(recorder.finish())?;
        for texture in transient_textures {
            env.transients.release_texture(texture, epoch);
        }
        for buffer in buffers {
            env.transients.release_buffer(buffer, epoch);
        }

        log::debug!(
            "Frame {}: executed {} frame graph nodes at epoch {epoch}",
            env.frame.frame_id(),
            order.len()
        );

        let order = order.iter().map(|id| self.name(*id).to_string()).collect();
        Ok(FrameOutputs {
            epoch,
            frame: *env.frame,
            order,
            results,
        })
    }
}

impl std::fmt::Debug for CompiledFrameGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFrameGraph")
            .field("stages", &self.stages())
            .finish()
    }
}

/// Everything one executed frame graph produced.
#[derive(Debug)]
pub struct FrameOutputs {
    epoch: Epoch,
    frame: FrameToken,
    order: Vec<String>,
    results: NodeResults,
}

impl FrameOutputs {
    /// Submission epoch of the frame's command buffer.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn frame(&self) -> &FrameToken {
        &self.frame
    }

    /// Node names in the order they ran.
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    pub fn results(&self) -> &NodeResults {
        &self.results
    }

    pub fn get<T: NodeResult>(&self, node: NodeRef<T>) -> &T {
        self.results.get_by_id(node.id())
    }
}
