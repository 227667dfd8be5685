//! Per-frame dependency graph.
//!
//! A [`FrameGraph`] is declared fresh every frame. Nodes name the nodes whose
//! results they consume and the resources they read or write; their work is a
//! [`PendingOp`] that runs only after [`FrameGraph::finalize`] has ordered
//! the graph and [`CompiledFrameGraph::execute`] reaches the node.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = FrameGraph::new();
//! let visibility = graph
//!     .add_node::<Arc<SceneVisibility>>("visibility")
//!     .set_op(PendingOp::SceneVisibility { scene, camera });
//!
//! let depth_image = graph.create_image(depth_desc);
//! let mut depth = graph.add_node::<TextureView>("depth");
//! let visible = depth.add_dependency(visibility);
//! depth.writes(depth_image);
//! depth.set_op(PendingOp::DepthPrepass { visibility: visible, depth: depth_image });
//!
//! let outputs = graph.finalize().execute(&mut worker, &mut env)?;
//! ```
//!
//! Node ids are arena indices into the graph, so a node may depend on one
//! declared after it. [`FrameGraph::configure`] reopens a node for that.

mod compiled;
mod handle;
mod op;
mod transient;

use std::collections::HashMap;
use std::marker::PhantomData;

use ember_core::profile_function;

pub use compiled::{CompiledFrameGraph, ExecutionEnv, FrameOutputs, NodeResults, NodeState};
pub use handle::{BufferId, Deferred, ImageId, NodeId, NodeRef, ResourceId};
pub use op::{NodeOutput, NodeResult, OpContext, PendingOp, ToneMapSettings};
pub use transient::{DEFAULT_TRANSIENT_IDLE_FRAMES, TransientPool, TransientStats};

use crate::resources::TextureView;
use crate::types::{BufferDescriptor, TextureDescriptor};

pub(crate) enum ImageDecl {
    Transient(TextureDescriptor),
    Imported(TextureView),
}

impl ImageDecl {
    fn label(&self) -> Option<&str> {
        match self {
            Self::Transient(desc) => desc.label.as_deref(),
            Self::Imported(view) => view.label(),
        }
    }
}

pub(crate) struct NodeDecl {
    pub(crate) name: String,
    pub(crate) result_type: &'static str,
    pub(crate) accepts: fn(&NodeOutput) -> bool,
    pub(crate) dependencies: Vec<NodeId>,
    pub(crate) reads: Vec<ResourceId>,
    pub(crate) writes: Vec<ResourceId>,
    pub(crate) op: Option<PendingOp>,
}

fn accepts<T: NodeResult>(output: &NodeOutput) -> bool {
    T::from_output(output).is_some()
}

/// A frame's nodes and transient resources, before ordering.
#[derive(Default)]
pub struct FrameGraph {
    nodes: Vec<NodeDecl>,
    /// (dependent, dependency) pairs.
    edges: Vec<(NodeId, NodeId)>,
    images: Vec<ImageDecl>,
    buffers: Vec<BufferDescriptor>,
    /// Every `writes` call, in declaration order.
    write_log: Vec<(ResourceId, NodeId)>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a node producing a `T`.
    pub fn add_node<T: NodeResult>(&mut self, name: impl Into<String>) -> NodeBuilder<'_, T> {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeDecl {
            name: name.into(),
            result_type: std::any::type_name::<T>(),
            accepts: accepts::<T>,
            dependencies: Vec::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            op: None,
        });
        NodeBuilder {
            graph: self,
            id,
            _result: PhantomData,
        }
    }

    /// Reopens an existing node to add dependencies or its operation.
    pub fn configure<T: NodeResult>(&mut self, node: NodeRef<T>) -> NodeBuilder<'_, T> {
        self.assert_node(node.id());
        NodeBuilder {
            graph: self,
            id: node.id(),
            _result: PhantomData,
        }
    }

    /// Declares an image allocated for this frame only.
    pub fn create_image(&mut self, descriptor: TextureDescriptor) -> ImageId {
        let id = ImageId(self.images.len() as u32);
        self.images.push(ImageDecl::Transient(descriptor));
        id
    }

    /// Makes an externally owned image available to nodes.
    pub fn import_image(&mut self, view: TextureView) -> ImageId {
        let id = ImageId(self.images.len() as u32);
        self.images.push(ImageDecl::Imported(view));
        id
    }

    /// Declares a buffer allocated for this frame only.
    pub fn create_buffer(&mut self, descriptor: BufferDescriptor) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(descriptor);
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].name
    }

    fn assert_node(&self, id: NodeId) {
        assert!(
            id.index() < self.nodes.len(),
            "node {id:?} does not belong to this frame graph"
        );
    }

    fn assert_resource(&self, resource: ResourceId) {
        let known = match resource {
            ResourceId::Image(id) => (id.0 as usize) < self.images.len(),
            ResourceId::Buffer(id) => (id.0 as usize) < self.buffers.len(),
        };
        assert!(known, "{resource:?} does not belong to this frame graph");
    }

    fn resource_label(&self, resource: ResourceId) -> Option<&str> {
        match resource {
            ResourceId::Image(id) => self.images[id.0 as usize].label(),
            ResourceId::Buffer(id) => self.buffers[id.0 as usize].label.as_deref(),
        }
    }

    fn add_edge(&mut self, dependent: NodeId, dependency: NodeId) {
        if dependent != dependency && !self.edges.contains(&(dependent, dependency)) {
            self.edges.push((dependent, dependency));
        }
    }

    /// Edges implied by resource access, computed from the final access
    /// sets so node declaration order does not matter:
    ///
    /// - writers of a resource run in the order their `writes` calls were
    ///   made;
    /// - a node that reads a resource without writing it runs after every
    ///   writer of that resource and so sees its final contents;
    /// - a node that reads and writes a resource is ordered by its place
    ///   among the writers.
    fn add_resource_edges(&mut self) {
        let mut writers: HashMap<ResourceId, Vec<NodeId>> = HashMap::new();
        let mut implied = Vec::new();

        for &(resource, node) in &self.write_log {
            let chain = writers.entry(resource).or_default();
            if let Some(&previous) = chain.last() {
                implied.push((node, previous));
            }
            chain.push(node);
        }

        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index as u32);
            for resource in node.reads.iter().filter(|r| !node.writes.contains(*r)) {
                if let Some(chain) = writers.get(resource) {
                    implied.extend(chain.iter().map(|&writer| (id, writer)));
                }
            }
        }

        for (dependent, dependency) in implied {
            self.add_edge(dependent, dependency);
        }
    }

    fn check_complete(&self) {
        for node in &self.nodes {
            assert!(
                node.op.is_some(),
                "frame graph node '{}' has no operation",
                node.name
            );
        }

        let mut used = vec![false; self.images.len()];
        let mut used_buffers = vec![false; self.buffers.len()];
        for resource in self
            .nodes
            .iter()
            .flat_map(|node| node.reads.iter().chain(&node.writes))
        {
            match resource {
                ResourceId::Image(id) => used[id.0 as usize] = true,
                ResourceId::Buffer(id) => used_buffers[id.0 as usize] = true,
            }
        }
        let unused = used
            .iter()
            .enumerate()
            .filter(|(_, used)| !**used)
            .map(|(i, _)| ResourceId::Image(ImageId(i as u32)))
            .chain(
                used_buffers
                    .iter()
                    .enumerate()
                    .filter(|(_, used)| !**used)
                    .map(|(i, _)| ResourceId::Buffer(BufferId(i as u32))),
            )
            .next();
        if let Some(resource) = unused {
            panic!(
                "frame graph resource {resource:?} ({}) was declared but never used",
                self.resource_label(resource).unwrap_or("unlabeled")
            );
        }
    }

    /// Orders the graph into stages of mutually independent nodes.
    ///
    /// # Panics
    ///
    /// Panics if a node has no operation, if a declared resource is never
    /// used, or if the dependencies contain a cycle.
    pub fn finalize(mut self) -> CompiledFrameGraph {
        profile_function!();

        self.check_complete();
        self.add_resource_edges();
        self.edges.sort_unstable();

        let n = self.nodes.len();
        let mut in_degree = vec![0u32; n];
        let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); n];
        for &(dependent, dependency) in &self.edges {
            in_degree[dependent.index()] += 1;
            dependents[dependency.index()].push(dependent);
        }

        // Kahn's algorithm, one stage per wave of zero in-degree nodes.
        let mut stages: Vec<Vec<NodeId>> = Vec::new();
        let mut ready: Vec<NodeId> = (0..n as u32)
            .map(NodeId)
            .filter(|id| in_degree[id.index()] == 0)
            .collect();
        let mut placed = 0;

        while !ready.is_empty() {
            ready.sort_unstable();
            let mut next = Vec::new();
            for &id in &ready {
                for &dependent in &dependents[id.index()] {
                    in_degree[dependent.index()] -= 1;
                    if in_degree[dependent.index()] == 0 {
                        next.push(dependent);
                    }
                }
            }
            placed += ready.len();
            stages.push(std::mem::replace(&mut ready, next));
        }

        if placed != n {
            let cycle: Vec<&str> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].name.as_str())
                .collect();
            panic!("Frame graph dependency cycle detected among nodes: {cycle:?}");
        }

        log::debug!(
            "Frame graph compiled: {n} nodes, {} edges, {} stages",
            self.edges.len(),
            stages.len()
        );

        CompiledFrameGraph::new(self.nodes, stages, self.images, self.buffers)
    }
}

impl std::fmt::Debug for FrameGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGraph")
            .field(
                "nodes",
                &self.nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
            )
            .field("edges", &self.edges)
            .field("images", &self.images.len())
            .field("buffers", &self.buffers.len())
            .finish()
    }
}

/// Declares one node's dependencies, resources and operation.
pub struct NodeBuilder<'g, T> {
    graph: &'g mut FrameGraph,
    id: NodeId,
    _result: PhantomData<fn() -> T>,
}

impl<T: NodeResult> NodeBuilder<'_, T> {
    pub fn node(&self) -> NodeRef<T> {
        NodeRef::new(self.id)
    }

    /// Makes this node run after `node` and returns a handle on its result.
    ///
    /// # Panics
    ///
    /// Panics if `node` is this node.
    pub fn add_dependency<U: NodeResult>(&mut self, node: NodeRef<U>) -> Deferred<U> {
        let dependency = node.id();
        self.graph.assert_node(dependency);
        assert!(
            dependency != self.id,
            "frame graph node '{}' cannot depend on itself",
            self.graph.node_name(self.id)
        );

        let decl = &mut self.graph.nodes[self.id.index()];
        if !decl.dependencies.contains(&dependency) {
            decl.dependencies.push(dependency);
        }
        self.graph.add_edge(self.id, dependency);
        Deferred::new(dependency)
    }

    pub fn reads(&mut self, resource: impl Into<ResourceId>) -> &mut Self {
        let resource = resource.into();
        self.graph.assert_resource(resource);
        let decl = &mut self.graph.nodes[self.id.index()];
        if !decl.reads.contains(&resource) {
            decl.reads.push(resource);
        }
        self
    }

    pub fn writes(&mut self, resource: impl Into<ResourceId>) -> &mut Self {
        let resource = resource.into();
        self.graph.assert_resource(resource);
        let decl = &mut self.graph.nodes[self.id.index()];
        if !decl.writes.contains(&resource) {
            decl.writes.push(resource);
            self.graph.write_log.push((resource, self.id));
        }
        self
    }

    /// Attaches the node's work. Nothing runs yet.
    ///
    /// # Panics
    ///
    /// Panics if the node already has an operation.
    pub fn set_op(self, op: PendingOp) -> NodeRef<T> {
        let decl = &mut self.graph.nodes[self.id.index()];
        assert!(
            decl.op.is_none(),
            "frame graph node '{}' already has an operation",
            decl.name
        );
        log::trace!("Frame graph node '{}': {op:?}", decl.name);
        decl.op = Some(op);
        NodeRef::new(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextureFormat, TextureUsage};

    fn unit(graph: &mut FrameGraph, name: &str) -> NodeRef<()> {
        graph
            .add_node::<()>(name)
            .set_op(PendingOp::custom(|_| NodeOutput::Unit))
    }

    fn color_desc(label: &str) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
        .with_label(label)
    }

    #[test]
    fn test_empty_graph() {
        let compiled = FrameGraph::new().finalize();
        assert_eq!(compiled.node_count(), 0);
        assert!(compiled.stages().is_empty());
    }

    #[test]
    fn test_linear_chain() {
        let mut graph = FrameGraph::new();
        let a = unit(&mut graph, "a");
        let mut b = graph.add_node::<()>("b");
        b.add_dependency(a);
        let b = b.set_op(PendingOp::custom(|_| NodeOutput::Unit));
        let mut c = graph.add_node::<()>("c");
        c.add_dependency(b);
        c.set_op(PendingOp::custom(|_| NodeOutput::Unit));

        let compiled = graph.finalize();
        assert_eq!(compiled.execution_order(), vec!["a", "b", "c"]);
        assert_eq!(compiled.stages().len(), 3);
    }

    #[test]
    fn test_independent_nodes_share_a_stage() {
        let mut graph = FrameGraph::new();
        let root = unit(&mut graph, "root");
        for name in ["left", "right"] {
            let mut node = graph.add_node::<()>(name);
            node.add_dependency(root);
            node.set_op(PendingOp::custom(|_| NodeOutput::Unit));
        }
        let compiled = graph.finalize();
        assert_eq!(
            compiled.stages(),
            vec![vec!["root"], vec!["left", "right"]]
        );
    }

    #[test]
    fn test_dependency_on_later_node() {
        let mut graph = FrameGraph::new();
        let late_consumer = graph.add_node::<()>("consumer").node();
        let producer = unit(&mut graph, "producer");

        let mut consumer = graph.configure(late_consumer);
        consumer.add_dependency(producer);
        consumer.set_op(PendingOp::custom(|_| NodeOutput::Unit));

        assert_eq!(
            graph.finalize().execution_order(),
            vec!["producer", "consumer"]
        );
    }

    #[test]
    fn test_duplicate_dependency_is_one_edge() {
        let mut graph = FrameGraph::new();
        let a = unit(&mut graph, "a");
        let mut b = graph.add_node::<()>("b");
        b.add_dependency(a);
        b.add_dependency(a);
        b.set_op(PendingOp::custom(|_| NodeOutput::Unit));
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn test_resource_access_orders_nodes() {
        let mut graph = FrameGraph::new();
        let image = graph.create_image(color_desc("hdr"));

        // Declared reader-last, but with no explicit dependencies at all.
        let mut first = graph.add_node::<()>("write-a");
        first.writes(image);
        first.set_op(PendingOp::custom(|_| NodeOutput::Unit));
        let mut second = graph.add_node::<()>("write-b");
        second.writes(image);
        second.set_op(PendingOp::custom(|_| NodeOutput::Unit));
        let mut reader = graph.add_node::<()>("read");
        reader.reads(image);
        reader.set_op(PendingOp::custom(|_| NodeOutput::Unit));

        let compiled = graph.finalize();
        assert_eq!(
            compiled.execution_order(),
            vec!["write-a", "write-b", "read"]
        );
    }

    #[test]
    fn test_reader_declared_before_writer() {
        let mut graph = FrameGraph::new();
        let image = graph.create_image(color_desc("shadow"));

        let reader = graph.add_node::<()>("reader").node();
        let mut writer = graph.add_node::<()>("writer");
        writer.writes(image);
        writer.set_op(PendingOp::custom(|_| NodeOutput::Unit));
        let mut reader = graph.configure(reader);
        reader.reads(image);
        reader.set_op(PendingOp::custom(|_| NodeOutput::Unit));

        let compiled = graph.finalize();
        assert_eq!(compiled.execution_order(), vec!["writer", "reader"]);
        assert_eq!(compiled.stages().len(), 2);
    }

    #[test]
    fn test_read_declared_before_write() {
        let mut graph = FrameGraph::new();
        let image = graph.create_image(color_desc("gbuffer"));

        let reader = graph.add_node::<()>("reader").node();
        let writer = graph.add_node::<()>("writer").node();
        graph.configure(reader).reads(image);
        graph.configure(writer).writes(image);
        graph
            .configure(writer)
            .set_op(PendingOp::custom(|_| NodeOutput::Unit));
        graph
            .configure(reader)
            .set_op(PendingOp::custom(|_| NodeOutput::Unit));

        assert_eq!(graph.finalize().execution_order(), vec!["writer", "reader"]);
    }

    #[test]
    fn test_read_write_node_follows_write_order() {
        let mut graph = FrameGraph::new();
        let image = graph.create_image(color_desc("hdr"));

        // "blend" reads and writes, declared before the plain writer.
        let blend = graph.add_node::<()>("blend").node();
        let reader = graph.add_node::<()>("reader").node();
        let clear = graph.add_node::<()>("clear").node();
        graph.configure(clear).writes(image);
        graph.configure(blend).reads(image).writes(image);
        graph.configure(reader).reads(image);
        for node in [blend, reader, clear] {
            graph
                .configure(node)
                .set_op(PendingOp::custom(|_| NodeOutput::Unit));
        }

        let compiled = graph.finalize();
        assert_eq!(compiled.execution_order(), vec!["clear", "blend", "reader"]);
        assert_eq!(compiled.stages().len(), 3);
    }

    #[test]
    #[should_panic(expected = "dependency cycle detected among nodes")]
    fn test_cycle_panics() {
        let mut graph = FrameGraph::new();
        let a = graph.add_node::<()>("a").node();
        let mut b = graph.add_node::<()>("b");
        b.add_dependency(a);
        let b = b.set_op(PendingOp::custom(|_| NodeOutput::Unit));
        let mut a = graph.configure(a);
        a.add_dependency(b);
        a.set_op(PendingOp::custom(|_| NodeOutput::Unit));
        graph.finalize();
    }

    #[test]
    #[should_panic(expected = "cannot depend on itself")]
    fn test_self_dependency_panics() {
        let mut graph = FrameGraph::new();
        let mut a = graph.add_node::<()>("a");
        let me = a.node();
        a.add_dependency(me);
    }

    #[test]
    #[should_panic(expected = "has no operation")]
    fn test_missing_op_panics() {
        let mut graph = FrameGraph::new();
        graph.add_node::<()>("forgotten");
        graph.finalize();
    }

    #[test]
    #[should_panic(expected = "already has an operation")]
    fn test_second_op_panics() {
        let mut graph = FrameGraph::new();
        let node = unit(&mut graph, "a");
        graph
            .configure(node)
            .set_op(PendingOp::custom(|_| NodeOutput::Unit));
    }

    #[test]
    #[should_panic(expected = "declared but never used")]
    fn test_unused_resource_panics() {
        let mut graph = FrameGraph::new();
        graph.create_image(color_desc("orphan"));
        unit(&mut graph, "a");
        graph.finalize();
    }
}
