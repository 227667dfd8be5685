//! Frame graph integration tests.
//!
//! Graphs are declared, finalized and executed against the dummy backend;
//! the backend's submission log is the observable output.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rstest::rstest;

use common::{TestContext, front_camera, three_mesh_scene};
use ember_graphics::scene::SceneVisibility;
use ember_graphics::{
    Command, CompletionMode, ExecutionEnv, FrameGraph, NodeOutput, PendingOp, TextureDescriptor,
    TextureFormat, TextureUsage, TextureView,
};

fn unit_op(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> PendingOp {
    let log = Arc::clone(log);
    PendingOp::custom(move |_| {
        log.lock().push(name);
        NodeOutput::Unit
    })
}

// ============================================================================
// Ordering
// ============================================================================

/// C depends on A and B, B depends on A: whatever the declaration order, A
/// runs first and C last, each exactly once.
#[rstest]
#[case::in_order(["a", "b", "c"])]
#[case::reversed(["c", "b", "a"])]
#[case::shuffled(["b", "c", "a"])]
fn test_diamond_runs_in_dependency_order(#[case] declaration: [&'static str; 3]) {
    let mut ctx = TestContext::new(CompletionMode::Immediate);
    let ran = Arc::new(Mutex::new(Vec::new()));

    let mut graph = FrameGraph::new();
    let refs: Vec<_> = declaration
        .iter()
        .map(|name| (*name, graph.add_node::<()>(*name).node()))
        .collect();
    let node = |name: &str| refs.iter().find(|(n, _)| *n == name).map(|(_, r)| *r).unwrap();

    graph.configure(node("a")).set_op(unit_op(&ran, "a"));

    let mut b = graph.configure(node("b"));
    b.add_dependency(node("a"));
    b.set_op(unit_op(&ran, "b"));

    let mut c = graph.configure(node("c"));
    c.add_dependency(node("a"));
    c.add_dependency(node("b"));
    c.set_op(unit_op(&ran, "c"));

    let compiled = graph.finalize();
    assert_eq!(compiled.execution_order(), vec!["a", "b", "c"]);

    let frame = ctx.frame(0);
    let mut env = ExecutionEnv::new(&frame, &mut ctx.transients);
    let outputs = compiled.execute(&mut ctx.worker, &mut env).unwrap();

    assert_eq!(*ran.lock(), vec!["a", "b", "c"]);
    assert_eq!(outputs.execution_order(), ["a", "b", "c"]);
}

#[test]
#[should_panic(expected = "Frame graph dependency cycle detected among nodes")]
fn test_three_node_cycle_is_fatal() {
    let mut graph = FrameGraph::new();
    let a = graph.add_node::<()>("a").node();
    let b = graph.add_node::<()>("b").node();
    let c = graph.add_node::<()>("c").node();
    for (node, dependency) in [(a, c), (b, a), (c, b)] {
        let mut builder = graph.configure(node);
        builder.add_dependency(dependency);
    }
    for node in [a, b, c] {
        graph
            .configure(node)
            .set_op(PendingOp::custom(|_| NodeOutput::Unit));
    }
    graph.finalize();
}

// ============================================================================
// Results
// ============================================================================

/// One visibility node feeding two consumers is computed once and both see
/// the same snapshot.
#[test]
fn test_shared_visibility_result() {
    let mut ctx = TestContext::new(CompletionMode::Immediate);
    let scene = Arc::new(three_mesh_scene());
    let seen = Arc::new(AtomicUsize::new(0));

    let mut graph = FrameGraph::new();
    let visibility = graph
        .add_node::<Arc<SceneVisibility>>("visibility")
        .set_op(PendingOp::SceneVisibility {
            scene,
            camera: front_camera(),
        });

    let mut consumers = Vec::new();
    for name in ["shadows", "overlay"] {
        let mut node = graph.add_node::<f64>(name);
        let input = node.add_dependency(visibility);
        let seen = Arc::clone(&seen);
        consumers.push(node.set_op(PendingOp::custom(move |op| {
            seen.fetch_add(1, Ordering::SeqCst);
            NodeOutput::Scalar(op.get(input).meshes().len() as f64)
        })));
    }

    let frame = ctx.frame(0);
    let mut env = ExecutionEnv::new(&frame, &mut ctx.transients);
    let outputs = graph.finalize().execute(&mut ctx.worker, &mut env).unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    for consumer in consumers {
        assert_eq!(*outputs.get(consumer), 2.0);
    }
    let labels: Vec<_> = outputs
        .get(visibility)
        .meshes()
        .iter()
        .map(|m| m.label.as_str())
        .collect();
    assert_eq!(labels, ["left", "right"]);
}

// ============================================================================
// Recording
// ============================================================================

#[test]
fn test_depth_prepass_draws_each_visible_mesh() {
    let mut ctx = TestContext::new(CompletionMode::Immediate);
    let mut graph = FrameGraph::new();
    let visibility = graph
        .add_node::<Arc<SceneVisibility>>("visibility")
        .set_op(PendingOp::SceneVisibility {
            scene: Arc::new(three_mesh_scene()),
            camera: front_camera(),
        });
    let depth_image = graph.create_image(TextureDescriptor::new_2d(
        64,
        64,
        TextureFormat::Depth32Float,
        TextureUsage::RENDER_ATTACHMENT,
    ));
    let mut depth = graph.add_node::<TextureView>("depth");
    let visible = depth.add_dependency(visibility);
    depth.writes(depth_image);
    depth.set_op(PendingOp::DepthPrepass {
        visibility: visible,
        depth: depth_image,
    });

    let frame = ctx.frame(0);
    let mut env = ExecutionEnv::new(&frame, &mut ctx.transients);
    graph.finalize().execute(&mut ctx.worker, &mut env).unwrap();

    let submissions = ctx.backend.submissions();
    let draws: Vec<_> = submissions[0]
        .commands
        .iter()
        .filter_map(|command| match command {
            Command::Draw { label, .. } => Some(label.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(draws, ["left", "right"]);
}

#[test]
fn test_imported_image_is_not_pooled() {
    let mut ctx = TestContext::new(CompletionMode::Immediate);
    let swapchain = ctx
        .device
        .create_texture(&TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Rgba8UnormSrgb,
            TextureUsage::RENDER_ATTACHMENT,
        ))
        .unwrap()
        .create_view();

    let mut graph = FrameGraph::new();
    let target = graph.import_image(swapchain.clone());
    let mut present = graph.add_node::<TextureView>("present");
    present.writes(target);
    let present = present.set_op(PendingOp::custom(move |op| {
        NodeOutput::Texture(op.image(target).clone())
    }));

    let frame = ctx.frame(0);
    let mut env = ExecutionEnv::new(&frame, &mut ctx.transients);
    let outputs = graph.finalize().execute(&mut ctx.worker, &mut env).unwrap();

    assert_eq!(outputs.get(present).key(), swapchain.key());
    assert_eq!(ctx.transients.idle_count(), 0);
}
