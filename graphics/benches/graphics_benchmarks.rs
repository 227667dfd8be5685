use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use ember_core::math::Vec3;
use ember_graphics::renderer::build_default_graph;
use ember_graphics::scene::{Camera, PointLight, Scene, SceneVisibility, StaticMeshInstance};
use ember_graphics::{Extent2d, FrameGraph, NodeOutput, PendingOp, Renderer, RendererConfig, ToneMapSettings};

fn scatter_scene(meshes: usize) -> Scene {
    let mut scene = Scene::new();
    for i in 0..meshes {
        let f = i as f32;
        scene.add_mesh(StaticMeshInstance::new(
            format!("mesh{i}"),
            Vec3::new((f * 0.37).sin() * 120.0, (f * 0.11).cos() * 8.0, (f * 0.23).sin() * 120.0),
            1.5,
        ));
    }
    for i in 0..32 {
        let f = i as f32;
        scene.add_point_light(PointLight::new(Vec3::new(f * 4.0 - 64.0, 6.0, 0.0), 10.0));
    }
    scene
}

fn camera() -> Camera {
    Camera::look_at(
        Vec3::new(0.0, 10.0, 60.0),
        Vec3::zeros(),
        std::f32::consts::FRAC_PI_3,
        16.0 / 9.0,
        0.1,
        300.0,
    )
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

fn bench_visibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_visibility");
    let camera = camera();
    for meshes in [256, 4096] {
        let scene = scatter_scene(meshes);
        group.bench_with_input(BenchmarkId::from_parameter(meshes), &scene, |b, scene| {
            b.iter(|| SceneVisibility::compute(black_box(scene), &camera));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Frame graph
// ---------------------------------------------------------------------------

fn bench_finalize_default_graph(c: &mut Criterion) {
    let scene = Arc::new(scatter_scene(16));
    let camera = camera();
    c.bench_function("finalize_default_graph", |b| {
        b.iter(|| {
            let (graph, _) = build_default_graph(
                Arc::clone(&scene),
                &camera,
                Extent2d::new(1280, 720),
                ToneMapSettings::default(),
            );
            black_box(graph.finalize())
        });
    });
}

fn bench_finalize_wide_graph(c: &mut Criterion) {
    c.bench_function("finalize_256_node_chain_fan", |b| {
        b.iter(|| {
            let mut graph = FrameGraph::new();
            let mut previous = Vec::new();
            for i in 0..256 {
                let mut node = graph.add_node::<()>(format!("node{i}"));
                // Each node depends on up to four of the preceding nodes.
                for dep in previous.iter().rev().take(4) {
                    node.add_dependency(*dep);
                }
                previous.push(node.set_op(PendingOp::custom(|_| NodeOutput::Unit)));
            }
            black_box(graph.finalize())
        });
    });
}

fn bench_render_frame(c: &mut Criterion) {
    let mut renderer = match Renderer::with_dummy_backend(RendererConfig::default()) {
        Ok(renderer) => renderer,
        Err(err) => panic!("dummy renderer: {err}"),
    };
    let scene = Arc::new(scatter_scene(1024));
    let camera = camera();
    c.bench_function("render_frame_1024_meshes", |b| {
        b.iter(|| {
            if let Err(err) = renderer.render_frame(Arc::clone(&scene), &camera) {
                panic!("render_frame failed: {err}");
            }
        });
    });
}

criterion_group!(
    benches,
    bench_visibility,
    bench_finalize_default_graph,
    bench_finalize_wide_graph,
    bench_render_frame
);
criterion_main!(benches);
