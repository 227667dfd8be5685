//! Shared fixtures for the graphics integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ember_core::math::Vec3;
use ember_graphics::scene::{Camera, PointLight, Scene, StaticMeshInstance};
use ember_graphics::{
    CompletionMode, Device, DummyBackend, Extent2d, FrameToken, TransientPool, WorkerContext,
    WorkerRegistry,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A device on a dummy backend plus one worker context on this thread.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub device: Arc<Device>,
    pub registry: Arc<WorkerRegistry>,
    pub worker: WorkerContext,
    pub transients: TransientPool,
}

impl TestContext {
    pub fn new(mode: CompletionMode) -> Self {
        init_logging();
        let backend = Arc::new(DummyBackend::with_mode(mode));
        let device = Device::new(backend.clone()).expect("dummy device");
        let registry = Arc::new(WorkerRegistry::new());
        let worker = WorkerContext::with_registry(Arc::clone(&device), Arc::clone(&registry));
        Self {
            backend,
            device,
            registry,
            worker,
            transients: TransientPool::new(),
        }
    }

    pub fn frame(&self, frame_id: u64) -> FrameToken {
        FrameToken::new(frame_id, (frame_id % 2) as u32, 2, Extent2d::new(64, 64))
    }
}

/// Looking down -Z from z = 10.
pub fn front_camera() -> Camera {
    Camera::look_at(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::zeros(),
        std::f32::consts::FRAC_PI_2,
        1.0,
        0.1,
        100.0,
    )
}

/// Two meshes in front of [`front_camera`], one behind it, and a light.
pub fn three_mesh_scene() -> Scene {
    let mut scene = Scene::new();
    scene.add_mesh(StaticMeshInstance::new("left", Vec3::new(-2.0, 0.0, 0.0), 1.0));
    scene.add_mesh(StaticMeshInstance::new("behind", Vec3::new(0.0, 0.0, 20.0), 1.0));
    scene.add_mesh(StaticMeshInstance::new("right", Vec3::new(2.0, 0.0, 0.0), 1.0));
    scene.add_point_light(PointLight::new(Vec3::new(0.0, 3.0, 0.0), 5.0));
    scene
}
