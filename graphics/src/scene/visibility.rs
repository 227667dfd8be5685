//! Per-frame visibility.

use ember_core::profile_function;

use super::camera::Camera;
use super::object::{PointLight, SceneObject, SpotLight, StaticMeshInstance, VisibilityMask};
use super::world::Scene;

/// The objects one camera sees this frame, in scene order.
///
/// Built once and shared read-only (`Arc`) by every node that consumes it.
#[derive(Debug, Clone, Default)]
pub struct SceneVisibility {
    mask: VisibilityMask,
    meshes: Vec<StaticMeshInstance>,
    point_lights: Vec<PointLight>,
    spot_lights: Vec<SpotLight>,
    cells_skipped: usize,
}

impl SceneVisibility {
    /// Runs the full visibility test for `camera` over `scene`.
    pub fn compute(scene: &Scene, camera: &Camera) -> Self {
        profile_function!();

        let frustum = camera.frustum();
        let mask = camera.visibility_mask;

        let mut meshes = Vec::new();
        let mut cells_skipped = 0;
        for cell in scene.cells() {
            if cell.is_empty() || !frustum.intersects_aabb(cell.bounds()) {
                cells_skipped += 1;
                continue;
            }
            meshes.extend(
                cell.instances()
                    .iter()
                    .filter(|mesh| mesh.is_visible(&frustum, mask))
                    .cloned(),
            );
        }

        let point_lights = scene
            .point_lights()
            .iter()
            .filter(|light| light.is_visible(&frustum, mask))
            .cloned()
            .collect();
        let spot_lights = scene
            .spot_lights()
            .iter()
            .filter(|light| light.is_visible(&frustum, mask))
            .cloned()
            .collect::<Vec<_>>();

        let visibility = Self {
            mask,
            meshes,
            point_lights,
            spot_lights,
            cells_skipped,
        };
        log::trace!(
            "Visibility: {} meshes, {} point lights, {} spot lights ({} of {} cells skipped)",
            visibility.meshes.len(),
            visibility.point_lights.len(),
            visibility.spot_lights.len(),
            cells_skipped,
            scene.cells().len()
        );
        visibility
    }

    pub fn mask(&self) -> VisibilityMask {
        self.mask
    }

    pub fn meshes(&self) -> &[StaticMeshInstance] {
        &self.meshes
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn spot_lights(&self) -> &[SpotLight] {
        &self.spot_lights
    }

    /// Cells rejected without testing their meshes.
    pub fn cells_skipped(&self) -> usize {
        self.cells_skipped
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty() && self.point_lights.is_empty() && self.spot_lights.is_empty()
    }
}
