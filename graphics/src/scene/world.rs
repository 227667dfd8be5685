//! Scene storage.

use std::collections::HashMap;

use ember_core::id_alloc::IdAllocator;
use ember_core::math::{Aabb, Vec3};

use super::cell::{CellCoord, SceneCell};
use super::object::{ObjectId, PointLight, SpotLight, StaticMeshInstance};

/// Edge length of a grid cell in world units.
pub const DEFAULT_CELL_SIZE: f32 = 16.0;

/// Static meshes bucketed into grid cells, plus lights.
///
/// Iteration order is stable: cells in creation order, instances within a
/// cell in insertion order, lights in insertion order. Visibility results
/// follow the same order.
#[derive(Debug, Clone)]
pub struct Scene {
    cell_size: f32,
    cells: Vec<SceneCell>,
    cell_lookup: HashMap<CellCoord, usize>,
    /// Cell index of every mesh.
    mesh_cells: HashMap<ObjectId, usize>,
    point_lights: Vec<PointLight>,
    spot_lights: Vec<SpotLight>,
    ids: IdAllocator,
}

impl Scene {
    pub fn new() -> Self {
        Self::with_cell_size(DEFAULT_CELL_SIZE)
    }

    /// # Panics
    ///
    /// Panics unless `cell_size` is positive and finite.
    pub fn with_cell_size(cell_size: f32) -> Self {
        assert!(
            cell_size > 0.0 && cell_size.is_finite(),
            "cell size must be positive, got {cell_size}"
        );
        Self {
            cell_size,
            cells: Vec::new(),
            cell_lookup: HashMap::new(),
            mesh_cells: HashMap::new(),
            point_lights: Vec::new(),
            spot_lights: Vec::new(),
            ids: IdAllocator::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn add_mesh(&mut self, mut instance: StaticMeshInstance) -> ObjectId {
        let id = ObjectId(self.ids.allocate());
        instance.id = id;
        let cell = self.cell_for(&instance.position);
        self.cells[cell].insert(instance);
        self.mesh_cells.insert(id, cell);
        id
    }

    pub fn remove_mesh(&mut self, id: ObjectId) -> Option<StaticMeshInstance> {
        let cell = self.mesh_cells.remove(&id)?;
        let removed = self.cells[cell].remove(id);
        self.ids.free(id.0);
        removed
    }

    /// Moves a mesh, re-bucketing it if it changed cell. Returns `false`
    /// for an unknown id.
    pub fn move_mesh(&mut self, id: ObjectId, position: Vec3) -> bool {
        let Some(&old_cell) = self.mesh_cells.get(&id) else {
            return false;
        };
        let Some(mut instance) = self.cells[old_cell].remove(id) else {
            return false;
        };
        instance.position = position;
        let new_cell = self.cell_for(&position);
        self.cells[new_cell].insert(instance);
        self.mesh_cells.insert(id, new_cell);
        true
    }

    pub fn mesh(&self, id: ObjectId) -> Option<&StaticMeshInstance> {
        let cell = self.mesh_cells.get(&id)?;
        self.cells[*cell].instances().iter().find(|i| i.id == id)
    }

    /// All meshes in iteration order.
    pub fn meshes(&self) -> impl Iterator<Item = &StaticMeshInstance> {
        self.cells.iter().flat_map(|cell| cell.instances())
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_cells.len()
    }

    pub fn add_point_light(&mut self, mut light: PointLight) -> ObjectId {
        let id = ObjectId(self.ids.allocate());
        light.id = id;
        self.point_lights.push(light);
        id
    }

    pub fn add_spot_light(&mut self, mut light: SpotLight) -> ObjectId {
        let id = ObjectId(self.ids.allocate());
        light.id = id;
        self.spot_lights.push(light);
        id
    }

    /// Removes a point or spot light.
    pub fn remove_light(&mut self, id: ObjectId) -> bool {
        let before = self.point_lights.len() + self.spot_lights.len();
        self.point_lights.retain(|l| l.id != id);
        self.spot_lights.retain(|l| l.id != id);
        let removed = self.point_lights.len() + self.spot_lights.len() < before;
        if removed {
            self.ids.free(id.0);
        }
        removed
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn point_lights_mut(&mut self) -> &mut [PointLight] {
        &mut self.point_lights
    }

    pub fn spot_lights(&self) -> &[SpotLight] {
        &self.spot_lights
    }

    pub fn cells(&self) -> &[SceneCell] {
        &self.cells
    }

    /// Bounding box of every cell, in cell order.
    pub fn cell_bounds(&self) -> Vec<Aabb> {
        self.cells.iter().map(|cell| *cell.bounds()).collect()
    }

    fn cell_for(&mut self, position: &Vec3) -> usize {
        let coord = CellCoord::containing(position, self.cell_size);
        *self.cell_lookup.entry(coord).or_insert_with(|| {
            self.cells.push(SceneCell::new(coord));
            self.cells.len() - 1
        })
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneObject;

    #[test]
    fn test_meshes_iterate_in_cell_creation_order() {
        let mut scene = Scene::with_cell_size(10.0);
        let a = scene.add_mesh(StaticMeshInstance::new("a", Vec3::new(25.0, 0.0, 0.0), 1.0));
        let b = scene.add_mesh(StaticMeshInstance::new("b", Vec3::new(1.0, 0.0, 0.0), 1.0));
        let c = scene.add_mesh(StaticMeshInstance::new("c", Vec3::new(22.0, 0.0, 0.0), 1.0));

        let order: Vec<_> = scene.meshes().map(|m| m.id()).collect();
        assert_eq!(order, vec![a, c, b]);
        assert_eq!(scene.cells().len(), 2);
    }

    #[test]
    fn test_cell_bounds_contain_their_meshes() {
        let mut scene = Scene::new();
        for i in 0..20 {
            let x = i as f32 * 3.7 - 30.0;
            scene.add_mesh(StaticMeshInstance::new("m", Vec3::new(x, x * 0.5, -x), 0.5 + i as f32 * 0.1));
        }
        for cell in scene.cells() {
            for mesh in cell.instances() {
                assert!(cell.bounds().contains_sphere(&mesh.bounding_sphere()));
            }
        }
        assert_eq!(scene.cell_bounds().len(), scene.cells().len());
    }

    #[test]
    fn test_move_mesh_rebuckets_and_recomputes() {
        let mut scene = Scene::with_cell_size(10.0);
        let id = scene.add_mesh(StaticMeshInstance::new("crate", Vec3::new(5.0, 5.0, 5.0), 1.0));
        assert!(scene.move_mesh(id, Vec3::new(55.0, 5.0, 5.0)));

        assert!(scene.cells()[0].bounds().is_degenerate());
        assert_eq!(scene.cells()[1].bounds().center(), Vec3::new(55.0, 5.0, 5.0));
        assert_eq!(scene.mesh(id).map(|m| m.position), Some(Vec3::new(55.0, 5.0, 5.0)));
        assert!(!scene.move_mesh(ObjectId(99), Vec3::zeros()));
    }

    #[test]
    fn test_ids_are_reused_after_removal() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(StaticMeshInstance::new("m", Vec3::zeros(), 1.0));
        let light = scene.add_point_light(PointLight::new(Vec3::zeros(), 4.0));
        assert_ne!(mesh, light);

        assert!(scene.remove_mesh(mesh).is_some());
        assert!(scene.remove_mesh(mesh).is_none());
        assert_eq!(scene.add_point_light(PointLight::new(Vec3::zeros(), 1.0)), mesh);

        assert!(scene.remove_light(light));
        assert!(!scene.remove_light(light));
        assert_eq!(scene.point_lights().len(), 1);
    }
}
