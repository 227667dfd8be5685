//! Spatial cells.

use ember_core::math::{Aabb, Vec3};

use super::object::{ObjectId, SceneObject, StaticMeshInstance};

/// Integer grid coordinate of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellCoord {
    /// Cell containing `position` on a grid of `cell_size` cubes.
    pub fn containing(position: &Vec3, cell_size: f32) -> Self {
        let snap = |v: f32| (v / cell_size).floor() as i32;
        Self {
            x: snap(position.x),
            y: snap(position.y),
            z: snap(position.z),
        }
    }
}

/// A group of static mesh instances with a box covering all of them.
///
/// The box is rebuilt from every instance on each insert or remove, never
/// updated incrementally. An empty cell has the zero box.
#[derive(Debug, Clone)]
pub struct SceneCell {
    coord: CellCoord,
    instances: Vec<StaticMeshInstance>,
    bounds: Aabb,
}

impl SceneCell {
    pub fn new(coord: CellCoord) -> Self {
        Self {
            coord,
            instances: Vec::new(),
            bounds: Aabb::default(),
        }
    }

    pub fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Instances in insertion order.
    pub fn instances(&self) -> &[StaticMeshInstance] {
        &self.instances
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn insert(&mut self, instance: StaticMeshInstance) {
        self.instances.push(instance);
        self.recompute_bounds();
    }

    /// Removes the instance with `id`, keeping the order of the others.
    pub fn remove(&mut self, id: ObjectId) -> Option<StaticMeshInstance> {
        let index = self.instances.iter().position(|i| i.id == id)?;
        let removed = self.instances.remove(index);
        self.recompute_bounds();
        Some(removed)
    }

    fn recompute_bounds(&mut self) {
        self.bounds = Aabb::from_spheres(self.instances.iter().map(|i| i.bounding_sphere()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(id: u32, position: Vec3, radius: f32) -> StaticMeshInstance {
        let mut mesh = StaticMeshInstance::new(format!("mesh{id}"), position, radius);
        mesh.id = ObjectId(id);
        mesh
    }

    #[test]
    fn test_empty_cell_has_zero_box() {
        let cell = SceneCell::new(CellCoord { x: 3, y: 0, z: -2 });
        assert!(cell.bounds().is_degenerate());
        assert_eq!(cell.bounds().min(), Vec3::zeros());
    }

    #[test]
    fn test_bounds_follow_inserts_and_removes() {
        let mut cell = SceneCell::new(CellCoord { x: 0, y: 0, z: 0 });
        let a = mesh(0, Vec3::new(1.0, 1.0, 1.0), 1.0);
        let b = mesh(1, Vec3::new(10.0, 2.0, 3.0), 2.0);
        cell.insert(a.clone());
        cell.insert(b.clone());

        for instance in cell.instances() {
            assert!(cell.bounds().contains_sphere(&instance.bounding_sphere()));
        }
        assert_eq!(cell.bounds().max(), Vec3::new(12.0, 4.0, 5.0));

        // Shrinks back, not just grows.
        assert_eq!(cell.remove(ObjectId(1)), Some(b));
        assert_eq!(cell.bounds().min(), Vec3::zeros());
        assert_eq!(cell.bounds().max(), Vec3::new(2.0, 2.0, 2.0));

        assert_eq!(cell.remove(ObjectId(0)), Some(a));
        assert!(cell.is_empty());
        assert!(cell.bounds().is_degenerate());
        assert_eq!(cell.remove(ObjectId(0)), None);
    }

    #[test]
    fn test_cell_coord_floors_negative_positions() {
        let coord = CellCoord::containing(&Vec3::new(-0.5, 15.9, 16.0), 16.0);
        assert_eq!(coord, CellCoord { x: -1, y: 0, z: 1 });
    }
}
