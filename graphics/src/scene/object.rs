//! Renderable scene objects.

use bitflags::bitflags;
use ember_core::math::{Frustum, Sphere, Vec3};

bitflags! {
    /// Layers an object is drawn on. A camera sees an object when the two
    /// masks share at least one bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VisibilityMask: u32 {
        const DEFAULT = 1 << 0;
        /// Gizmos and helpers only editor cameras draw.
        const EDITOR = 1 << 1;
        /// Objects kept out of reflection captures.
        const NO_CAPTURE = 1 << 2;
        const _ = !0;
    }
}

impl Default for VisibilityMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Scene-wide object identifier. Freed ids are reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    /// Id of an object not yet added to a scene.
    pub const UNASSIGNED: ObjectId = ObjectId(u32::MAX);

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Anything culled against a camera.
pub trait SceneObject {
    fn position(&self) -> Vec3;

    /// Bounding radius around [`position`](Self::position).
    fn radius(&self) -> f32;

    fn visibility(&self) -> VisibilityMask;

    fn bounding_sphere(&self) -> Sphere {
        Sphere::new(self.position(), self.radius())
    }

    /// Mask test first, then the (non-strict) frustum test.
    fn is_visible(&self, frustum: &Frustum, mask: VisibilityMask) -> bool {
        self.visibility().intersects(mask) && frustum.contains_sphere(&self.bounding_sphere())
    }
}

/// A placed static mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMeshInstance {
    pub(crate) id: ObjectId,
    pub label: String,
    pub position: Vec3,
    pub radius: f32,
    pub vertex_count: u32,
    pub visibility: VisibilityMask,
}

impl StaticMeshInstance {
    pub fn new(label: impl Into<String>, position: Vec3, radius: f32) -> Self {
        Self {
            id: ObjectId::UNASSIGNED,
            label: label.into(),
            position,
            radius,
            vertex_count: 36,
            visibility: VisibilityMask::DEFAULT,
        }
    }

    pub fn with_vertex_count(mut self, vertex_count: u32) -> Self {
        self.vertex_count = vertex_count;
        self
    }

    pub fn with_visibility(mut self, visibility: VisibilityMask) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl SceneObject for StaticMeshInstance {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn radius(&self) -> f32 {
        self.radius
    }

    fn visibility(&self) -> VisibilityMask {
        self.visibility
    }
}

/// Omnidirectional light. `radius` is its range of influence.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub(crate) id: ObjectId,
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub intensity: f32,
    pub visibility: VisibilityMask,
}

impl PointLight {
    pub fn new(position: Vec3, radius: f32) -> Self {
        Self {
            id: ObjectId::UNASSIGNED,
            position,
            radius,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            visibility: VisibilityMask::DEFAULT,
        }
    }

    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }

    pub fn with_visibility(mut self, visibility: VisibilityMask) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl SceneObject for PointLight {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn radius(&self) -> f32 {
        self.radius
    }

    fn visibility(&self) -> VisibilityMask {
        self.visibility
    }
}

/// Cone light. Culled by the sphere of its range, which encloses the cone.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotLight {
    pub(crate) id: ObjectId,
    pub position: Vec3,
    pub direction: Vec3,
    pub radius: f32,
    /// Half-angle of the cone in radians.
    pub outer_angle: f32,
    pub color: Vec3,
    pub intensity: f32,
    pub visibility: VisibilityMask,
}

impl SpotLight {
    pub fn new(position: Vec3, direction: Vec3, radius: f32, outer_angle: f32) -> Self {
        Self {
            id: ObjectId::UNASSIGNED,
            position,
            direction: direction.normalize(),
            radius,
            outer_angle,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            visibility: VisibilityMask::DEFAULT,
        }
    }

    pub fn with_visibility(mut self, visibility: VisibilityMask) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl SceneObject for SpotLight {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn radius(&self) -> f32 {
        self.radius
    }

    fn visibility(&self) -> VisibilityMask {
        self.visibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::math::{Plane, Vec3};

    /// Only the plane z <= 0 matters; the other five face away from the tests.
    fn half_space() -> Frustum {
        let open = Plane {
            normal: Vec3::new(0.0, 1.0, 0.0),
            d: 1.0e6,
        };
        Frustum::from_planes([
            Plane {
                normal: Vec3::new(0.0, 0.0, -1.0),
                d: 0.0,
            },
            open,
            open,
            open,
            open,
            open,
        ])
    }

    #[test]
    fn test_mask_excludes_before_frustum() {
        let mesh = StaticMeshInstance::new("gizmo", Vec3::new(0.0, 0.0, -5.0), 1.0)
            .with_visibility(VisibilityMask::EDITOR);
        assert!(!mesh.is_visible(&half_space(), VisibilityMask::DEFAULT));
        assert!(mesh.is_visible(
            &half_space(),
            VisibilityMask::DEFAULT | VisibilityMask::EDITOR
        ));
    }

    #[test]
    fn test_sphere_touching_plane_is_visible() {
        let light = PointLight::new(Vec3::new(0.0, 0.0, 1.0), 1.0);
        assert!(light.is_visible(&half_space(), VisibilityMask::all()));

        let light = PointLight::new(Vec3::new(0.0, 0.0, 1.0), 0.5);
        assert!(!light.is_visible(&half_space(), VisibilityMask::all()));
    }

    #[test]
    fn test_spot_direction_is_normalized() {
        let spot = SpotLight::new(Vec3::zeros(), Vec3::new(0.0, -4.0, 0.0), 10.0, 0.5);
        assert!((spot.direction.norm() - 1.0).abs() < 1e-6);
        assert_eq!(spot.id(), ObjectId::UNASSIGNED);
    }
}
