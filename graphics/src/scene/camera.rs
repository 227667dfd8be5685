//! Camera description used for culling.

use ember_core::math::{Frustum, Mat4, Vec3, look_at_rh, perspective_rh};

use super::object::VisibilityMask;

/// View and projection of one camera plus the layers it draws.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
    pub visibility_mask: VisibilityMask,
}

impl Camera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view,
            projection,
            visibility_mask: VisibilityMask::DEFAULT,
        }
    }

    /// Perspective camera at `eye` looking at `target` with +Y up.
    pub fn look_at(eye: Vec3, target: Vec3, yfov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let view = look_at_rh(&eye, &target, &Vec3::new(0.0, 1.0, 0.0));
        Self::new(view, perspective_rh(yfov, aspect, near, far))
    }

    pub fn with_visibility_mask(mut self, mask: VisibilityMask) -> Self {
        self.visibility_mask = mask;
        self
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }
}
