//! Math type aliases, camera helpers and bounding volumes.
//!
//! Rendering math is always f32. Projections follow the `[0, 1]` depth
//! convention, so frustum extraction uses the near plane `z >= 0` in clip
//! space rather than OpenGL's `z >= -w`.

pub use nalgebra;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Build a right-handed perspective projection with depth range [0, 1].
pub fn perspective_rh(yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
    let f = 1.0 / (yfov / 2.0).tan();
    let nf = 1.0 / (znear - zfar);
    #[rustfmt::skip]
    let result = Mat4::new(
        f / aspect, 0.0,  0.0,              0.0,
        0.0,        f,    0.0,              0.0,
        0.0,        0.0,  zfar * nf,        znear * zfar * nf,
        0.0,        0.0,  -1.0,             0.0,
    );
    result
}

/// Right-handed look-at view matrix.
pub fn look_at_rh(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
    let eye_point = nalgebra::Point3::from(*eye);
    let target_point = nalgebra::Point3::from(*target);
    nalgebra::Isometry3::look_at_rh(&eye_point, &target_point, up).to_homogeneous()
}

/// Bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        debug_assert!(radius >= 0.0, "negative sphere radius {radius}");
        Self { center, radius }
    }
}

/// Axis-aligned bounding box.
///
/// Always satisfies `min[i] <= max[i]`. The default box is the degenerate
/// box at the origin, which is what an empty set of volumes produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::zeros(),
            max: Vec3::zeros(),
        }
    }
}

impl Aabb {
    /// Creates a box from two corners.
    ///
    /// # Panics
    ///
    /// Panics if `min` is greater than `max` on any axis.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        assert!(
            (0..3).all(|i| min[i] <= max[i]),
            "invalid AABB: min {min:?} is not below max {max:?}"
        );
        Self { min, max }
    }

    /// Smallest box containing every sphere.
    ///
    /// Returns the zero box for an empty iterator.
    pub fn from_spheres<I>(spheres: I) -> Self
    where
        I: IntoIterator<Item = Sphere>,
    {
        let mut iter = spheres.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };

        let extent = Vec3::repeat(first.radius);
        let mut min = first.center - extent;
        let mut max = first.center + extent;
        for sphere in iter {
            let extent = Vec3::repeat(sphere.radius);
            min = min.inf(&(sphere.center - extent));
            max = max.sup(&(sphere.center + extent));
        }
        Self { min, max }
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Whether `min == max` on every axis.
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    /// Whether the sphere lies entirely inside the box (touching counts).
    pub fn contains_sphere(&self, sphere: &Sphere) -> bool {
        (0..3).all(|i| {
            sphere.center[i] - sphere.radius >= self.min[i]
                && sphere.center[i] + sphere.radius <= self.max[i]
        })
    }
}

/// Plane `normal . p + d = 0` with a unit normal pointing inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Builds a plane from raw coefficients and normalizes it.
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.xyz();
        let len = normal.norm();
        debug_assert!(len > 0.0, "degenerate plane {coefficients:?}");
        Self {
            normal: normal / len,
            d: coefficients.w / len,
        }
    }

    /// Signed distance from the plane, positive on the inner side.
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Six-plane view frustum with inward-facing normals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the frustum of a `projection * view` matrix with `[0, 1]` depth.
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { view_proj.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r2),      // near
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    pub fn from_planes(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// `false` only when the sphere is fully outside at least one plane.
    ///
    /// A sphere touching a plane from the outside is still considered inside.
    pub fn contains_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(&sphere.center) >= -sphere.radius)
    }

    /// Conservative box test: `false` only when the box is fully outside a plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let center = aabb.center();
        let half = aabb.half_extent();
        self.planes.iter().all(|plane| {
            let reach = half.x * plane.normal.x.abs()
                + half.y * plane.normal.y.abs()
                + half.z * plane.normal.z.abs();
            plane.signed_distance(&center) >= -reach
        })
    }
}
