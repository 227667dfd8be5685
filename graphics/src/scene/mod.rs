//! Scene layer consumed by the renderer.
//!
//! - [`Scene`] - static mesh instances grouped into spatial [`SceneCell`]s, plus lights
//! - [`Camera`] - view, projection and visibility mask
//! - [`SceneVisibility`] - per-frame visible subset for one camera
//!
//! # Culling
//!
//! An object is visible when its visibility flags share a bit with the
//! camera's mask and its bounding sphere is not fully outside any frustum
//! plane. Whole cells are skipped when their box is outside the frustum;
//! every mesh sphere lies inside its cell's box, so this never changes the
//! result.
//!
//! Nothing is cached between frames: a snapshot is recomputed from scratch
//! whenever it is requested.

mod camera;
mod cell;
mod object;
mod visibility;
mod world;

pub use camera::Camera;
pub use cell::{CellCoord, SceneCell};
pub use object::{ObjectId, PointLight, SceneObject, SpotLight, StaticMeshInstance, VisibilityMask};
pub use visibility::SceneVisibility;
pub use world::{DEFAULT_CELL_SIZE, Scene};
