//! # Ember Core
//!
//! Shared building blocks for the Ember renderer: f32 math and bounding
//! volumes, reusable id allocation, and profiling hooks.

pub mod id_alloc;
pub mod math;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
