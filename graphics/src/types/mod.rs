//! Plain descriptor types shared by the device, resources and frame graph.

mod buffer;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use texture::{Extent2d, TextureDescriptor, TextureFormat, TextureUsage};
