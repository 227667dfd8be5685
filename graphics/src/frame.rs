//! Per-frame token.

use crate::types::Extent2d;

/// Identifies the frame being built and which buffered slot it uses.
///
/// Created once per frame by [`FramePipeline::begin_frame`] and read by
/// every frame graph node that needs per-slot resources.
///
/// [`FramePipeline::begin_frame`]: crate::FramePipeline::begin_frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    frame_id: u64,
    image_index: u32,
    image_count: u32,
    extent: Extent2d,
}

impl FrameToken {
    /// # Panics
    ///
    /// Panics unless `image_index < image_count`.
    pub fn new(frame_id: u64, image_index: u32, image_count: u32, extent: Extent2d) -> Self {
        assert!(
            image_index < image_count,
            "invalid frame token: image index {image_index} out of range for {image_count} images"
        );
        Self {
            frame_id,
            image_index,
            image_count,
            extent,
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn image_count(&self) -> u32 {
        self.image_count
    }

    /// Size of the output image.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Picks this frame's instance out of per-slot storage.
    pub fn select<'a, T>(&self, per_slot: &'a [T]) -> &'a T {
        assert_eq!(
            per_slot.len(),
            self.image_count as usize,
            "per-slot storage does not match the frame's image count"
        );
        &per_slot[self.image_index as usize]
    }
}
