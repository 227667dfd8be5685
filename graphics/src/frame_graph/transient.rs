//! Transient resource pool.
//!
//! Frame graph images and buffers live for one frame, but allocating them
//! every frame is wasteful. Released resources are parked here with the
//! epoch of the submission that last used them and handed out again to a
//! compatible request once that epoch has completed.
//!
//! Parked resources nobody asked for during the last
//! [`max_idle_frames`](TransientPool::max_idle_frames) frames are dropped at
//! [`begin_frame`](TransientPool::begin_frame), so a resize does not leave
//! the previous size's targets behind. Dropping only releases the pool's
//! reference: a worker context still pins anything an unfinished submission
//! uses.

use crate::device::Device;
use crate::error::Result;
use crate::resources::{Buffer, Texture};
use crate::sync::Epoch;
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Frames an idle pooled resource survives by default.
pub const DEFAULT_TRANSIENT_IDLE_FRAMES: u64 = 3;

/// Allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransientStats {
    pub textures_created: usize,
    pub textures_reused: usize,
    pub textures_evicted: usize,
    pub buffers_created: usize,
    pub buffers_reused: usize,
    pub buffers_evicted: usize,
}

#[derive(Debug)]
struct Parked<T> {
    /// Submission that last used the resource.
    epoch: Epoch,
    /// Pool frame in which it was released.
    frame: u64,
    resource: T,
}

#[derive(Debug)]
pub struct TransientPool {
    textures: Vec<Parked<Texture>>,
    buffers: Vec<Parked<Buffer>>,
    frame: u64,
    max_idle_frames: u64,
    stats: TransientStats,
}

impl Default for TransientPool {
    fn default() -> Self {
        Self::with_max_idle_frames(DEFAULT_TRANSIENT_IDLE_FRAMES)
    }
}

impl TransientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `max_idle_frames` is zero.
    pub fn with_max_idle_frames(max_idle_frames: u64) -> Self {
        assert!(max_idle_frames > 0, "transient pool idle window must be at least one frame");
        Self {
            textures: Vec::new(),
            buffers: Vec::new(),
            frame: 0,
            max_idle_frames,
            stats: TransientStats::default(),
        }
    }

    pub fn max_idle_frames(&self) -> u64 {
        self.max_idle_frames
    }

    /// Frames started so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Starts a frame and drops resources idle for more than
    /// `max_idle_frames` frames.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        let (frame, max_idle) = (self.frame, self.max_idle_frames);
        let stale = |parked_frame: u64| frame - parked_frame > max_idle;

        let before = self.textures.len();
        self.textures.retain(|p| !stale(p.frame));
        let textures = before - self.textures.len();

        let before = self.buffers.len();
        self.buffers.retain(|p| !stale(p.frame));
        let buffers = before - self.buffers.len();

        if textures + buffers > 0 {
            self.stats.textures_evicted += textures;
            self.stats.buffers_evicted += buffers;
            log::debug!(
                "Transient pool: evicted {textures} textures and {buffers} buffers idle for more than {max_idle} frames"
            );
        }
    }

    /// Returns an idle texture matching `descriptor` whose last use has
    /// completed, or creates one.
    pub fn acquire_texture(
        &mut self,
        device: &Device,
        descriptor: &TextureDescriptor,
        completed: Epoch,
    ) -> Result<Texture> {
        let found = self.textures.iter().position(|p| {
            p.epoch <= completed && p.resource.descriptor().is_compatible(descriptor)
        });
        if let Some(index) = found {
            self.stats.textures_reused += 1;
            return Ok(self.textures.swap_remove(index).resource);
        }
        let texture = device.create_texture(descriptor)?;
        self.stats.textures_created += 1;
        log::debug!(
            "Transient pool: created texture {:?} ({}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );
        Ok(texture)
    }

    pub fn release_texture(&mut self, texture: Texture, epoch: Epoch) {
        self.textures.push(Parked {
            epoch,
            frame: self.frame,
            resource: texture,
        });
    }

    /// Buffer counterpart of [`acquire_texture`](Self::acquire_texture).
    pub fn acquire_buffer(
        &mut self,
        device: &Device,
        descriptor: &BufferDescriptor,
        completed: Epoch,
    ) -> Result<Buffer> {
        let found = self.buffers.iter().position(|p| {
            p.epoch <= completed && p.resource.descriptor().is_compatible(descriptor)
        });
        if let Some(index) = found {
            self.stats.buffers_reused += 1;
            return Ok(self.buffers.swap_remove(index).resource);
        }
        let buffer = device.create_buffer(descriptor)?;
        self.stats.buffers_created += 1;
        log::debug!(
            "Transient pool: created buffer {:?} ({} bytes)",
            descriptor.label,
            descriptor.size
        );
        Ok(buffer)
    }

    pub fn release_buffer(&mut self, buffer: Buffer, epoch: Epoch) {
        self.buffers.push(Parked {
            epoch,
            frame: self.frame,
            resource: buffer,
        });
    }

    pub fn stats(&self) -> TransientStats {
        self.stats
    }

    pub fn idle_count(&self) -> usize {
        self.textures.len() + self.buffers.len()
    }

    /// Drops every idle resource.
    ///
    /// Only safe to call once the device is idle; the worker contexts still
    /// pin anything an unfinished submission uses, so nothing in flight is
    /// destroyed either way.
    pub fn clear(&mut self) {
        log::debug!("Transient pool: dropping {} idle resources", self.idle_count());
        self.textures.clear();
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::DummyBackend;
    use crate::types::{BufferUsage, TextureFormat, TextureUsage};

    fn device() -> Arc<Device> {
        Device::new(Arc::new(DummyBackend::new())).unwrap()
    }

    fn depth(width: u32) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            width,
            width,
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT,
        )
    }

    #[test]
    fn test_reuse_requires_completion() {
        let device = device();
        let mut pool = TransientPool::new();
        let first = pool.acquire_texture(&device, &depth(32), Epoch::ZERO).unwrap();
        let key = first.key();
        pool.release_texture(first, Epoch::new(1));

        let busy = pool.acquire_texture(&device, &depth(32), Epoch::ZERO).unwrap();
        assert_ne!(busy.key(), key);

        let reused = pool.acquire_texture(&device, &depth(32), Epoch::new(1)).unwrap();
        assert_eq!(reused.key(), key);
        assert_eq!(pool.stats().textures_created, 2);
        assert_eq!(pool.stats().textures_reused, 1);
    }

    #[test]
    fn test_incompatible_descriptor_allocates() {
        let device = device();
        let mut pool = TransientPool::new();
        let small = pool.acquire_texture(&device, &depth(32), Epoch::ZERO).unwrap();
        pool.release_texture(small, Epoch::ZERO);
        let _large = pool.acquire_texture(&device, &depth(64), Epoch::ZERO).unwrap();
        assert_eq!(pool.stats().textures_reused, 0);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_buffers_ignore_labels() {
        let device = device();
        let mut pool = TransientPool::new();
        let desc = BufferDescriptor::new(256, BufferUsage::STORAGE).with_label("a");
        let buffer = pool.acquire_buffer(&device, &desc, Epoch::ZERO).unwrap();
        pool.release_buffer(buffer, Epoch::ZERO);

        let other = BufferDescriptor::new(256, BufferUsage::STORAGE).with_label("b");
        pool.acquire_buffer(&device, &other, Epoch::ZERO).unwrap();
        assert_eq!(pool.stats().buffers_reused, 1);
        pool.clear();
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_unrequested_resources_are_evicted() {
        let device = device();
        let mut pool = TransientPool::with_max_idle_frames(2);

        pool.begin_frame();
        let old = pool.acquire_texture(&device, &depth(32), Epoch::ZERO).unwrap();
        pool.release_texture(old, Epoch::new(1));

        // Frames two and three ask for another size only.
        for epoch in 2..=3 {
            pool.begin_frame();
            let fresh = pool.acquire_texture(&device, &depth(64), Epoch::new(epoch - 1)).unwrap();
            pool.release_texture(fresh, Epoch::new(epoch));
        }
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.stats().textures_evicted, 0);

        pool.begin_frame();
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.stats().textures_evicted, 1);
        assert_eq!(pool.stats().textures_reused, 1);
    }

    #[test]
    fn test_reused_resource_restarts_its_idle_window() {
        let device = device();
        let mut pool = TransientPool::with_max_idle_frames(1);
        for epoch in 1..=5 {
            pool.begin_frame();
            let texture = pool.acquire_texture(&device, &depth(32), Epoch::new(epoch - 1)).unwrap();
            pool.release_texture(texture, Epoch::new(epoch));
        }
        assert_eq!(pool.stats().textures_created, 1);
        assert_eq!(pool.stats().textures_evicted, 0);
    }

    #[test]
    #[should_panic(expected = "at least one frame")]
    fn test_zero_idle_window_panics() {
        TransientPool::with_max_idle_frames(0);
    }
}
