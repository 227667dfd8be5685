//! Renderer configuration.
//!
//! Loaded from TOML. Every field is optional:
//!
//! ```toml
//! frames_in_flight = 2
//! worker_threads = 4
//! fence_timeout_ms = 2000
//! auto_complete_submissions = true
//! transient_idle_frames = 3
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GraphicsError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Threads in the job system driving the scheduler.
    pub worker_threads: usize,
    /// Upper bound on any single fence wait.
    pub fence_timeout_ms: u64,
    /// Whether the dummy backend signals fences at submission.
    pub auto_complete_submissions: bool,
    /// Frames an unused pooled transient survives before it is dropped.
    pub transient_idle_frames: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: crate::pipeline::DEFAULT_FRAMES_IN_FLIGHT,
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            fence_timeout_ms: 2000,
            auto_complete_submissions: true,
            transient_idle_frames: crate::frame_graph::DEFAULT_TRANSIENT_IDLE_FRAMES,
        }
    }
}

impl RendererConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source).inspect_err(|err| {
            log::error!("Invalid renderer configuration {}: {err}", path.display());
        })
    }

    pub fn to_toml_string(&self) -> String {
        // Plain integers and booleans always serialize.
        toml::to_string(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.frames_in_flight) {
            return Err(GraphicsError::InvalidConfig(format!(
                "frames_in_flight must be between 1 and 3, got {}",
                self.frames_in_flight
            )));
        }
        if self.worker_threads == 0 {
            return Err(GraphicsError::InvalidConfig(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.fence_timeout_ms == 0 {
            return Err(GraphicsError::InvalidConfig(
                "fence_timeout_ms must be positive".into(),
            ));
        }
        if self.transient_idle_frames == 0 {
            return Err(GraphicsError::InvalidConfig(
                "transient_idle_frames must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn fence_timeout(&self) -> Duration {
        Duration::from_millis(self.fence_timeout_ms)
    }
}
