//! Graphics error types.
//!
//! Only device-level failures are errors. Broken invariants (cyclic frame
//! graphs, recording from a foreign thread, invalid frame tokens) panic at
//! the point of detection instead.

use thiserror::Error;

use crate::sync::Epoch;

/// Errors that can occur in the graphics system.
///
/// None of these are retried at this layer. A caller receiving one is
/// expected to shut the renderer down.
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// Failed to initialize the device.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Out of GPU or host memory while growing a pool.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// A queue rejected a submission.
    #[error("queue submission failed: {0}")]
    SubmissionFailed(String),
    /// A completion fence did not signal in time.
    #[error("timed out after {waited_ms} ms waiting for epoch {epoch}")]
    FenceTimeout { epoch: Epoch, waited_ms: u64 },
    /// Invalid parameter passed to a resource constructor.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Renderer configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Renderer configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    /// Renderer configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),
}

impl GraphicsError {
    /// Whether the device must be considered gone after this error.
    pub fn is_device_fatal(&self) -> bool {
        matches!(
            self,
            Self::DeviceLost | Self::SubmissionFailed(_) | Self::FenceTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphicsError>;
