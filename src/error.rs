//! Error types for the detection loop.
//!
//! Every per-tick failure is recoverable: the loop never terminates because
//! of one of these, only an explicit stop ends a run.

use thiserror::Error;

/// Errors raised while pulling a frame from a video source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SampleError {
    /// The source reports a zero dimension. Expected while the camera warms up;
    /// the tick is skipped and retried on the next frame.
    #[error("video source not ready (reported {width}x{height})")]
    SourceNotReady { width: u32, height: u32 },

    /// The source wrote a different amount of data than its dimensions imply.
    #[error("frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// The source failed to produce its current frame.
    #[error("video source error: {0}")]
    Source(String),
}

impl SampleError {
    /// Whether the caller should quietly retry on the next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SampleError::SourceNotReady { .. })
    }
}

/// Errors raised by a [`crate::detection::classifier::Classifier`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),

    #[error("model reports {outputs} scores but {labels} labels were loaded")]
    LabelMismatch { outputs: usize, labels: usize },

    #[error("feature vector shape {width}x{height} does not match model input {expected_width}x{expected_height}")]
    ShapeMismatch {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    /// Transient condition, e.g. the inference device is busy.
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

/// Audio playback failure. Always swallowed by the alert dispatcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("audio playback failed: {0}")]
pub struct AudioPlaybackError(pub String);

/// Invalid frame construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("frame of {width}x{height} needs {expected} RGB bytes, got {actual}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Invalid detector configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("target label must not be empty")]
    EmptyLabel,

    #[error("threshold must lie strictly between 0 and 1, got {0}")]
    ThresholdOutOfRange(f32),
}

/// Why a tick stopped before publishing an alert.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TickError {
    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}
