use tracing::debug;

use crate::error::SampleError;
use crate::models::{FrameBuffer, rgb_len};

/// A live video source the loop samples once per tick.
///
/// Acquiring and releasing the underlying device is the owner's job; the
/// loop only reads the current picture.
pub trait VideoSource: Send + Sync {
    /// Current intrinsic size. `(0, 0)` until the first frame arrives.
    fn dimensions(&self) -> (u32, u32);

    /// Copy the current picture into `buf` as row-major RGB.
    /// `buf.len()` is always `width * height * 3` for the reported dimensions.
    fn copy_frame(&self, buf: &mut [u8]) -> Result<(), SampleError>;
}

impl<T: VideoSource + ?Sized> VideoSource for std::sync::Arc<T> {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn copy_frame(&self, buf: &mut [u8]) -> Result<(), SampleError> {
        (**self).copy_frame(buf)
    }
}

/// Pulls frames out of a [`VideoSource`], reusing one allocation across ticks.
#[derive(Debug, Default)]
pub struct FrameSampler {
    scratch: Vec<u8>,
    last_dimensions: Option<(u32, u32)>,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the source's current frame.
    ///
    /// Fails with [`SampleError::SourceNotReady`] while the source reports a
    /// zero dimension.
    pub fn sample<V: VideoSource + ?Sized>(&mut self, source: &V) -> Result<FrameBuffer, SampleError> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Err(SampleError::SourceNotReady { width, height });
        }

        if self.last_dimensions != Some((width, height)) {
            debug!(width, height, "video source dimensions changed");
            self.last_dimensions = Some((width, height));
        }

        let mut bytes = std::mem::take(&mut self.scratch);
        bytes.resize(rgb_len(width, height), 0);
        if let Err(e) = source.copy_frame(&mut bytes) {
            self.scratch = bytes;
            return Err(e);
        }

        FrameBuffer::new(width, height, bytes).map_err(|e| match e {
            crate::error::FrameError::LengthMismatch { expected, actual, .. } => {
                SampleError::BufferSizeMismatch { expected, actual }
            }
            other => SampleError::Source(other.to_string()),
        })
    }

    /// Hand a finished frame's allocation back for the next tick.
    pub fn recycle(&mut self, frame: FrameBuffer) {
        self.scratch = frame.into_bytes();
    }
}
