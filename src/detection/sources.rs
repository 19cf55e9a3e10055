//! Video sources for running the loop without a camera driver.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use image::RgbImage;
use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::detection::sampler::VideoSource;
use crate::error::SampleError;

/// Plays a list of still images as a looping video.
pub struct ImageSequenceSource {
    frames: Vec<RgbImage>,
    cursor: AtomicUsize,
}

impl ImageSequenceSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Decode image files, optionally resizing each to `size`.
    pub fn open<P: AsRef<Path>>(paths: &[P], size: Option<(u32, u32)>) -> anyhow::Result<Self> {
        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let img = image::open(path)
                .map_err(|e| anyhow::anyhow!("Failed to decode image {}: {}", path.display(), e))?
                .to_rgb8();
            let img = match size {
                Some((w, h)) if img.dimensions() != (w, h) => {
                    image::imageops::resize(&img, w, h, FilterType::Triangle)
                }
                _ => img,
            };
            frames.push(img);
        }
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn current(&self) -> Option<&RgbImage> {
        if self.frames.is_empty() {
            return None;
        }
        self.frames.get(self.cursor.load(Ordering::Acquire) % self.frames.len())
    }
}

impl VideoSource for ImageSequenceSource {
    fn dimensions(&self) -> (u32, u32) {
        self.current().map(|img| img.dimensions()).unwrap_or((0, 0))
    }

    fn copy_frame(&self, buf: &mut [u8]) -> Result<(), SampleError> {
        let img = self.current().ok_or(SampleError::SourceNotReady { width: 0, height: 0 })?;
        let raw = img.as_raw();
        if raw.len() != buf.len() {
            return Err(SampleError::BufferSizeMismatch {
                expected: buf.len(),
                actual: raw.len(),
            });
        }
        buf.copy_from_slice(raw);
        self.cursor.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Random noise frames, reporting no picture for a number of initial polls
/// the way a camera does while it starts up.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    warmup_polls: AtomicU32,
    rng: Mutex<StdRng>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            warmup_polls: AtomicU32::new(0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_warmup(self, polls: u32) -> Self {
        self.warmup_polls.store(polls, Ordering::Release);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }
}

impl VideoSource for SyntheticSource {
    fn dimensions(&self) -> (u32, u32) {
        let warming = self
            .warmup_polls
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if warming { (0, 0) } else { (self.width, self.height) }
    }

    fn copy_frame(&self, buf: &mut [u8]) -> Result<(), SampleError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| SampleError::Source("synthetic rng poisoned".into()))?;
        rng.fill_bytes(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::sampler::FrameSampler;

    #[test]
    fn synthetic_source_warms_up_first() {
        let source = SyntheticSource::new(8, 6).with_warmup(2).with_seed(1);
        let mut sampler = FrameSampler::new();

        assert!(sampler.sample(&source).unwrap_err().is_retryable());
        assert!(sampler.sample(&source).unwrap_err().is_retryable());
        let frame = sampler.sample(&source).unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
    }

    #[test]
    fn image_sequence_cycles_frames() {
        let red = RgbImage::from_pixel(2, 2, image::Rgb([255, 0, 0]));
        let blue = RgbImage::from_pixel(3, 1, image::Rgb([0, 0, 255]));
        let source = ImageSequenceSource::new(vec![red, blue]);
        let mut sampler = FrameSampler::new();

        let first = sampler.sample(&source).unwrap();
        assert_eq!(first.dimensions(), (2, 2));
        assert_eq!(&first.as_bytes()[..3], &[255, 0, 0]);
        sampler.recycle(first);

        let second = sampler.sample(&source).unwrap();
        assert_eq!(second.dimensions(), (3, 1));
        assert_eq!(&second.as_bytes()[..3], &[0, 0, 255]);
        sampler.recycle(second);

        assert_eq!(sampler.sample(&source).unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn empty_sequence_is_never_ready() {
        let source = ImageSequenceSource::new(Vec::new());
        assert_eq!(source.dimensions(), (0, 0));
        assert!(FrameSampler::new().sample(&source).unwrap_err().is_retryable());
    }
}
