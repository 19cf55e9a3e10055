use std::collections::HashMap;

use time::OffsetDateTime;

use crate::error::FrameError;

/// Number of interleaved channels per pixel (R, G, B).
pub const CHANNELS: usize = 3;

/// One RGB frame copied out of a video source.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
    captured_at: OffsetDateTime,
}

impl FrameBuffer {
    /// Wrap an RGB byte buffer, checking it against the dimensions.
    pub fn new(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimension { width, height });
        }
        let expected = rgb_len(width, height);
        if bytes.len() != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            width,
            height,
            bytes,
            captured_at: OffsetDateTime::now_utc(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw pixels, row-major, channel-interleaved RGB.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn captured_at(&self) -> OffsetDateTime {
        self.captured_at
    }

    /// Give the allocation back, e.g. to a sampler that reuses it.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Number of bytes an RGB frame of the given size occupies.
pub fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

/// Normalized pixel data handed to a classifier.
///
/// Layout is row-major with interleaved channels: element `3 * (y * width + x) + c`
/// holds channel `c` (0 = R, 1 = G, 2 = B) of pixel `(x, y)`, scaled to `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl FeatureVector {
    /// Values are clamped into `[0.0, 1.0]`. The caller guarantees
    /// `values.len() == width * height * 3`.
    pub(crate) fn from_parts(width: u32, height: u32, mut values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), rgb_len(width, height));
        for v in values.iter_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        Self {
            width,
            height,
            values,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

/// Label → confidence scores for one classified frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationResult {
    scores: HashMap<String, f32>,
}

impl ClassificationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a score. Scores are clamped into `[0.0, 1.0]`; NaN counts as 0.
    pub fn with_score(mut self, label: impl Into<String>, score: f32) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        self.scores.insert(label.into(), score);
        self
    }

    pub fn score(&self, label: &str) -> Option<f32> {
        self.scores.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Highest scoring label, if any.
    pub fn top(&self) -> Option<(&str, f32)> {
        self.scores
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(label, score)| (label.as_str(), *score))
    }
}

impl<L: Into<String>> FromIterator<(L, f32)> for ClassificationResult {
    fn from_iter<T: IntoIterator<Item = (L, f32)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |acc, (label, score)| acc.with_score(label, score))
    }
}

/// What one tick concluded about the target label.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Detected { label: String, confidence: f32 },
    Clear { best_confidence: f32 },
}

impl DetectionOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, DetectionOutcome::Detected { .. })
    }

    /// Target label confidence observed in this tick.
    pub fn confidence(&self) -> f32 {
        match self {
            DetectionOutcome::Detected { confidence, .. } => *confidence,
            DetectionOutcome::Clear { best_confidence } => *best_confidence,
        }
    }
}
