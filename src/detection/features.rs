use crate::models::{FeatureVector, FrameBuffer};

/// Normalize a frame into the classifier's input layout.
///
/// Each channel byte is divided by 255, keeping the frame's row-major,
/// channel-interleaved RGB order. Classifiers consume exactly this layout;
/// a model trained on planar or BGR input needs its own adapter.
pub fn extract(frame: &FrameBuffer) -> FeatureVector {
    let values = frame
        .as_bytes()
        .iter()
        .map(|&b| f32::from(b) / 255.0)
        .collect();
    FeatureVector::from_parts(frame.width(), frame.height(), values)
}
