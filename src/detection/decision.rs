use crate::models::{ClassificationResult, DetectionOutcome};

/// Apply the confidence threshold to one classification.
///
/// A missing label reads as 0.0. Only a score strictly above `threshold`
/// is a detection.
pub fn decide(result: ClassificationResult, target_label: &str, threshold: f32) -> DetectionOutcome {
    let confidence = result.score(target_label).unwrap_or(0.0);

    if confidence > threshold {
        DetectionOutcome::Detected {
            label: target_label.to_string(),
            confidence,
        }
    } else {
        DetectionOutcome::Clear {
            best_confidence: confidence,
        }
    }
}
