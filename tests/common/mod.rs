mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from trashspot for tests
#[allow(unused_imports)]
pub use trashspot::{
    AlertEffect, AlertSink, AudioCue, AudioOutput, AudioPlaybackError, ClassificationResult,
    ClassifyError, Classifier, DetectionOutcome, DetectorConfig, FeatureVector, LoopController,
    LoopState, SampleError, TickOutcome, TickPipeline, VideoSource, YieldClock,
};
