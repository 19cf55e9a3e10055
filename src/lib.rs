pub mod config;
pub mod controller;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

pub use config::DetectorConfig;
pub use controller::{DisplayClock, FrameClock, LoopController, LoopHandle, LoopState, YieldClock};
pub use detection::{
    AlertDispatcher, AlertEffect, AnyClassifier, AlertSink, AudioCue, AudioOutput, Classifier, FrameSampler,
    MockClassifier, RtenClassifier, VideoSource,
};
pub use error::{AudioPlaybackError, ClassifyError, ConfigError, FrameError, SampleError, TickError};
pub use models::{ClassificationResult, DetectionOutcome, FeatureVector, FrameBuffer};
pub use pipeline::{LoopStats, TickOutcome, TickPipeline};
