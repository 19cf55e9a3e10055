pub mod alert;
pub mod classifier;
pub mod decision;
pub mod features;
pub mod sampler;
pub mod sources;

pub use alert::{AlertDispatcher, AlertEffect, AlertSink, AudioCue, AudioOutput};
pub use classifier::{AnyClassifier, Classifier, MockClassifier, RtenClassifier};
pub use decision::decide;
pub use features::extract;
pub use sampler::{FrameSampler, VideoSource};
