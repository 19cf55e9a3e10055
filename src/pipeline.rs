use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::config::DetectorConfig;
use crate::detection::alert::{AlertDispatcher, AlertSink, AudioOutput};
use crate::detection::classifier::Classifier;
use crate::detection::sampler::{FrameSampler, VideoSource};
use crate::detection::{decide, extract};
use crate::error::{ConfigError, TickError};
use crate::models::DetectionOutcome;

/// Result of one pass through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The source had no picture yet. Nothing was reported.
    Skipped,
    /// A stage failed; the error went to the alert sink.
    Failed(TickError),
    /// The frame was classified and an alert was published.
    Completed(DetectionOutcome),
}

/// Running counters across ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopStats {
    pub ticks: u64,
    pub skipped: u64,
    pub failed: u64,
    pub detections: u64,
    /// Target label confidence from the most recent completed tick.
    pub last_confidence: Option<f32>,
    pub last_status: Option<String>,
}

impl LoopStats {
    pub fn completed(&self) -> u64 {
        self.ticks - self.skipped - self.failed
    }
}

pub(crate) fn lock_stats(stats: &Mutex<LoopStats>) -> std::sync::MutexGuard<'_, LoopStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The five stages of a tick, wired to their collaborators.
///
/// `sample → extract → classify → decide → dispatch` always run in that
/// order and a tick never overlaps another one on the same pipeline.
pub struct TickPipeline<V, C> {
    source: V,
    classifier: C,
    sampler: FrameSampler,
    dispatcher: AlertDispatcher,
    sink: Arc<dyn AlertSink>,
    target_label: String,
    threshold: f32,
    sound_enabled: Arc<AtomicBool>,
    stats: Arc<Mutex<LoopStats>>,
}

impl<V: VideoSource, C: Classifier> TickPipeline<V, C> {
    pub fn new(
        config: DetectorConfig,
        source: V,
        classifier: C,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            source,
            classifier,
            sampler: FrameSampler::new(),
            dispatcher: AlertDispatcher::silent(),
            sink,
            target_label: config.target_label,
            threshold: config.threshold,
            sound_enabled: Arc::new(AtomicBool::new(config.sound_enabled)),
            stats: Arc::new(Mutex::new(LoopStats::default())),
        })
    }

    /// Play warning cues on `output`. Without one, cues are requested but silent.
    pub fn with_audio(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.dispatcher = AlertDispatcher::new(output);
        self
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub(crate) fn sound_switch(&self) -> Arc<AtomicBool> {
        self.sound_enabled.clone()
    }

    pub(crate) fn stats_handle(&self) -> Arc<Mutex<LoopStats>> {
        self.stats.clone()
    }

    pub fn stats(&self) -> LoopStats {
        lock_stats(&self.stats).clone()
    }

    /// Run one tick to completion.
    pub async fn run_tick(&mut self) -> TickOutcome {
        let outcome = self.process().await;
        self.record(&outcome);
        outcome
    }

    async fn process(&mut self) -> TickOutcome {
        let frame = match self.sampler.sample(&self.source) {
            Ok(frame) => frame,
            Err(e) if e.is_retryable() => {
                debug!(error = %e, "skipping tick");
                return TickOutcome::Skipped;
            }
            Err(e) => return self.fail(e.into()),
        };

        debug!(
            width = frame.width(),
            height = frame.height(),
            captured_at = %frame.captured_at(),
            "frame sampled"
        );
        let features = extract(&frame);
        self.sampler.recycle(frame);

        let result = match self.classifier.classify(&features).await {
            Ok(result) => result,
            Err(e) => return self.fail(e.into()),
        };
        debug!(
            classes = result.len(),
            top = ?result.top(),
            "frame classified"
        );

        let outcome = decide(result, &self.target_label, self.threshold);
        let effect = self
            .dispatcher
            .dispatch(&outcome, self.sound_enabled.load(Ordering::Acquire));
        self.sink.publish(&effect);
        lock_stats(&self.stats).last_status = Some(effect.status);

        TickOutcome::Completed(outcome)
    }

    fn fail(&self, error: TickError) -> TickOutcome {
        warn!(error = %error, "tick failed");
        self.sink.report_error(&format!("Error processing frame: {error}"));
        TickOutcome::Failed(error)
    }

    fn record(&self, outcome: &TickOutcome) {
        let mut stats = lock_stats(&self.stats);
        stats.ticks += 1;
        match outcome {
            TickOutcome::Skipped => stats.skipped += 1,
            TickOutcome::Failed(_) => stats.failed += 1,
            TickOutcome::Completed(detection) => {
                if detection.is_detected() {
                    stats.detections += 1;
                }
                stats.last_confidence = Some(detection.confidence());
            }
        }
    }
}
