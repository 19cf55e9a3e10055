#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use trashspot::{
    AlertEffect, AlertSink, AudioCue, AudioOutput, AudioPlaybackError, ClassificationResult,
    ClassifyError, Classifier, FeatureVector, SampleError, VideoSource,
};

/// Video source with adjustable dimensions that fills every frame with one byte.
pub struct TestSource {
    dims: Mutex<(u32, u32)>,
    fill: u8,
    failure: Mutex<Option<String>>,
}

impl TestSource {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            dims: Mutex::new((width, height)),
            fill: 128,
            failure: Mutex::new(None),
        })
    }

    pub fn set_dimensions(&self, width: u32, height: u32) {
        *self.dims.lock().unwrap() = (width, height);
    }

    /// Make every later `copy_frame` fail with `SampleError::Source(message)`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

impl VideoSource for TestSource {
    fn dimensions(&self) -> (u32, u32) {
        *self.dims.lock().unwrap()
    }

    fn copy_frame(&self, buf: &mut [u8]) -> Result<(), SampleError> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(SampleError::Source(message));
        }
        buf.fill(self.fill);
        Ok(())
    }
}

/// Classifier that replays queued responses, then repeats a fallback.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<ClassificationResult, ClassifyError>>>,
    fallback: ClassificationResult,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    feature_lengths: Mutex<Vec<usize>>,
}

impl ScriptedClassifier {
    pub fn new(fallback: ClassificationResult) -> Arc<Self> {
        Self::with_script(Vec::new(), fallback)
    }

    pub fn with_script(
        script: Vec<Result<ClassificationResult, ClassifyError>>,
        fallback: ClassificationResult,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            feature_lengths: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn feature_lengths(&self) -> Vec<usize> {
        self.feature_lengths.lock().unwrap().clone()
    }
}

impl Classifier for ScriptedClassifier {
    async fn classify(&self, features: &FeatureVector) -> Result<ClassificationResult, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.feature_lengths.lock().unwrap().push(features.len());

        tokio::task::yield_now().await;

        let next = self.script.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Classifier that blocks inside `classify` until the test releases it.
pub struct GatedClassifier {
    result: ClassificationResult,
    entered: Notify,
    release: Semaphore,
    calls: AtomicUsize,
}

impl GatedClassifier {
    pub fn new(result: ClassificationResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            entered: Notify::new(),
            release: Semaphore::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    /// Wait until a tick is blocked inside the classifier.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let one blocked classification finish.
    pub fn release_one(&self) {
        self.release.add_permits(1);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for GatedClassifier {
    async fn classify(&self, _features: &FeatureVector) -> Result<ClassificationResult, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release
            .acquire()
            .await
            .map_err(|e| ClassifyError::Unavailable(e.to_string()))?
            .forget();
        Ok(self.result.clone())
    }
}

/// Sink that keeps everything it was given.
#[derive(Default)]
pub struct RecordingSink {
    effects: Mutex<Vec<AlertEffect>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn effects(&self) -> Vec<AlertEffect> {
        self.effects.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingSink {
    fn publish(&self, effect: &AlertEffect) {
        self.effects.lock().unwrap().push(effect.clone());
    }

    fn report_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Audio output that counts play requests.
#[derive(Clone, Default)]
pub struct CountingAudio {
    plays: Arc<AtomicUsize>,
}

impl CountingAudio {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl AudioOutput for CountingAudio {
    fn play(&self, _cue: &AudioCue) -> Result<(), AudioPlaybackError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn trash(score: f32) -> ClassificationResult {
    ClassificationResult::new().with_score("Trash", score)
}

/// Poll `condition` until it holds, yielding to the loop task in between.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

/// Give the loop task plenty of chances to run.
pub async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}
