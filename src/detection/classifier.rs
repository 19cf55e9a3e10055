use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use tracing::{debug, info, warn};

use crate::error::ClassifyError;
use crate::models::{CHANNELS, ClassificationResult, FeatureVector};

/// Inference capability consumed by the detection loop.
///
/// Implementations receive features in the row-major, channel-interleaved
/// RGB layout produced by [`crate::detection::features::extract`].
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        features: &FeatureVector,
    ) -> impl Future<Output = Result<ClassificationResult, ClassifyError>> + Send;
}

impl<C: Classifier> Classifier for Arc<C> {
    fn classify(
        &self,
        features: &FeatureVector,
    ) -> impl Future<Output = Result<ClassificationResult, ClassifyError>> + Send {
        (**self).classify(features)
    }
}

/// Stand-in model that randomly reports the target label.
///
/// With probability `hit_rate` the label scores `hit_score`, otherwise
/// `miss_score`. Useful for exercising the loop without a trained model.
pub struct MockClassifier {
    label: String,
    hit_rate: f64,
    hit_score: f32,
    miss_score: f32,
    rng: Mutex<StdRng>,
}

impl MockClassifier {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            hit_rate: 0.3,
            hit_score: 0.8,
            miss_score: 0.2,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Probability of reporting a hit, clamped to `[0, 1]`.
    pub fn with_hit_rate(mut self, hit_rate: f64) -> Self {
        self.hit_rate = if hit_rate.is_nan() { 0.0 } else { hit_rate.clamp(0.0, 1.0) };
        self
    }

    pub fn with_scores(mut self, hit_score: f32, miss_score: f32) -> Self {
        self.hit_score = hit_score;
        self.miss_score = miss_score;
        self
    }

    fn roll(&self) -> Result<bool, ClassifyError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ClassifyError::Unavailable("mock rng poisoned".into()))?;
        Ok(rng.gen_bool(self.hit_rate))
    }
}

impl Classifier for MockClassifier {
    async fn classify(&self, _features: &FeatureVector) -> Result<ClassificationResult, ClassifyError> {
        let score = if self.roll()? { self.hit_score } else { self.miss_score };
        Ok(ClassificationResult::new().with_score(self.label.clone(), score))
    }
}

/// Classifier backed by an RTen model.
///
/// The model takes a `[1, height, width, 3]` f32 tensor and returns one score
/// per class; class names come from a labels file with one label per line.
pub struct RtenClassifier {
    model: Arc<Model>,
    labels: Arc<Vec<String>>,
    input_size: Option<(u32, u32)>,
}

impl RtenClassifier {
    pub fn load(model_path: &Path, labels_path: &Path) -> anyhow::Result<Self> {
        if !model_path.exists() {
            return Err(ClassifyError::ModelNotFound(model_path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(labels_path).map_err(|e| {
            anyhow::anyhow!("Failed to read labels {}: {}", labels_path.display(), e)
        })?;
        let labels = read_labels(&contents);
        if labels.is_empty() {
            anyhow::bail!("labels file {} contains no labels", labels_path.display());
        }

        let model = Model::load_file(model_path)?;

        info!(
            model = %model_path.display(),
            classes = labels.len(),
            "loaded classification model"
        );

        Ok(Self {
            model: Arc::new(model),
            labels: Arc::new(labels),
            input_size: None,
        })
    }

    /// Reject frames whose size differs from what the model was trained on.
    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_size = Some((width, height));
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Classifier for RtenClassifier {
    async fn classify(&self, features: &FeatureVector) -> Result<ClassificationResult, ClassifyError> {
        let (width, height) = (features.width(), features.height());
        if let Some((expected_width, expected_height)) = self.input_size {
            if (width, height) != (expected_width, expected_height) {
                return Err(ClassifyError::ShapeMismatch {
                    width,
                    height,
                    expected_width,
                    expected_height,
                });
            }
        }

        let model = self.model.clone();
        let labels = self.labels.clone();
        let data = features.as_slice().to_vec();

        tokio::task::spawn_blocking(move || {
            let input = NdTensor::from_data([1, height as usize, width as usize, CHANNELS], data);
            let value = model
                .run_one(input.view().into(), None)
                .map_err(|e| ClassifyError::Inference(e.to_string()))?;
            let output = NdTensor::<f32, 2>::try_from(value)
                .map_err(|e| ClassifyError::Inference(format!("unexpected model output: {e:?}")))?;

            let scores: Vec<f32> = output.iter().copied().collect();
            debug!(outputs = scores.len(), "model produced scores");
            scores_to_result(&labels, &scores)
        })
        .await
        .map_err(|e| ClassifyError::Unavailable(e.to_string()))?
    }
}

/// Classifier picked once at startup: a loaded model, or the mock when
/// no model is configured or it fails to load.
pub enum AnyClassifier {
    Mock(MockClassifier),
    Rten(RtenClassifier),
}

impl AnyClassifier {
    /// Load the model, falling back to `mock` if loading fails.
    pub fn load_or_mock(model_path: &Path, labels_path: &Path, mock: MockClassifier) -> Self {
        match RtenClassifier::load(model_path, labels_path) {
            Ok(model) => AnyClassifier::Rten(model),
            Err(e) => {
                warn!(error = %e, "model load failed, using mock classifier");
                AnyClassifier::Mock(mock)
            }
        }
    }

    /// Applies to a loaded model only; the mock accepts any frame size.
    pub fn with_input_size(self, width: u32, height: u32) -> Self {
        match self {
            AnyClassifier::Rten(model) => AnyClassifier::Rten(model.with_input_size(width, height)),
            mock => mock,
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, AnyClassifier::Mock(_))
    }
}

impl Classifier for AnyClassifier {
    async fn classify(&self, features: &FeatureVector) -> Result<ClassificationResult, ClassifyError> {
        match self {
            AnyClassifier::Mock(model) => model.classify(features).await,
            AnyClassifier::Rten(model) => model.classify(features).await,
        }
    }
}

/// One label per line; blank lines and surrounding whitespace are ignored.
pub fn read_labels(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pair model output scores with their labels.
pub fn scores_to_result(labels: &[String], scores: &[f32]) -> Result<ClassificationResult, ClassifyError> {
    if labels.len() != scores.len() {
        return Err(ClassifyError::LabelMismatch {
            outputs: scores.len(),
            labels: labels.len(),
        });
    }
    Ok(labels
        .iter()
        .zip(scores)
        .map(|(label, score)| (label.clone(), *score))
        .collect())
}
