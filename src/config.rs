use crate::error::ConfigError;

pub const DEFAULT_TARGET_LABEL: &str = "Trash";
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Settings consumed by the detection loop at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Class name that triggers an alert.
    pub target_label: String,
    /// A score must be strictly above this to count as a detection.
    pub threshold: f32,
    /// Initial state of the audible warning.
    pub sound_enabled: bool,
}

impl DetectorConfig {
    pub fn new(target_label: impl Into<String>) -> Self {
        Self {
            target_label: target_label.into(),
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_sound(mut self, enabled: bool) -> Self {
        self.sound_enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        // Also rejects NaN.
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold));
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            target_label: DEFAULT_TARGET_LABEL.to_string(),
            threshold: DEFAULT_THRESHOLD,
            sound_enabled: true,
        }
    }
}
