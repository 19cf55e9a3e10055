use std::io::Write;
use std::time::Duration;

use tracing::warn;

use crate::error::AudioPlaybackError;
use crate::models::DetectionOutcome;

pub const CLEAR_STATUS: &str = "No detection - area clear";

/// Short warning tone: a pitch step down and back up with a fast decay.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioCue {
    /// `(frequency_hz, starts_at)` steps, in order.
    pub steps: Vec<(f32, Duration)>,
    pub duration: Duration,
    pub start_gain: f32,
    pub end_gain: f32,
}

impl AudioCue {
    /// 800 Hz, 600 Hz at 0.1 s, back to 800 Hz at 0.2 s; 0.3 s total,
    /// gain ramping exponentially from 0.3 to 0.01.
    pub fn warning() -> Self {
        Self {
            steps: vec![
                (800.0, Duration::ZERO),
                (600.0, Duration::from_millis(100)),
                (800.0, Duration::from_millis(200)),
            ],
            duration: Duration::from_millis(300),
            start_gain: 0.3,
            end_gain: 0.01,
        }
    }

    fn frequency_at(&self, t: f32) -> f32 {
        self.steps
            .iter()
            .take_while(|(_, at)| at.as_secs_f32() <= t)
            .last()
            .map(|(f, _)| *f)
            .unwrap_or(0.0)
    }

    fn gain_at(&self, t: f32) -> f32 {
        let total = self.duration.as_secs_f32();
        if total <= 0.0 {
            return 0.0;
        }
        let progress = (t / total).clamp(0.0, 1.0);
        self.start_gain * (self.end_gain / self.start_gain).powf(progress)
    }

    /// Synthesize mono PCM samples in `[-1.0, 1.0]`.
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let count = (self.duration.as_secs_f32() * sample_rate as f32).round() as usize;
        let dt = 1.0 / sample_rate as f32;
        let mut phase = 0.0f32;
        let mut samples = Vec::with_capacity(count);
        for i in 0..count {
            let t = i as f32 * dt;
            phase += std::f32::consts::TAU * self.frequency_at(t) * dt;
            phase %= std::f32::consts::TAU;
            samples.push(self.gain_at(t) * phase.sin());
        }
        samples
    }
}

/// Device that plays audio cues. Must return without waiting for playback.
pub trait AudioOutput: Send + Sync {
    fn play(&self, cue: &AudioCue) -> Result<(), AudioPlaybackError>;
}

/// Plays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn play(&self, _cue: &AudioCue) -> Result<(), AudioPlaybackError> {
        Ok(())
    }
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AudioOutput for TerminalBell {
    fn play(&self, _cue: &AudioCue) -> Result<(), AudioPlaybackError> {
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| AudioPlaybackError(e.to_string()))
    }
}

/// Everything a tick wants shown or played.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEffect {
    pub status: String,
    pub detected: bool,
    /// Target label confidence in this tick, for a confidence readout.
    pub confidence: f32,
    /// Present when a warning sound was requested.
    pub cue: Option<AudioCue>,
}

/// Presentation side of the loop: shows status text and error messages.
pub trait AlertSink: Send + Sync {
    fn publish(&self, effect: &AlertEffect);

    /// Advisory error text, e.g. a failed classification.
    fn report_error(&self, message: &str);
}

/// Turns detection outcomes into status text and audio requests.
pub struct AlertDispatcher {
    output: Box<dyn AudioOutput>,
}

impl AlertDispatcher {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self { output }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(SilentOutput))
    }

    /// Build the alert for `outcome`, starting the warning sound if one is due.
    /// Playback failures are logged and dropped.
    pub fn dispatch(&self, outcome: &DetectionOutcome, sound_enabled: bool) -> AlertEffect {
        match outcome {
            DetectionOutcome::Detected { label, confidence } => {
                let cue = sound_enabled.then(AudioCue::warning);
                if let Some(cue) = &cue {
                    if let Err(e) = self.output.play(cue) {
                        warn!(error = %e, "warning sound failed");
                    }
                }
                AlertEffect {
                    status: detected_status(label, *confidence),
                    detected: true,
                    confidence: *confidence,
                    cue,
                }
            }
            DetectionOutcome::Clear { best_confidence } => AlertEffect {
                status: CLEAR_STATUS.to_string(),
                detected: false,
                confidence: *best_confidence,
                cue: None,
            },
        }
    }
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::silent()
    }
}

pub fn detected_status(label: &str, confidence: f32) -> String {
    format!(
        "{} DETECTED! ({:.1}% confidence)",
        label.to_uppercase(),
        confidence * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl AudioOutput for Counting {
        fn play(&self, _cue: &AudioCue) -> Result<(), AudioPlaybackError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    impl AudioOutput for Broken {
        fn play(&self, _cue: &AudioCue) -> Result<(), AudioPlaybackError> {
            Err(AudioPlaybackError("no device".into()))
        }
    }

    fn detected(confidence: f32) -> DetectionOutcome {
        DetectionOutcome::Detected {
            label: "Trash".into(),
            confidence,
        }
    }

    #[test]
    fn detection_status_has_one_decimal_percentage() {
        let effect = AlertDispatcher::silent().dispatch(&detected(0.61), false);
        assert!(effect.status.contains("61.0%"), "{}", effect.status);
        assert!(effect.status.contains("TRASH"));
        assert!(effect.detected);
        assert!(effect.cue.is_none());
    }

    #[test]
    fn clear_uses_fixed_message() {
        let effect = AlertDispatcher::silent().dispatch(&DetectionOutcome::Clear { best_confidence: 0.2 }, true);
        assert_eq!(effect.status, CLEAR_STATUS);
        assert!(effect.cue.is_none());
        assert_eq!(effect.confidence, 0.2);
    }

    #[test]
    fn sound_plays_only_when_enabled() {
        let plays = Arc::new(AtomicUsize::new(0));
        let dispatcher = AlertDispatcher::new(Box::new(Counting(plays.clone())));

        dispatcher.dispatch(&detected(0.9), false);
        assert_eq!(plays.load(Ordering::SeqCst), 0);

        let effect = dispatcher.dispatch(&detected(0.9), true);
        assert_eq!(plays.load(Ordering::SeqCst), 1);
        assert_eq!(effect.cue, Some(AudioCue::warning()));
    }

    #[test]
    fn playback_failure_is_swallowed() {
        let effect = AlertDispatcher::new(Box::new(Broken)).dispatch(&detected(0.7), true);
        assert!(effect.detected);
        assert!(effect.cue.is_some());
    }

    #[test]
    fn warning_cue_is_short_and_audible() {
        let cue = AudioCue::warning();
        assert!(cue.duration < Duration::from_millis(500));

        let samples = cue.render(8_000);
        assert_eq!(samples.len(), 2_400);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.1 && peak <= 0.3 + f32::EPSILON);
        // Decays towards the end.
        let tail = samples[2_300..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(tail < 0.02);
    }

    #[test]
    fn cue_drops_pitch_then_returns() {
        let cue = AudioCue::warning();
        assert_eq!(cue.frequency_at(0.05), 800.0);
        assert_eq!(cue.frequency_at(0.15), 600.0);
        assert_eq!(cue.frequency_at(0.25), 800.0);
    }
}
