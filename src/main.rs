use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use trashspot::detection::alert::TerminalBell;
use trashspot::detection::sources::{ImageSequenceSource, SyntheticSource};
use trashspot::{
    AlertEffect, AlertSink, AnyClassifier, DetectorConfig, DisplayClock, LoopController,
    MockClassifier, SampleError, TickPipeline, VideoSource,
};

#[derive(Parser)]
#[command(name = "trashspot")]
#[command(about = "Watch a video feed and raise an alert when trash is detected")]
struct Cli {
    /// Image files played in a loop as the video feed (synthetic noise if omitted)
    #[arg(value_name = "FRAME")]
    frames: Vec<PathBuf>,

    /// Class label that triggers an alert
    #[arg(long, default_value = trashspot::config::DEFAULT_TARGET_LABEL)]
    label: String,

    /// Confidence a detection must exceed
    #[arg(long, default_value_t = trashspot::config::DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Disable the warning sound
    #[arg(long)]
    no_sound: bool,

    /// RTen model file; uses the mock classifier when omitted
    #[arg(long, value_name = "FILE", requires = "labels")]
    model: Option<PathBuf>,

    /// Labels file for --model, one class per line
    #[arg(long, value_name = "FILE")]
    labels: Option<PathBuf>,

    /// Hit probability of the mock classifier
    #[arg(long, default_value_t = 0.3)]
    mock_rate: f64,

    /// Seed for the mock classifier and synthetic frames
    #[arg(long)]
    seed: Option<u64>,

    /// Frame rate the loop is paced at
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Frame size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size, default_value = "96x96")]
    size: (u32, u32),

    /// Polls before the synthetic feed produces a picture
    #[arg(long, default_value_t = 5)]
    warmup: u32,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long)]
    duration: Option<f64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if w == 0 || h == 0 {
        return Err("frame size must be non-zero".to_string());
    }
    Ok((w, h))
}

/// Rejects negative, NaN and infinite durations instead of panicking in `sleep`.
fn run_duration(secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow::anyhow!("Invalid --duration {}: {}", secs, e))
}

enum Feed {
    Images(ImageSequenceSource),
    Synthetic(SyntheticSource),
}

impl VideoSource for Feed {
    fn dimensions(&self) -> (u32, u32) {
        match self {
            Feed::Images(source) => source.dimensions(),
            Feed::Synthetic(source) => source.dimensions(),
        }
    }

    fn copy_frame(&self, buf: &mut [u8]) -> Result<(), SampleError> {
        match self {
            Feed::Images(source) => source.copy_frame(buf),
            Feed::Synthetic(source) => source.copy_frame(buf),
        }
    }
}

/// Prints status changes to stdout and errors to stderr.
#[derive(Default)]
struct ConsoleSink {
    last_status: Mutex<Option<String>>,
}

impl AlertSink for ConsoleSink {
    fn publish(&self, effect: &AlertEffect) {
        let mut last = match self.last_status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if last.as_deref() != Some(effect.status.as_str()) {
            println!("{}", effect.status);
            *last = Some(effect.status.clone());
        }
    }

    fn report_error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info,trashspot=debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let config = DetectorConfig::new(args.label.clone())
        .with_threshold(args.threshold)
        .with_sound(!args.no_sound);

    let run_for = args.duration.map(run_duration).transpose()?;

    let (width, height) = args.size;
    let feed = if args.frames.is_empty() {
        let mut source = SyntheticSource::new(width, height).with_warmup(args.warmup);
        if let Some(seed) = args.seed {
            source = source.with_seed(seed);
        }
        Feed::Synthetic(source)
    } else {
        let source = ImageSequenceSource::open(&args.frames, Some(args.size))?;
        if args.verbose {
            println!("Loaded {} frames at {}x{}", source.len(), width, height);
        }
        Feed::Images(source)
    };

    let mut mock = MockClassifier::new(args.label.clone()).with_hit_rate(args.mock_rate);
    if let Some(seed) = args.seed {
        mock = mock.with_seed(seed);
    }
    let model = match (&args.model, &args.labels) {
        (Some(model_path), Some(labels_path)) => {
            AnyClassifier::load_or_mock(model_path, labels_path, mock).with_input_size(width, height)
        }
        _ => AnyClassifier::Mock(mock),
    };
    if args.verbose && model.is_mock() {
        println!("Using mock classifier (hit rate {:.0}%)", args.mock_rate * 100.0);
    }

    let pipeline = TickPipeline::new(config, feed, model, Arc::new(ConsoleSink::default()))?
        .with_audio(Box::new(TerminalBell));
    let controller = LoopController::new(pipeline, DisplayClock::new(args.fps));

    let handle = controller.start();
    tracing::info!(run_id = %handle.run_id(), fps = args.fps, "scanning");

    match run_for {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }

    handle.stop();
    controller.wait_idle().await;

    let stats = controller.stats();
    println!("\n=== Detection Summary ===");
    println!("Ticks: {} ({} skipped, {} failed)", stats.ticks, stats.skipped, stats.failed);
    println!("Detections: {}", stats.detections);
    if let Some(confidence) = stats.last_confidence {
        println!("Last confidence: {:.1}%", confidence * 100.0);
    }
    if let Some(status) = &stats.last_status {
        println!("Last status: {}", status);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_accepts_finite_seconds() {
        assert_eq!(run_duration(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(run_duration(0.0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn duration_rejects_values_sleep_cannot_take() {
        for secs in [f64::INFINITY, f64::NAN, -1.0, 1e30] {
            let err = run_duration(secs).unwrap_err();
            assert!(err.to_string().contains("Invalid --duration"), "{err}");
        }
    }

    #[test]
    fn size_parses_width_by_height() {
        assert_eq!(parse_size("4x2"), Ok((4, 2)));
        assert!(parse_size("0x2").is_err());
        assert!(parse_size("96").is_err());
    }
}
