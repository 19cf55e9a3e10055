//! Run/stop state machine driving the tick pipeline.
//!
//! A run is a single task that waits for the host's next frame, then runs
//! one tick, and repeats while the run is still current. `stop()` flips the
//! state synchronously; the task re-checks it under the same lock right
//! before each tick, so at most the tick already in flight finishes after
//! `stop()` returns.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::detection::classifier::Classifier;
use crate::detection::sampler::VideoSource;
use crate::pipeline::{LoopStats, TickPipeline, lock_stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Host primitive that resolves when the next frame can be presented.
pub trait FrameClock: Send + 'static {
    fn next_frame(&mut self) -> impl Future<Output = ()> + Send;
}

/// Frame clock paced at a display refresh rate.
///
/// Late frames are dropped rather than bunched up, so a slow tick never
/// causes a burst of catch-up ticks.
pub struct DisplayClock {
    interval: Interval,
}

impl DisplayClock {
    /// Must be created inside a Tokio runtime.
    pub fn new(fps: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

impl FrameClock for DisplayClock {
    async fn next_frame(&mut self) {
        self.interval.tick().await;
    }
}

/// Frame clock that only yields to the scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldClock;

impl FrameClock for YieldClock {
    async fn next_frame(&mut self) {
        tokio::task::yield_now().await;
    }
}

#[derive(Debug)]
struct Control {
    state: LoopState,
    run_id: Option<Uuid>,
}

fn lock_control(control: &Mutex<Control>) -> MutexGuard<'_, Control> {
    control.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the start of a tick if `run_id` is still the current run.
fn begin_tick(control: &Mutex<Control>, run_id: Uuid) -> bool {
    let control = lock_control(control);
    control.state == LoopState::Running && control.run_id == Some(run_id)
}

/// Token for stopping the run that [`LoopController::start`] returned it for.
///
/// Dropping it leaves the loop running.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    run_id: Uuid,
    control: Arc<Mutex<Control>>,
}

impl LoopHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Whether the run this handle was issued for is still going.
    pub fn is_running(&self) -> bool {
        let control = lock_control(&self.control);
        control.state == LoopState::Running && control.run_id == Some(self.run_id)
    }

    /// Stop this handle's run. A handle from an earlier run does nothing.
    pub fn stop(&self) {
        let mut control = lock_control(&self.control);
        if control.run_id == Some(self.run_id) {
            control.state = LoopState::Idle;
            control.run_id = None;
            info!(run_id = %self.run_id, "detection loop stop requested");
        }
    }
}

/// Owns the loop lifecycle for one detection pipeline.
pub struct LoopController<V, C, K> {
    control: Arc<Mutex<Control>>,
    pipeline: Arc<tokio::sync::Mutex<TickPipeline<V, C>>>,
    clock: Arc<tokio::sync::Mutex<K>>,
    sound_enabled: Arc<AtomicBool>,
    stats: Arc<Mutex<LoopStats>>,
}

impl<V, C, K> LoopController<V, C, K>
where
    V: VideoSource + 'static,
    C: Classifier + 'static,
    K: FrameClock,
{
    pub fn new(pipeline: TickPipeline<V, C>, clock: K) -> Self {
        Self {
            control: Arc::new(Mutex::new(Control {
                state: LoopState::Idle,
                run_id: None,
            })),
            sound_enabled: pipeline.sound_switch(),
            stats: pipeline.stats_handle(),
            pipeline: Arc::new(tokio::sync::Mutex::new(pipeline)),
            clock: Arc::new(tokio::sync::Mutex::new(clock)),
        }
    }

    pub fn state(&self) -> LoopState {
        lock_control(&self.control).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Begin scheduling ticks. While already running this changes nothing
    /// and returns a handle to the current run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> LoopHandle {
        let mut control = lock_control(&self.control);
        if let (LoopState::Running, Some(run_id)) = (control.state, control.run_id) {
            debug!(%run_id, "start ignored, loop already running");
            return self.handle(run_id);
        }

        let run_id = Uuid::new_v4();
        control.state = LoopState::Running;
        control.run_id = Some(run_id);
        drop(control);

        let task = run_loop(
            run_id,
            self.control.clone(),
            self.pipeline.clone(),
            self.clock.clone(),
        );
        tokio::spawn(task.instrument(info_span!("detection_loop", %run_id)));

        self.handle(run_id)
    }

    /// Stop scheduling ticks. No tick begins after this returns; one already
    /// running is left to finish.
    pub fn stop(&self) {
        let mut control = lock_control(&self.control);
        if let Some(run_id) = control.run_id.take() {
            info!(%run_id, "detection loop stop requested");
        }
        control.state = LoopState::Idle;
    }

    /// Resolves once no tick is in flight.
    ///
    /// After [`stop`](Self::stop) this waits out the grace tick, if any.
    pub async fn wait_idle(&self) {
        let _pipeline = self.pipeline.lock().await;
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.sound_enabled.store(enabled, Ordering::Release);
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> LoopStats {
        lock_stats(&self.stats).clone()
    }

    fn handle(&self, run_id: Uuid) -> LoopHandle {
        LoopHandle {
            run_id,
            control: self.control.clone(),
        }
    }
}

impl<V, C, K> Drop for LoopController<V, C, K> {
    fn drop(&mut self) {
        let mut control = lock_control(&self.control);
        control.state = LoopState::Idle;
        control.run_id = None;
    }
}

async fn run_loop<V, C, K>(
    run_id: Uuid,
    control: Arc<Mutex<Control>>,
    pipeline: Arc<tokio::sync::Mutex<TickPipeline<V, C>>>,
    clock: Arc<tokio::sync::Mutex<K>>,
) where
    V: VideoSource,
    C: Classifier,
    K: FrameClock,
{
    info!("detection loop started");
    loop {
        clock.lock().await.next_frame().await;

        // Held for the whole tick, so ticks from an old and a new run can
        // never overlap.
        let mut pipeline = pipeline.lock().await;
        if !begin_tick(&control, run_id) {
            break;
        }
        let outcome = pipeline.run_tick().await;
        debug!(?outcome, "tick finished");
    }
    info!("detection loop stopped");
}
