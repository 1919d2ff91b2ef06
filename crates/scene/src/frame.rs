use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

use crate::scene::Scene;

/// Frame pacing configuration.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Target frames per second; clamped to at least 1.
    pub target_fps: u32,
    /// Stop after this many frames. `None` runs until stopped.
    pub max_frames: Option<u64>,
    /// Number of recent frame times kept for statistics.
    pub timer_window: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_frames: None,
            timer_window: 120,
        }
    }
}

impl FrameConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.target_fps.max(1)))
    }
}

/// Ring buffer of recent frame durations.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    history: Vec<Duration>,
    next: usize,
    len: usize,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![Duration::ZERO; capacity.max(1)],
            next: 0,
            len: 0,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.next] = dt;
        self.next = (self.next + 1) % self.history.len();
        self.len = (self.len + 1).min(self.history.len());
    }

    fn recorded(&self) -> &[Duration] {
        &self.history[..self.len]
    }

    pub fn average(&self) -> Duration {
        if self.len == 0 {
            return Duration::ZERO;
        }
        self.recorded().iter().sum::<Duration>() / self.len as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or_default()
    }

    pub fn min(&self) -> Duration {
        self.recorded().iter().copied().min().unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.len
    }
}

/// Summary returned by [`FrameLoop::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub frames: u64,
    /// Total simulated time handed to `Scene::update`, in seconds.
    pub elapsed: f32,
    pub avg_update: Duration,
    pub max_update: Duration,
}

/// Drives [`Scene::update`] from a tokio interval, one frame at a time.
pub struct FrameLoop {
    config: FrameConfig,
    timer: FrameTimer,
    stop: Rc<Cell<bool>>,
}

impl FrameLoop {
    pub fn new(config: FrameConfig) -> Self {
        let timer = FrameTimer::new(config.timer_window);
        Self {
            config,
            timer,
            stop: Rc::new(Cell::new(false)),
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    /// Flag that ends [`run`](Self::run) before its next frame once set.
    pub fn stop_handle(&self) -> Rc<Cell<bool>> {
        self.stop.clone()
    }

    /// Run frames until `max_frames` is reached or the stop flag is set.
    ///
    /// Each frame's `dt` is the wall time since the previous tick, so a slow
    /// frame is followed by a larger step rather than a burst of catch-up
    /// frames.
    pub async fn run(&mut self, scene: &mut Scene) -> FrameStats {
        let period = self.config.frame_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.stop.set(false);

        let mut frames = 0u64;
        let mut elapsed = 0.0f32;
        let mut last = ticker.tick().await;
        scene.start();
        tracing::info!(
            fps = self.config.target_fps,
            max_frames = ?self.config.max_frames,
            "frame loop started"
        );

        while !self.stop.get() && self.config.max_frames.is_none_or(|max| frames < max) {
            let now = ticker.tick().await;
            let dt = now.duration_since(last).as_secs_f32();
            last = now;

            let started = Instant::now();
            scene.update(dt);
            self.timer.record(started.elapsed());
            frames += 1;
            elapsed += dt;
            tracing::trace!(frame = frames, dt, "frame");
        }

        let stats = FrameStats {
            frames,
            elapsed,
            avg_update: self.timer.average(),
            max_update: self.timer.max(),
        };
        tracing::info!(frames, elapsed, "frame loop finished");
        stats
    }
}
