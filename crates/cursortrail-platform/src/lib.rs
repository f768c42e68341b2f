//! Platform abstraction traits so `cursortrail-core` stays OS-agnostic.

use std::thread;
use std::time::{Duration, Instant};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub const DEFAULT_TARGET_FPS: u32 = 60;

/// Screen-space rectangle covered by an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }
}

/// Source of the global cursor position, polled once per frame.
pub trait CursorSampler {
    /// `None` when the position is unavailable this frame.
    fn sample(&mut self) -> Option<Vec2>;
}

/// A front end that owns a trail and puts it on screen.
pub trait FrameDriver {
    fn initialize(&mut self) -> Result<()>;
    /// Advance one frame. Returns `false` once the driver wants to stop.
    fn update(&mut self) -> Result<bool>;
    fn render(&mut self) -> Result<()>;
    fn cleanup(&mut self) -> Result<()>;
}

/// Sleeps away whatever is left of each frame's time slice.
#[derive(Debug)]
pub struct FramePacer {
    frame_duration: Duration,
    frame_started: Instant,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        Self {
            frame_duration: Duration::from_secs(1) / target_fps.max(1),
            frame_started: Instant::now(),
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Time left in the current frame.
    pub fn remaining(&self) -> Duration {
        self.frame_duration.saturating_sub(self.frame_started.elapsed())
    }

    pub fn wait(&mut self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
        self.frame_started = Instant::now();
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_FPS)
    }
}

/// Drive `driver` until it asks to stop. Cleanup always runs once
/// initialization succeeded; a frame error is reported after cleanup.
pub fn run_frames<D: FrameDriver>(driver: &mut D, pacer: &mut FramePacer) -> Result<()> {
    driver.initialize()?;
    info!("frame driver initialized");

    let mut frames: u64 = 0;
    let outcome = loop {
        match driver.update() {
            Ok(true) => {}
            Ok(false) => break Ok(()),
            Err(err) => break Err(err),
        }
        if let Err(err) = driver.render() {
            break Err(err);
        }
        frames += 1;
        pacer.wait();
    };

    if let Err(err) = &outcome {
        warn!("frame loop stopped after {frames} frames: {err}");
    } else {
        debug!("frame loop finished after {frames} frames");
    }
    match driver.cleanup() {
        Ok(()) => info!("frame driver cleaned up"),
        // The frame error, if any, is the one worth returning.
        Err(err) if outcome.is_err() => error!("cleanup failed after frame error: {err}"),
        Err(err) => return Err(err),
    }
    outcome
}
