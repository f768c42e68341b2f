//! CursorTrail core engine: platform-agnostic trail buffer, config, and
//! software compositing.

use glam::Vec2;
use tracing::{debug, warn};

pub mod canvas;
pub mod config;
pub mod error;
pub mod sprite;
pub mod trail;

pub use canvas::Canvas;
pub use config::TrailConfig;
pub use error::{ConfigError, ConfigWarning, TextureError, TrailError};
pub use sprite::Sprite;
pub use trail::{LiveParticle, TrailBuffer, TrailParticle};

/// Per-frame trail state owned by a frame driver.
pub struct TrailEngine {
    config: TrailConfig,
    buffer: TrailBuffer,
}

impl TrailEngine {
    pub fn new(mut config: TrailConfig) -> Result<Self, TrailError> {
        for warning in config.validate() {
            warn!("{warning}");
        }
        let buffer = TrailBuffer::from_config(&config)?;
        debug!(
            capacity = buffer.capacity(),
            fade_time = buffer.fade_time(),
            interval = buffer.interpolation_interval(),
            "trail buffer allocated"
        );
        Ok(Self { config, buffer })
    }

    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    pub fn buffer(&self) -> &TrailBuffer {
        &self.buffer
    }

    /// Record this frame's cursor position, then decay the whole trail.
    pub fn step(&mut self, cursor: Vec2) {
        self.buffer.add_sample(cursor);
        self.fade();
    }

    /// Decay without a new sample, for frames where the cursor could not be
    /// read.
    pub fn fade(&mut self) {
        self.buffer.age(self.config.fade_rate);
    }

    pub fn live_particles(&self) -> impl Iterator<Item = LiveParticle> + '_ {
        self.buffer.live_particles()
    }

    /// Redraw the canvas from scratch with every live particle.
    pub fn paint(&self, canvas: &mut Canvas, sprite: &Sprite) {
        canvas.clear();
        for particle in self.buffer.live_particles() {
            canvas.draw_sprite(sprite, particle.position, self.config.sprite_size, particle.alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_validates_config() {
        let engine = TrailEngine::new(TrailConfig {
            max_particles: 0,
            fade_rate: 2.0,
            ..TrailConfig::default()
        })
        .unwrap();
        assert_eq!(engine.buffer().capacity(), config::DEFAULT_MAX_PARTICLES as usize);
        assert_eq!(engine.config().fade_rate, config::DEFAULT_FADE_RATE);
    }

    #[test]
    fn test_step_samples_then_ages() {
        let mut engine = TrailEngine::new(TrailConfig {
            fade_rate: 0.25,
            max_particles: 16,
            ..TrailConfig::default()
        })
        .unwrap();
        engine.step(Vec2::new(3.0, 4.0));
        let live: Vec<_> = engine.live_particles().collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].position, Vec2::new(3.0, 4.0));
        assert_eq!(live[0].alpha, 0.75);

        for _ in 0..3 {
            engine.step(Vec2::new(3.0, 4.0));
        }
        // The first sample has now been aged four times.
        assert_eq!(engine.buffer().particles()[0].remaining_life, 0.0);
    }

    #[test]
    fn test_fade_without_sample() {
        let mut engine = TrailEngine::new(TrailConfig {
            fade_rate: 0.5,
            max_particles: 4,
            ..TrailConfig::default()
        })
        .unwrap();
        engine.step(Vec2::new(1.0, 1.0));
        let write_index = engine.buffer().write_index();
        engine.fade();
        assert_eq!(engine.buffer().write_index(), write_index);
        assert_eq!(engine.live_particles().count(), 0);
    }

    #[test]
    fn test_paint_draws_live_particles_only() {
        let mut engine = TrailEngine::new(TrailConfig {
            sprite_size: 2.0,
            fade_rate: 0.5,
            max_particles: 8,
            ..TrailConfig::default()
        })
        .unwrap();
        let sprite = Sprite::from_rgba(1, 1, &[[255, 255, 255, 255]]).unwrap();
        let mut canvas = Canvas::new(8, 8);

        engine.step(Vec2::new(4.0, 4.0));
        engine.paint(&mut canvas, &sprite);
        assert_eq!(canvas.pixel(3, 3), Some(0x8080_8080));
        assert_eq!(canvas.pixel(7, 7), Some(0));

        // The first particle dies and its replacement sits on the same
        // pixels; the canvas is cleared, so nothing accumulates.
        engine.step(Vec2::new(4.0, 4.0));
        assert_eq!(engine.live_particles().count(), 1);
        engine.paint(&mut canvas, &sprite);
        assert_eq!(canvas.pixel(3, 3), Some(0x8080_8080));
        assert_eq!(canvas.pixels().iter().filter(|&&p| p != 0).count(), 4);
    }
}
