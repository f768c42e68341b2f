//! Fixed-capacity ring buffer of fading trail particles.
//!
//! The buffer never grows or shrinks after construction. A slot whose
//! `remaining_life` has decayed to zero is simply invisible until the write
//! cursor comes back around and overwrites it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::{TrailConfig, DEFAULT_SPAWN_FREQUENCY};
use crate::error::TrailError;

/// A single fading dot at a past cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrailParticle {
    pub position: Vec2,
    pub remaining_life: f32,
}

impl TrailParticle {
    pub fn new(position: Vec2, remaining_life: f32) -> Self {
        Self {
            position,
            remaining_life,
        }
    }

    pub fn is_live(&self) -> bool {
        self.remaining_life > 0.0
    }
}

/// What a renderer needs to draw one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveParticle {
    pub position: Vec2,
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
}

/// Circular store of trail particles with interpolated insertion and linear
/// per-frame decay.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    storage: Vec<TrailParticle>,
    write_index: usize,
    fade_time: f32,
    interpolation_interval: f32,
}

impl TrailBuffer {
    /// Allocate `capacity` zeroed slots. New particles start with `fade_time`
    /// of life.
    pub fn new(capacity: usize, fade_time: f32) -> Result<Self, TrailError> {
        if capacity == 0 {
            return Err(TrailError::ZeroCapacity);
        }
        if !(fade_time.is_finite() && fade_time > 0.0) {
            return Err(TrailError::InvalidFadeTime(fade_time));
        }
        Ok(Self {
            storage: vec![TrailParticle::default(); capacity],
            write_index: 0,
            fade_time,
            interpolation_interval: DEFAULT_SPAWN_FREQUENCY,
        })
    }

    /// Set the maximum screen-space gap between particles along a motion
    /// segment.
    pub fn with_interpolation_interval(mut self, interval: f32) -> Result<Self, TrailError> {
        if !(interval.is_finite() && interval > 0.0) {
            return Err(TrailError::InvalidInterval(interval));
        }
        self.interpolation_interval = interval;
        Ok(self)
    }

    pub fn from_config(config: &TrailConfig) -> Result<Self, TrailError> {
        Self::new(config.max_particles as usize, config.fade_time)?
            .with_interpolation_interval(config.spawn_frequency)
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Slot that the next insert overwrites.
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn fade_time(&self) -> f32 {
        self.fade_time
    }

    pub fn interpolation_interval(&self) -> f32 {
        self.interpolation_interval
    }

    /// Raw slots in storage order, live or not.
    pub fn particles(&self) -> &[TrailParticle] {
        &self.storage
    }

    pub fn live_count(&self) -> usize {
        self.storage.iter().filter(|p| p.is_live()).count()
    }

    /// Reset every slot to the zero sentinel and rewind the write cursor.
    pub fn clear(&mut self) {
        self.storage.fill(TrailParticle::default());
        self.write_index = 0;
    }

    /// Record a cursor sample and fill the gap from the previously written
    /// particle with evenly spaced interpolated particles.
    ///
    /// The very first sample interpolates against the zero sentinel at the
    /// origin, so a cold start away from `(0, 0)` draws a streak from the
    /// origin.
    pub fn add_sample(&mut self, position: Vec2) {
        let previous = self.storage[self.previous_index()].position;
        self.insert(position);

        // f64 keeps the length finite for any pair of finite f32 points.
        let origin = previous.as_dvec2();
        let delta = position.as_dvec2() - origin;
        let distance = delta.length();
        if !(distance.is_finite() && distance > 0.0) {
            return;
        }
        let direction = delta / distance;
        let interval = f64::from(self.interpolation_interval);

        let steps = self.interpolation_steps(distance);
        // Inserts beyond one full lap would be overwritten by later inserts of
        // this same call, so only the last `capacity` are written.
        let capacity = self.capacity();
        let written = steps.min(capacity as f64) as usize;
        let skipped = steps - written as f64;
        self.write_index = (self.write_index + (skipped % capacity as f64) as usize) % capacity;
        for remaining in (0..written).rev() {
            let step = steps - remaining as f64;
            self.insert((origin + direction * (interval * step)).as_vec2());
        }
    }

    /// Decay every slot by `fade_rate`, saturating at zero.
    pub fn age(&mut self, fade_rate: f32) {
        for particle in &mut self.storage {
            particle.remaining_life = (particle.remaining_life - fade_rate).max(0.0);
        }
    }

    /// Live particles in slot order. Slot order says nothing about recency.
    pub fn live_particles(&self) -> impl Iterator<Item = LiveParticle> + '_ {
        let fade_time = self.fade_time;
        self.storage
            .iter()
            .filter(|p| p.is_live())
            .map(move |p| LiveParticle {
                position: p.position,
                alpha: (p.remaining_life / fade_time).clamp(0.0, 1.0),
            })
    }

    fn previous_index(&self) -> usize {
        match self.write_index {
            0 => self.capacity() - 1,
            index => index - 1,
        }
    }

    fn insert(&mut self, position: Vec2) {
        self.storage[self.write_index] = TrailParticle::new(position, self.fade_time);
        self.write_index = (self.write_index + 1) % self.capacity();
    }

    /// Number of `k >= 1` with `k * interval < distance`, as an integral
    /// `f64` so that any finite distance has an answer.
    fn interpolation_steps(&self, distance: f64) -> f64 {
        let interval = f64::from(self.interpolation_interval);
        let steps = ((distance / interval).ceil() - 1.0).max(0.0);
        // `distance / interval` may round across an integer.
        if steps > 0.0 && interval * steps >= distance {
            steps - 1.0
        } else if interval * (steps + 1.0) < distance {
            steps + 1.0
        } else {
            steps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xs(buffer: &TrailBuffer) -> Vec<f32> {
        let mut xs: Vec<f32> = buffer.live_particles().map(|p| p.position.x).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        xs
    }

    #[test]
    fn test_rejects_zero_capacity() {
        assert_eq!(TrailBuffer::new(0, 1.0).unwrap_err(), TrailError::ZeroCapacity);
    }

    #[test]
    fn test_rejects_bad_fade_time_and_interval() {
        assert!(matches!(
            TrailBuffer::new(4, 0.0),
            Err(TrailError::InvalidFadeTime(_))
        ));
        assert!(matches!(
            TrailBuffer::new(4, f32::NAN),
            Err(TrailError::InvalidFadeTime(_))
        ));
        let buffer = TrailBuffer::new(4, 1.0).unwrap();
        assert!(matches!(
            buffer.with_interpolation_interval(-1.0),
            Err(TrailError::InvalidInterval(_))
        ));
    }

    #[test]
    fn test_new_buffer_has_no_live_particles() {
        for capacity in [1, 2, 7, 2048, 10_000] {
            let buffer = TrailBuffer::new(capacity, 1.0).unwrap();
            assert_eq!(buffer.capacity(), capacity);
            assert_eq!(buffer.live_particles().count(), 0);
            assert!(buffer
                .particles()
                .iter()
                .all(|p| p.position == Vec2::ZERO && p.remaining_life == 0.0));
        }
    }

    #[test]
    fn test_cold_start_at_origin_does_not_interpolate() {
        let mut buffer = TrailBuffer::new(64, 1.0)
            .unwrap()
            .with_interpolation_interval(6.0)
            .unwrap();
        buffer.add_sample(Vec2::ZERO);
        assert_eq!(buffer.live_count(), 1);
        assert_eq!(buffer.write_index(), 1);
    }

    #[test]
    fn test_cold_start_away_from_origin_interpolates_from_sentinel() {
        let mut buffer = TrailBuffer::new(64, 1.0)
            .unwrap()
            .with_interpolation_interval(6.0)
            .unwrap();
        buffer.add_sample(Vec2::new(100.0, 100.0));
        let expected_interpolated = (100.0 * 2f32.sqrt() / 6.0).floor() as usize;
        assert_eq!(expected_interpolated, 23);
        assert_eq!(buffer.live_count(), 1 + expected_interpolated);
        // Interpolated points lie on the diagonal from the origin.
        for particle in buffer.live_particles() {
            assert!((particle.position.x - particle.position.y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_interpolation_fills_gap_between_samples() {
        let mut buffer = TrailBuffer::new(64, 1.0)
            .unwrap()
            .with_interpolation_interval(6.0)
            .unwrap();
        buffer.add_sample(Vec2::ZERO);
        buffer.add_sample(Vec2::new(60.0, 0.0));

        assert_eq!(buffer.write_index(), 11);
        let new_particles = &buffer.particles()[1..11];
        assert!(new_particles.iter().all(|p| p.remaining_life == 1.0));
        assert!(new_particles.iter().all(|p| p.position.y == 0.0));

        let mut new_xs: Vec<f32> = new_particles.iter().map(|p| p.position.x).collect();
        new_xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected: Vec<f32> = (1..=10).map(|k| 6.0 * k as f32).collect();
        assert_eq!(new_xs, expected);
    }

    #[test]
    fn test_small_buffer_scenario() {
        let mut buffer = TrailBuffer::new(4, 1.0)
            .unwrap()
            .with_interpolation_interval(5.0)
            .unwrap();
        buffer.add_sample(Vec2::ZERO);
        buffer.add_sample(Vec2::new(10.0, 0.0));

        assert_eq!(buffer.live_particles().count(), 3);
        assert_eq!(xs(&buffer), vec![0.0, 5.0, 10.0]);
        let untouched = buffer.particles()[3];
        assert_eq!(untouched, TrailParticle::default());
    }

    #[test]
    fn test_ring_overwrites_oldest_sample() {
        let capacity = 4;
        let mut buffer = TrailBuffer::new(capacity, 1.0)
            .unwrap()
            .with_interpolation_interval(10.0)
            .unwrap();
        // Unit steps never reach the interval, so no interpolation happens.
        for x in 0..=capacity {
            buffer.add_sample(Vec2::new(x as f32, 0.0));
        }
        assert_eq!(xs(&buffer), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buffer.write_index(), 1);
    }

    #[test]
    fn test_repeated_position_records_raw_sample_only() {
        let mut buffer = TrailBuffer::new(8, 1.0).unwrap();
        buffer.add_sample(Vec2::new(3.0, 4.0));
        assert_eq!(buffer.write_index(), 1);
        buffer.add_sample(Vec2::new(3.0, 4.0));
        assert_eq!(buffer.write_index(), 2);
        assert_eq!(buffer.live_count(), 2);
    }

    #[test]
    fn test_long_segment_wraps_within_one_call() {
        let mut buffer = TrailBuffer::new(5, 1.0)
            .unwrap()
            .with_interpolation_interval(1.0)
            .unwrap();
        buffer.add_sample(Vec2::ZERO);
        // 1 raw + 99 interpolated inserts into 5 slots.
        buffer.add_sample(Vec2::new(100.0, 0.0));

        assert_eq!(buffer.write_index(), (1 + 100) % 5);
        assert_eq!(xs(&buffer), vec![95.0, 96.0, 97.0, 98.0, 99.0]);
    }

    #[test]
    fn test_skipping_matches_step_by_step_insertion() {
        let mut fast = TrailBuffer::new(7, 1.0)
            .unwrap()
            .with_interpolation_interval(3.0)
            .unwrap();
        let mut slow = fast.clone();

        fast.add_sample(Vec2::new(0.0, 250.0));

        // Same walk through the ring, one insert at a time.
        let previous = Vec2::ZERO;
        let target = Vec2::new(0.0, 250.0);
        slow.insert(target);
        let mut step = 1;
        while 3.0 * (step as f32) < 250.0 {
            slow.insert(previous + Vec2::Y * (3.0 * (step as f32)));
            step += 1;
        }

        assert_eq!(fast.write_index(), slow.write_index());
        assert_eq!(fast.particles(), slow.particles());
    }

    #[test]
    fn test_age_saturates_at_zero() {
        let mut buffer = TrailBuffer::new(16, 1.0).unwrap();
        buffer.add_sample(Vec2::new(3.0, 4.0));
        for _ in 0..4 {
            buffer.age(0.25);
        }
        assert!(buffer.particles().iter().all(|p| p.remaining_life == 0.0));

        buffer.add_sample(Vec2::new(50.0, 50.0));
        for _ in 0..21 {
            buffer.age(0.05);
        }
        assert!(buffer.particles().iter().all(|p| p.remaining_life == 0.0));

        buffer.age(0.05);
        assert!(buffer.particles().iter().all(|p| p.remaining_life >= 0.0));
        assert_eq!(buffer.live_particles().count(), 0);
    }

    #[test]
    fn test_alpha_decreases_by_fade_rate_until_zero() {
        let mut buffer = TrailBuffer::new(2, 1.0).unwrap();
        buffer.add_sample(Vec2::ZERO);

        let mut alphas = Vec::new();
        for _ in 0..3 {
            buffer.age(0.25);
            alphas.push(buffer.live_particles().next().unwrap().alpha);
        }
        assert_eq!(alphas, vec![0.75, 0.5, 0.25]);

        for _ in 0..10 {
            buffer.age(0.25);
            assert_eq!(buffer.particles()[0].remaining_life, 0.0);
            assert_eq!(buffer.live_particles().count(), 0);
        }
    }

    #[test]
    fn test_alpha_is_relative_to_fade_time() {
        let mut buffer = TrailBuffer::new(2, 2.0).unwrap();
        buffer.add_sample(Vec2::ZERO);
        assert_eq!(buffer.live_particles().next().unwrap().alpha, 1.0);
        buffer.age(0.5);
        assert_eq!(buffer.live_particles().next().unwrap().alpha, 0.75);
    }

    #[test]
    fn test_live_particles_is_restartable() {
        let mut buffer = TrailBuffer::new(32, 1.0).unwrap();
        buffer.add_sample(Vec2::ZERO);
        buffer.add_sample(Vec2::new(20.0, 0.0));
        let first: Vec<_> = buffer.live_particles().collect();
        let second: Vec<_> = buffer.live_particles().collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_clear_resets_slots() {
        let mut buffer = TrailBuffer::new(8, 1.0).unwrap();
        buffer.add_sample(Vec2::new(40.0, 0.0));
        buffer.clear();
        assert_eq!(buffer.write_index(), 0);
        assert_eq!(buffer.live_count(), 0);
    }

    #[test]
    fn test_non_finite_sample_does_not_interpolate() {
        let mut buffer = TrailBuffer::new(8, 1.0).unwrap();
        buffer.add_sample(Vec2::new(f32::INFINITY, 0.0));
        assert_eq!(buffer.write_index(), 1);
        buffer.add_sample(Vec2::new(10.0, 0.0));
        assert_eq!(buffer.write_index(), 2);
    }

    #[test]
    fn test_huge_jump_with_fine_interval_fills_ring() {
        let mut buffer = TrailBuffer::new(16, 1.0)
            .unwrap()
            .with_interpolation_interval(0.5)
            .unwrap();
        buffer.add_sample(Vec2::new(1.0e19, 0.0));

        assert_eq!(buffer.live_count(), 16);
        assert!(buffer.write_index() < 16);
        for particle in buffer.particles() {
            assert!(particle.position.is_finite());
            assert!(particle.position.x > 0.0 && particle.position.x <= 1.0e19);
            assert_eq!(particle.position.y, 0.0);
        }
    }

    #[test]
    fn test_jump_beyond_f32_squared_range_still_interpolates() {
        let mut buffer = TrailBuffer::new(8, 1.0).unwrap();
        buffer.add_sample(Vec2::new(1.0e30, 0.0));
        assert_eq!(buffer.live_count(), 8);

        buffer.clear();
        buffer.add_sample(Vec2::new(-3.0e38, -3.0e38));
        buffer.add_sample(Vec2::new(3.0e38, 3.0e38));
        assert_eq!(buffer.live_count(), 8);
        assert!(buffer.particles().iter().all(|p| p.position.is_finite()));
    }

    #[test]
    fn test_interpolation_steps_exclude_the_endpoint() {
        let buffer = TrailBuffer::new(4, 1.0)
            .unwrap()
            .with_interpolation_interval(6.0)
            .unwrap();
        assert_eq!(buffer.interpolation_steps(60.0), 9.0);
        assert_eq!(buffer.interpolation_steps(60.5), 10.0);
        assert_eq!(buffer.interpolation_steps(5.0), 0.0);
        let huge = buffer.interpolation_steps(f64::from(f32::MAX) * 2.0);
        assert!(huge.is_finite() && huge.fract() == 0.0);
    }

    #[test]
    fn test_from_config() {
        let config = TrailConfig {
            max_particles: 12,
            fade_time: 0.5,
            spawn_frequency: 4.0,
            ..TrailConfig::default()
        };
        let buffer = TrailBuffer::from_config(&config).unwrap();
        assert_eq!(buffer.capacity(), 12);
        assert_eq!(buffer.fade_time(), 0.5);
        assert_eq!(buffer.interpolation_interval(), 4.0);
    }
}
