//! Fixed-timestep clock.
//!
//! Real frames arrive with uneven deltas, but the solver is only stable for a
//! fixed `dt`. [`FixedTimestep`] accumulates frame time and tells the caller
//! how many whole steps to run, carrying the remainder to the next frame.
//!
//! # Example
//!
//! ```
//! use sph2d::time::FixedTimestep;
//!
//! let mut clock = FixedTimestep::new(1.0 / 60.0).unwrap();
//! // A 55 ms frame is three 60 Hz steps with a little left over.
//! assert_eq!(clock.tick(0.055), 3);
//! assert!(clock.alpha() > 0.0 && clock.alpha() < 1.0);
//! ```

use crate::error::ConfigError;
use std::time::Duration;

/// Accumulator that converts frame deltas into fixed steps.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: f32,
    accumulator: f32,
    /// Catch-up cap per frame. Time beyond it is dropped.
    max_steps_per_frame: u32,
    time_scale: f32,
    paused: bool,
    total_steps: u64,
    dropped_steps: u64,
}

impl FixedTimestep {
    /// Clock stepping every `step` seconds, catching up at most 8 steps per
    /// frame.
    pub fn new(step: f32) -> Result<Self, ConfigError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ConfigError::InvalidTimestep(step));
        }
        Ok(Self {
            step,
            accumulator: 0.0,
            max_steps_per_frame: 8,
            time_scale: 1.0,
            paused: false,
            total_steps: 0,
            dropped_steps: 0,
        })
    }

    pub fn with_max_steps_per_frame(mut self, max_steps: u32) -> Self {
        self.max_steps_per_frame = max_steps.max(1);
        self
    }

    /// Speed multiplier applied to incoming frame time.
    pub fn with_time_scale(mut self, scale: f32) -> Self {
        self.set_time_scale(scale);
        self
    }

    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Negative and non-finite scales are treated as zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Steps run since creation.
    #[inline]
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Steps skipped because a frame needed more than the catch-up cap.
    #[inline]
    pub fn dropped_steps(&self) -> u64 {
        self.dropped_steps
    }

    /// Add a frame's worth of time and return how many steps to run now.
    pub fn tick(&mut self, frame_seconds: f32) -> u32 {
        if self.paused || !frame_seconds.is_finite() || frame_seconds <= 0.0 {
            return 0;
        }
        self.accumulator += frame_seconds * self.time_scale;

        let due = (self.accumulator / self.step).floor();
        let due = if due >= u32::MAX as f32 { u32::MAX } else { due as u32 };
        let run = due.min(self.max_steps_per_frame);

        if due > run {
            self.dropped_steps += (due - run) as u64;
            self.accumulator = 0.0;
        } else {
            self.accumulator -= run as f32 * self.step;
            // Float drift can leave a hair below zero.
            self.accumulator = self.accumulator.max(0.0);
        }
        self.total_steps += run as u64;
        run
    }

    /// [`tick`](Self::tick) for a measured `Duration`.
    pub fn tick_duration(&mut self, frame: Duration) -> u32 {
        self.tick(frame.as_secs_f32())
    }

    /// Fraction of a step left in the accumulator, for render interpolation.
    #[inline]
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.step).clamp(0.0, 1.0)
    }

    /// Forget any accumulated time.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_step() {
        assert_eq!(
            FixedTimestep::new(0.0).err(),
            Some(ConfigError::InvalidTimestep(0.0))
        );
        assert!(FixedTimestep::new(f32::NAN).is_err());
        assert!(FixedTimestep::new(-1.0).is_err());
    }

    #[test]
    fn test_carries_remainder() {
        let mut clock = FixedTimestep::new(0.1).unwrap();
        assert_eq!(clock.tick(0.05), 0);
        assert_eq!(clock.tick(0.07), 1);
        assert!((clock.alpha() - 0.2).abs() < 1e-4);
        assert_eq!(clock.tick(0.09), 1);
        assert_eq!(clock.total_steps(), 2);
    }

    #[test]
    fn test_caps_catch_up() {
        let mut clock = FixedTimestep::new(0.01)
            .unwrap()
            .with_max_steps_per_frame(4);
        assert_eq!(clock.tick(1.0), 4);
        assert!(clock.dropped_steps() >= 95);
        assert_eq!(clock.alpha(), 0.0);
        assert_eq!(clock.tick(0.015), 1);
    }

    #[test]
    fn test_pause_and_scale() {
        let mut clock = FixedTimestep::new(0.1).unwrap().with_time_scale(2.0);
        clock.pause();
        assert_eq!(clock.tick(1.0), 0);
        clock.toggle_pause();
        assert!(!clock.is_paused());
        assert_eq!(clock.tick(0.1), 2);

        clock.set_time_scale(-3.0);
        assert_eq!(clock.time_scale(), 0.0);
        assert_eq!(clock.tick(1.0), 0);
    }

    #[test]
    fn test_duration_and_bad_frames() {
        let mut clock = FixedTimestep::new(0.02).unwrap();
        assert_eq!(clock.tick_duration(Duration::from_millis(50)), 2);
        assert_eq!(clock.tick(f32::NAN), 0);
        assert_eq!(clock.tick(-0.5), 0);
        clock.reset();
        assert_eq!(clock.alpha(), 0.0);
    }
}
