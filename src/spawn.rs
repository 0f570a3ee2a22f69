//! Initial particle placement.
//!
//! The free functions cover the common layouts. For anything else,
//! [`spawn_with`] hands a [`SpawnContext`] to a closure once per particle:
//!
//! ```
//! use sph2d::prelude::*;
//! use sph2d::spawn;
//!
//! let bounds = Bounds::new(Vec2::ZERO, Vec2::new(8.0, 4.0));
//! let positions = spawn::spawn_with(64, bounds, 7, |ctx| {
//!     // Fill the left half only.
//!     let p = ctx.random_in_bounds(0.1);
//!     Vec2::new(p.x * 0.5, p.y)
//! });
//! assert_eq!(positions.len(), 64);
//! assert!(positions.iter().all(|p| p.x <= 4.0));
//! ```

use crate::collider::Bounds;
use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Per-particle spawn helpers.
pub struct SpawnContext {
    /// Index of the particle being placed (0 to count-1).
    pub index: u32,
    /// Total number of particles being placed.
    pub count: u32,
    /// Domain the particles live in.
    pub bounds: Bounds,
    rng: SmallRng,
}

impl SpawnContext {
    /// Context for one particle. The same `(index, seed)` always produces the
    /// same random sequence.
    pub fn new(index: u32, count: u32, bounds: Bounds, seed: u64) -> Self {
        let stream = seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            index,
            count,
            bounds,
            rng: SmallRng::seed_from_u64(stream),
        }
    }

    /// Normalized progress through the spawn, `0.0` for the first particle.
    #[inline]
    pub fn progress(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.index as f32 / self.count as f32
    }

    /// Random f32 in `[0, 1)`.
    #[inline]
    pub fn random(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Random f32 in `[min, max)`. Returns `min` for an empty range.
    #[inline]
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    /// Uniform point inside the bounds, keeping `margin` away from the walls.
    pub fn random_in_bounds(&mut self, margin: f32) -> Vec2 {
        let inner = self.bounds.shrink(margin);
        Vec2::new(
            self.random_range(inner.min.x, inner.max.x),
            self.random_range(inner.min.y, inner.max.y),
        )
    }

    /// Uniform point inside a disk.
    pub fn random_in_disk(&mut self, center: Vec2, radius: f32) -> Vec2 {
        let angle = self.rng.gen_range(0.0..TAU);
        // sqrt for uniform area density
        let r = radius * self.rng.gen::<f32>().sqrt();
        center + Vec2::from_angle(angle) * r
    }

    /// Random unit vector.
    pub fn random_direction(&mut self) -> Vec2 {
        Vec2::from_angle(self.rng.gen_range(0.0..TAU))
    }

    /// Cell-centered position on a `cols` × `rows` grid covering the bounds,
    /// filled row by row from `bounds.min`.
    pub fn grid_position(&self, cols: u32, rows: u32) -> Vec2 {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let idx = self.index % (cols * rows);
        let cell = self.bounds.size() / Vec2::new(cols as f32, rows as f32);
        let col = (idx % cols) as f32;
        let row = (idx / cols) as f32;
        self.bounds.min + Vec2::new(col + 0.5, row + 0.5) * cell
    }

    /// Evenly spaced point on the segment from `start` to `end`.
    pub fn line_position(&self, start: Vec2, end: Vec2) -> Vec2 {
        start + (end - start) * self.progress()
    }

    /// Evenly spaced point on a circle.
    pub fn circle_position(&self, center: Vec2, radius: f32) -> Vec2 {
        center + Vec2::from_angle(self.progress() * TAU) * radius
    }
}

/// Place `count` particles by calling `spawner` once per index.
pub fn spawn_with<F>(count: usize, bounds: Bounds, seed: u64, mut spawner: F) -> Vec<Vec2>
where
    F: FnMut(&mut SpawnContext) -> Vec2,
{
    (0..count)
        .map(|i| {
            let mut ctx = SpawnContext::new(i as u32, count as u32, bounds, seed);
            spawner(&mut ctx)
        })
        .collect()
}

/// Near-square grid filling the bounds.
///
/// `rows = ceil(sqrt(count))`, `cols = ceil(count / rows)`; each particle sits
/// at the center of its grid cell. The last row may be partial.
pub fn grid_in_bounds(count: usize, bounds: Bounds) -> Vec<Vec2> {
    if count == 0 {
        return Vec::new();
    }
    let rows = (count as f64).sqrt().ceil() as u32;
    let cols = (count as u32).div_ceil(rows);
    spawn_with(count, bounds, 0, |ctx| ctx.grid_position(cols, rows))
}

/// Uniform random positions at least `particle_radius` from every wall.
pub fn random_in_bounds(count: usize, bounds: Bounds, particle_radius: f32, seed: u64) -> Vec<Vec2> {
    spawn_with(count, bounds, seed, |ctx| ctx.random_in_bounds(particle_radius))
}

/// Rectangular block of `cols` × `rows` particles, `spacing` apart, with its
/// first particle at `origin`.
pub fn block(origin: Vec2, cols: u32, rows: u32, spacing: f32) -> Vec<Vec2> {
    (0..rows)
        .flat_map(|row| {
            (0..cols).map(move |col| origin + Vec2::new(col as f32, row as f32) * spacing)
        })
        .collect()
}

/// Offset every position by a random vector of length at most `amount`.
pub fn jitter(positions: &mut [Vec2], amount: f32, seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    for p in positions.iter_mut() {
        let angle = rng.gen_range(0.0..TAU);
        let r = amount * rng.gen::<f32>();
        *p += Vec2::from_angle(angle) * r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_matches_ten_by_ten() {
        let bounds = Bounds::new(Vec2::ZERO, Vec2::splat(10.0));
        let positions = grid_in_bounds(100, bounds);
        assert_eq!(positions.len(), 100);
        assert_eq!(positions[0], Vec2::new(0.5, 0.5));
        assert_eq!(positions[9], Vec2::new(9.5, 0.5));
        assert_eq!(positions[10], Vec2::new(0.5, 1.5));
        assert_eq!(positions[99], Vec2::new(9.5, 9.5));
    }

    #[test]
    fn test_grid_partial_row() {
        let bounds = Bounds::new(Vec2::ZERO, Vec2::new(6.0, 3.0));
        // rows = 3, cols = 2
        let positions = grid_in_bounds(5, bounds);
        assert_eq!(positions.len(), 5);
        assert_eq!(positions[1], Vec2::new(4.5, 0.5));
        assert_eq!(positions[4], Vec2::new(1.5, 2.5));
        assert!(positions.iter().all(|p| bounds.contains(*p)));
        assert!(grid_in_bounds(0, bounds).is_empty());
    }

    #[test]
    fn test_random_respects_margin_and_seed() {
        let bounds = Bounds::new(Vec2::new(-2.0, 1.0), Vec2::new(2.0, 3.0));
        let a = random_in_bounds(200, bounds, 0.25, 42);
        let b = random_in_bounds(200, bounds, 0.25, 42);
        let c = random_in_bounds(200, bounds, 0.25, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let inner = bounds.shrink(0.25);
        assert!(a.iter().all(|p| inner.contains(*p)));
    }

    #[test]
    fn test_block_layout() {
        let positions = block(Vec2::new(1.0, 2.0), 3, 2, 0.5);
        assert_eq!(positions.len(), 6);
        assert_eq!(positions[2], Vec2::new(2.0, 2.0));
        assert_eq!(positions[5], Vec2::new(2.0, 2.5));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let original = block(Vec2::ZERO, 4, 4, 1.0);
        let mut moved = original.clone();
        jitter(&mut moved, 0.05, 9);
        for (a, b) in original.iter().zip(&moved) {
            assert!(a.distance(*b) <= 0.05 + 1e-6);
        }
        assert_ne!(original, moved);
    }

    #[test]
    fn test_context_helpers() {
        let bounds = Bounds::default();
        let mut ctx = SpawnContext::new(25, 100, bounds, 1);
        assert!((ctx.progress() - 0.25).abs() < 1e-6);
        for _ in 0..50 {
            let p = ctx.random_in_disk(Vec2::splat(5.0), 1.0);
            assert!(p.distance(Vec2::splat(5.0)) <= 1.0 + 1e-5);
        }
        assert!((ctx.random_direction().length() - 1.0).abs() < 1e-5);
        let on_circle = ctx.circle_position(Vec2::ZERO, 2.0);
        assert!((on_circle - Vec2::new(0.0, 2.0)).length() < 1e-5);
        assert_eq!(ctx.random_range(3.0, 3.0), 3.0);
    }
}
