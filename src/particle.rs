//! Particle record and read-only views.
//!
//! [`Particle`] is a fixed-stride `#[repr(C)]` record so the whole buffer can
//! be handed to a GPU collaborator or written to disk with `bytemuck` without
//! conversion. The field order is part of the snapshot format; do not reorder.

use glam::Vec2;

/// Size in bytes of one [`Particle`] record.
pub const PARTICLE_STRIDE: usize = std::mem::size_of::<Particle>();

/// One fluid particle.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
    /// Authoritative position, used for rendering and collision.
    pub position: Vec2,
    /// Look-ahead position used for neighbor search and force evaluation.
    pub predicted_position: Vec2,
    pub velocity: Vec2,
    pub mass: f32,
    /// Clamped to at least the density epsilon after every density pass.
    pub density: f32,
    pub near_density: f32,
}

impl Particle {
    /// A stationary particle at `position`.
    pub fn new(position: Vec2, mass: f32) -> Self {
        Self {
            position,
            predicted_position: position,
            velocity: Vec2::ZERO,
            mass,
            density: 0.0,
            near_density: 0.0,
        }
    }

    /// Set an initial velocity.
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Kinetic energy `½ m |v|²`.
    #[inline]
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.velocity.length_squared()
    }
}

/// What the rendering side gets to see of a particle.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleView {
    pub position: Vec2,
    pub velocity: Vec2,
    pub density: f32,
}

impl From<&Particle> for ParticleView {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.position,
            velocity: p.velocity,
            density: p.density,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_layout() {
        assert_eq!(PARTICLE_STRIDE, 36);
        assert_eq!(std::mem::align_of::<Particle>(), 4);
    }

    #[test]
    fn test_new_particle_predicts_in_place() {
        let p = Particle::new(Vec2::new(1.0, 2.0), 1.5);
        assert_eq!(p.predicted_position, p.position);
        assert_eq!(p.velocity, Vec2::ZERO);
        assert_eq!(p.mass, 1.5);
    }

    #[test]
    fn test_records_cast_to_bytes() {
        let particles = vec![Particle::new(Vec2::ONE, 1.0); 4];
        let bytes: &[u8] = bytemuck::cast_slice(&particles);
        assert_eq!(bytes.len(), 4 * PARTICLE_STRIDE);

        let back: &[Particle] = bytemuck::cast_slice(bytes);
        assert_eq!(back, particles.as_slice());
    }

    #[test]
    fn test_view_copies_render_fields() {
        let mut p = Particle::new(Vec2::new(3.0, 4.0), 1.0).with_velocity(Vec2::X);
        p.density = 2.5;
        let view = ParticleView::from(&p);
        assert_eq!(view.position, Vec2::new(3.0, 4.0));
        assert_eq!(view.velocity, Vec2::X);
        assert_eq!(view.density, 2.5);
        assert!((p.kinetic_energy() - 0.5).abs() < 1e-6);
    }
}
