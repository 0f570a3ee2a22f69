//! Fluid parameters.
//!
//! [`FluidParams`] is plain data with serde support so scene files can carry
//! it verbatim. Missing fields fall back to [`FluidParams::default`].
//!
//! ```
//! use sph2d::FluidParams;
//!
//! let params = FluidParams::water()
//!     .with_viscosity(0.05)
//!     .with_gravity(-4.0);
//! assert!(params.validate().is_ok());
//! ```

use crate::error::ConfigError;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Tunable constants of the solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidParams {
    /// Kernel support radius.
    pub smoothing_radius: f32,
    pub rest_density: f32,
    /// Stiffness of the equation of state.
    pub gas_constant: f32,
    /// When set, near pressure is `k * near_density` instead of running the
    /// near density through the equation of state.
    pub near_pressure_multiplier: Option<f32>,
    pub viscosity: f32,
    /// Fraction of normal velocity kept after hitting a wall or collider.
    pub collision_damping: f32,
    /// Vertical acceleration; negative pulls towards `-y`.
    pub gravity: f32,
    pub particle_radius: f32,
    pub particle_mass: f32,
    /// Look-ahead time used to predict positions for neighbor search.
    pub lookahead: f32,
    /// Floor applied to density and near density after the density pass.
    pub density_epsilon: f32,
    /// Number of hash buckets. Defaults to the particle count.
    pub bucket_count: Option<u32>,
    /// Hash cell size. Defaults to the smoothing radius and may not be
    /// smaller than it.
    pub cell_size: Option<f32>,
    /// Fan per-particle passes out over the rayon pool.
    pub parallel: bool,
    /// Velocity magnitude cap applied after the force pass.
    pub max_speed: Option<f32>,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            smoothing_radius: 1.0,
            rest_density: 1.0,
            gas_constant: 2.0,
            near_pressure_multiplier: None,
            viscosity: 0.0,
            collision_damping: 1.0,
            gravity: -9.81,
            particle_radius: 0.125,
            particle_mass: 1.0,
            lookahead: 1.0 / 120.0,
            density_epsilon: 1e-4,
            bucket_count: None,
            cell_size: None,
            parallel: true,
            max_speed: None,
        }
    }
}

impl FluidParams {
    /// Defaults with a short-range near-pressure term and light damping.
    pub fn water() -> Self {
        Self {
            rest_density: 2.0,
            gas_constant: 40.0,
            near_pressure_multiplier: Some(2.0),
            viscosity: 0.05,
            collision_damping: 0.8,
            ..Default::default()
        }
    }

    /// Thick, slow-settling fluid.
    pub fn viscous() -> Self {
        Self {
            rest_density: 2.0,
            gas_constant: 20.0,
            near_pressure_multiplier: Some(1.0),
            viscosity: 0.6,
            collision_damping: 0.3,
            ..Default::default()
        }
    }

    /// Stiff, bouncy fluid that throws droplets.
    pub fn splashy() -> Self {
        Self {
            rest_density: 1.5,
            gas_constant: 80.0,
            near_pressure_multiplier: Some(6.0),
            viscosity: 0.01,
            collision_damping: 0.95,
            max_speed: Some(40.0),
            ..Default::default()
        }
    }

    pub fn with_smoothing_radius(mut self, radius: f32) -> Self {
        self.smoothing_radius = radius;
        self
    }

    pub fn with_rest_density(mut self, density: f32) -> Self {
        self.rest_density = density;
        self
    }

    pub fn with_gas_constant(mut self, gas_constant: f32) -> Self {
        self.gas_constant = gas_constant;
        self
    }

    pub fn with_near_pressure_multiplier(mut self, multiplier: f32) -> Self {
        self.near_pressure_multiplier = Some(multiplier);
        self
    }

    pub fn with_viscosity(mut self, viscosity: f32) -> Self {
        self.viscosity = viscosity;
        self
    }

    pub fn with_collision_damping(mut self, damping: f32) -> Self {
        self.collision_damping = damping;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_particle_radius(mut self, radius: f32) -> Self {
        self.particle_radius = radius;
        self
    }

    pub fn with_particle_mass(mut self, mass: f32) -> Self {
        self.particle_mass = mass;
        self
    }

    pub fn with_lookahead(mut self, lookahead: f32) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_bucket_count(mut self, buckets: u32) -> Self {
        self.bucket_count = Some(buckets);
        self
    }

    pub fn with_cell_size(mut self, size: f32) -> Self {
        self.cell_size = Some(size);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = Some(max_speed);
        self
    }

    /// Gravity as an acceleration vector.
    #[inline]
    pub fn gravity_vector(&self) -> Vec2 {
        Vec2::new(0.0, self.gravity)
    }

    /// Cell size actually used by the hash.
    #[inline]
    pub fn effective_cell_size(&self) -> f32 {
        self.cell_size.unwrap_or(self.smoothing_radius)
    }

    /// Bucket count actually used for `particle_count` particles.
    #[inline]
    pub fn effective_bucket_count(&self, particle_count: usize) -> u32 {
        self.bucket_count
            .unwrap_or(particle_count.min(u32::MAX as usize) as u32)
            .max(1)
    }

    /// Density floor, never zero.
    #[inline]
    pub fn epsilon(&self) -> f32 {
        self.density_epsilon.max(f32::MIN_POSITIVE)
    }

    /// Check every field that would make a step undefined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.smoothing_radius.is_finite() && self.smoothing_radius > 0.0) {
            return Err(ConfigError::InvalidSmoothingRadius(self.smoothing_radius));
        }
        if let Some(size) = self.cell_size {
            if !(size.is_finite() && size > 0.0) {
                return Err(ConfigError::InvalidCellSize(size));
            }
            if size < self.smoothing_radius {
                return Err(ConfigError::CellSmallerThanRadius {
                    cell_size: size,
                    smoothing_radius: self.smoothing_radius,
                });
            }
        }
        if !(self.particle_radius.is_finite() && self.particle_radius >= 0.0) {
            return Err(ConfigError::InvalidParticleRadius(self.particle_radius));
        }
        if self.bucket_count == Some(0) {
            return Err(ConfigError::InvalidBucketCount);
        }

        let scalars = [
            ("rest_density", self.rest_density),
            ("gas_constant", self.gas_constant),
            ("viscosity", self.viscosity),
            ("collision_damping", self.collision_damping),
            ("gravity", self.gravity),
            ("particle_mass", self.particle_mass),
            ("lookahead", self.lookahead),
            ("density_epsilon", self.density_epsilon),
            (
                "near_pressure_multiplier",
                self.near_pressure_multiplier.unwrap_or(0.0),
            ),
            ("max_speed", self.max_speed.unwrap_or(0.0)),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteParameter(name));
            }
        }
        Ok(())
    }
}
