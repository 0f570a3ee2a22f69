//! Simulation context and step pipeline.
//!
//! A [`Simulation`] owns the particle buffer, the spatial hash and the active
//! collider set for its whole lifetime. Each [`advance`](Simulation::advance)
//! runs the phases below in order, and every phase finishes for all particles
//! before the next one starts:
//!
//! 1. apply gravity and predict positions `lookahead` seconds ahead,
//! 2. rebuild the spatial hash from predicted positions,
//! 3. density and near density,
//! 4. pressure and viscosity into velocity,
//! 5. integrate positions,
//! 6. colliders, then the domain rectangle.

use crate::collider::{Bounds, Collider, GpuCollider};
use crate::error::{ConfigError, SnapshotError};
use crate::kernels::KernelCoefficients;
use crate::params::FluidParams;
use crate::particle::{Particle, ParticleView};
use crate::snapshot;
use crate::solver;
use crate::spatial::SpatialHash;
use glam::Vec2;
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use std::fmt;
use std::io::{Read, Write};

/// Summary of the particle buffer after the last step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepStats {
    pub step: u64,
    pub particle_count: usize,
    /// Summed in `f64` so large velocities cannot overflow the total.
    pub kinetic_energy: f64,
    pub max_speed: f32,
    pub min_density: f32,
    pub max_density: f32,
    pub mean_density: f32,
    pub occupied_buckets: usize,
}

impl fmt::Display for StepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} | {} particles | KE {:.4} | max speed {:.3} | density {:.3}..{:.3} (mean {:.3}) | {} buckets",
            self.step,
            self.particle_count,
            self.kinetic_energy,
            self.max_speed,
            self.min_density,
            self.max_density,
            self.mean_density,
            self.occupied_buckets
        )
    }
}

/// A running 2D fluid.
#[derive(Clone, Debug)]
pub struct Simulation {
    params: FluidParams,
    bounds: Bounds,
    particles: Vec<Particle>,
    colliders: Vec<Collider>,
    hash: SpatialHash,
    kernels: KernelCoefficients,
    step: u64,
}

impl Simulation {
    /// Start a simulation from initial positions.
    pub fn new(positions: &[Vec2], params: FluidParams, bounds: Bounds) -> Result<Self, ConfigError> {
        Self::initialize(positions.len(), positions, params, bounds)
    }

    /// Start a simulation of `particle_count` particles, refusing to start if
    /// the count, the positions or the parameters are unusable.
    pub fn initialize(
        particle_count: usize,
        positions: &[Vec2],
        params: FluidParams,
        bounds: Bounds,
    ) -> Result<Self, ConfigError> {
        if particle_count == 0 {
            return Err(ConfigError::NoParticles);
        }
        if positions.len() != particle_count {
            return Err(ConfigError::PositionCountMismatch {
                expected: particle_count,
                actual: positions.len(),
            });
        }
        params.validate()?;

        let inner = bounds.shrink(params.particle_radius);
        if !bounds.is_valid() || !inner.min.cmple(inner.max).all() {
            return Err(ConfigError::InvalidBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }
        if positions.iter().any(|p| !p.is_finite()) {
            return Err(ConfigError::NonFiniteParameter("initial_positions"));
        }

        let particles: Vec<Particle> = positions
            .iter()
            .map(|&p| Particle::new(p, params.particle_mass))
            .collect();
        let hash = SpatialHash::new(
            params.effective_cell_size(),
            params.effective_bucket_count(particle_count),
        );
        let kernels = KernelCoefficients::new(params.smoothing_radius);

        info!(
            "Initialized fluid: {} particles, {} buckets, cell size {}",
            particle_count,
            hash.bucket_count(),
            hash.cell_size()
        );

        Ok(Self {
            params,
            bounds,
            particles,
            colliders: Vec::new(),
            hash,
            kernels,
            step: 0,
        })
    }

    /// Start configuring a simulation with method chaining.
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    #[inline]
    pub fn params(&self) -> &FluidParams {
        &self.params
    }

    #[inline]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Number of completed steps.
    #[inline]
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// The hash as built by the last step.
    #[inline]
    pub fn spatial_hash(&self) -> &SpatialHash {
        &self.hash
    }

    #[inline]
    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    /// Replace the active collider set. Takes effect on the next step.
    pub fn set_colliders(&mut self, colliders: impl IntoIterator<Item = Collider>) {
        self.colliders = colliders.into_iter().collect();
        debug!(
            "Collider set replaced: {} colliders [{}]",
            self.colliders.len(),
            self.colliders
                .iter()
                .map(Collider::kind)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    /// Colliders in the layout used by the GPU collision pass.
    pub fn gpu_colliders(&self) -> Vec<GpuCollider> {
        self.colliders.iter().map(Collider::to_gpu).collect()
    }

    /// Position, velocity and density of every particle, for rendering.
    pub fn snapshot(&self) -> Vec<ParticleView> {
        self.particles.iter().map(ParticleView::from).collect()
    }

    /// Run one full step of `dt` seconds.
    ///
    /// A non-positive or non-finite `dt` is skipped with a warning.
    pub fn advance(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            warn!("Skipping step with invalid dt {}", dt);
            return;
        }
        let parallel = self.params.parallel;

        self.predict(dt);
        self.hash.rebuild(&self.particles, parallel);
        solver::compute_densities(
            &mut self.particles,
            &self.hash,
            &self.kernels,
            self.params.epsilon(),
            parallel,
        );
        solver::apply_pressure_forces(
            &mut self.particles,
            &self.hash,
            &self.kernels,
            &self.params,
            dt,
        );
        self.integrate_and_collide(dt);

        self.step += 1;
        if log::log_enabled!(log::Level::Trace) {
            trace!("step {} max speed {:.3}", self.step, self.max_speed());
        }
    }

    fn predict(&mut self, dt: f32) {
        let gravity = self.params.gravity_vector() * dt;
        let lookahead = self.params.lookahead;
        let predict = |p: &mut Particle| {
            p.velocity += gravity;
            p.predicted_position = p.position + p.velocity * lookahead;
        };
        if self.params.parallel {
            self.particles.par_iter_mut().for_each(predict);
        } else {
            self.particles.iter_mut().for_each(predict);
        }
    }

    fn integrate_and_collide(&mut self, dt: f32) {
        let colliders = &self.colliders;
        let bounds = self.bounds;
        let radius = self.params.particle_radius;
        let damping = self.params.collision_damping;

        // Returns true when the particle had to be scrubbed.
        let step_particle = |p: &mut Particle| -> bool {
            let previous = p.position;
            p.position += p.velocity * dt;

            let scrubbed = !(p.velocity.is_finite() && p.position.is_finite());
            if scrubbed {
                p.velocity = Vec2::ZERO;
                p.position = if previous.is_finite() {
                    previous
                } else {
                    bounds.center()
                };
            }

            for collider in colliders {
                collider.resolve(&mut p.position, &mut p.velocity, radius, damping);
            }
            bounds.resolve(&mut p.position, &mut p.velocity, radius, damping);
            scrubbed
        };

        let scrubbed = if self.params.parallel {
            self.particles
                .par_iter_mut()
                .map(step_particle)
                .filter(|&s| s)
                .count()
        } else {
            self.particles
                .iter_mut()
                .map(step_particle)
                .filter(|&s| s)
                .count()
        };
        if scrubbed > 0 {
            warn!(
                "Step {}: reset {} particles with non-finite state",
                self.step + 1,
                scrubbed
            );
        }
    }

    /// Exact neighbors of particle `i` as of the last step, ascending.
    pub fn neighbors_of(&self, i: usize) -> Vec<usize> {
        solver::neighbors_of(&self.particles, &self.hash, &self.kernels, i)
    }

    /// Total kinetic energy.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| 0.5 * p.mass as f64 * (p.velocity.as_dvec2().length_squared()))
            .sum()
    }

    fn max_speed(&self) -> f32 {
        self.particles
            .iter()
            .map(|p| p.velocity.length())
            .fold(0.0, f32::max)
    }

    /// Diagnostics for the current state.
    pub fn stats(&self) -> StepStats {
        let n = self.particles.len();
        let (min_density, max_density, sum_density) = self.particles.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(lo, hi, sum), p| (lo.min(p.density), hi.max(p.density), sum + p.density as f64),
        );
        StepStats {
            step: self.step,
            particle_count: n,
            kinetic_energy: self.kinetic_energy(),
            max_speed: self.max_speed(),
            min_density,
            max_density,
            mean_density: (sum_density / n.max(1) as f64) as f32,
            occupied_buckets: self.hash.occupied_buckets(),
        }
    }

    /// Write the particle buffer as a binary snapshot.
    pub fn save_snapshot<W: Write>(&self, writer: W) -> Result<(), SnapshotError> {
        snapshot::write_snapshot(writer, &self.particles)?;
        debug!("Saved snapshot of {} particles", self.particles.len());
        Ok(())
    }

    /// Replace the particle buffer with a snapshot of the same size.
    ///
    /// Records with a non-finite position, velocity or mass are refused and
    /// leave the running buffer untouched. The spatial hash is rebuilt from
    /// the restored predicted positions.
    pub fn restore_snapshot<R: Read>(&mut self, reader: R) -> Result<(), SnapshotError> {
        let restored = snapshot::read_snapshot_exact(reader, self.particles.len())?;
        if let Some(i) = restored.iter().position(|p| {
            !(p.position.is_finite()
                && p.predicted_position.is_finite()
                && p.velocity.is_finite()
                && p.mass.is_finite())
        }) {
            return Err(SnapshotError::NonFiniteRecord(i));
        }

        self.particles = restored;
        self.hash.rebuild(&self.particles, self.params.parallel);
        debug!("Restored snapshot of {} particles", self.particles.len());
        Ok(())
    }
}

/// Method-chaining setup for a [`Simulation`].
///
/// ```
/// use sph2d::prelude::*;
///
/// let sim = Simulation::builder()
///     .with_bounds(Bounds::new(Vec2::ZERO, Vec2::new(8.0, 6.0)))
///     .with_grid(64)
///     .with_params(FluidParams::water())
///     .with_collider(Collider::circle(Vec2::new(4.0, 2.0), 0.5))
///     .build()
///     .unwrap();
/// assert_eq!(sim.particle_count(), 64);
/// assert_eq!(sim.colliders().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SimulationBuilder {
    params: FluidParams,
    bounds: Bounds,
    positions: Vec<Vec2>,
    grid_count: Option<usize>,
    velocity: Vec2,
    colliders: Vec<Collider>,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: FluidParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Explicit initial positions.
    pub fn with_positions(mut self, positions: impl Into<Vec<Vec2>>) -> Self {
        self.positions = positions.into();
        self.grid_count = None;
        self
    }

    /// Fill the bounds with a near-square grid of `count` particles, laid
    /// out when [`build`](Self::build) runs so the final bounds are used.
    pub fn with_grid(mut self, count: usize) -> Self {
        self.grid_count = Some(count);
        self
    }

    /// Velocity every particle starts with.
    pub fn with_initial_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.colliders.push(collider);
        self
    }

    pub fn build(self) -> Result<Simulation, ConfigError> {
        let positions = match self.grid_count {
            Some(count) => crate::spawn::grid_in_bounds(count, self.bounds),
            None => self.positions,
        };
        let mut sim = Simulation::new(&positions, self.params, self.bounds)?;
        if self.velocity != Vec2::ZERO {
            for p in &mut sim.particles {
                p.velocity = self.velocity;
            }
        }
        if !self.colliders.is_empty() {
            sim.set_colliders(self.colliders);
        }
        Ok(sim)
    }
}
