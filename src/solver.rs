//! Density, pressure and viscosity passes.
//!
//! Both passes read the whole particle buffer and write one value per
//! particle. They are written as "map every index into a fresh buffer, then
//! commit the buffer into the owning slots", so a worker never writes a slot
//! another worker can read in the same pass. With `parallel` off the same
//! closures run on the calling thread and produce identical results.
//!
//! All neighbor loops go through [`SpatialHash::candidates`] followed by an
//! exact distance test against the predicted positions.

use crate::kernels::KernelCoefficients;
use crate::params::FluidParams;
use crate::spatial::SpatialHash;
use crate::Particle;
use glam::Vec2;
use rayon::prelude::*;

/// Equation of state: `gas_constant * (density - rest_density)`.
///
/// Negative below rest density, so sparse regions pull together.
#[inline]
pub fn pressure_from_density(density: f32, rest_density: f32, gas_constant: f32) -> f32 {
    gas_constant * (density - rest_density)
}

/// Map every particle index through `f`, optionally on the rayon pool.
pub(crate) fn map_particles<T, F>(particles: &[Particle], parallel: bool, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize, &Particle) -> T + Sync + Send,
{
    if parallel {
        particles
            .par_iter()
            .enumerate()
            .map(|(i, p)| f(i, p))
            .collect()
    } else {
        particles.iter().enumerate().map(|(i, p)| f(i, p)).collect()
    }
}

/// Call `f(j, offset, dist)` for every particle `j != i` within the
/// smoothing radius of `position`. `offset` points from `position` to `j`.
#[inline]
fn for_each_neighbor<F>(
    particles: &[Particle],
    hash: &SpatialHash,
    kernels: &KernelCoefficients,
    i: usize,
    position: Vec2,
    mut f: F,
) where
    F: FnMut(usize, Vec2, f32),
{
    for j in hash.candidates(position) {
        if j == i {
            continue;
        }
        let offset = particles[j].predicted_position - position;
        let dist_sq = offset.length_squared();
        if dist_sq > kernels.radius_sq {
            continue;
        }
        f(j, offset, dist_sq.sqrt());
    }
}

/// Exact neighbors of particle `i`, ascending.
pub fn neighbors_of(
    particles: &[Particle],
    hash: &SpatialHash,
    kernels: &KernelCoefficients,
    i: usize,
) -> Vec<usize> {
    let mut found = Vec::new();
    if let Some(p) = particles.get(i) {
        for_each_neighbor(particles, hash, kernels, i, p.predicted_position, |j, _, _| {
            found.push(j)
        });
    }
    found.sort_unstable();
    found
}

/// Density and near density of every particle, clamped to `epsilon`.
///
/// The particle itself does not contribute.
pub fn compute_densities(
    particles: &mut [Particle],
    hash: &SpatialHash,
    kernels: &KernelCoefficients,
    epsilon: f32,
    parallel: bool,
) {
    let sums: Vec<(f32, f32)> = {
        let particles = &*particles;
        map_particles(particles, parallel, |i, p| {
            let mut density = 0.0;
            let mut near_density = 0.0;
            for_each_neighbor(particles, hash, kernels, i, p.predicted_position, |j, _, dist| {
                let mass = particles[j].mass;
                density += mass * kernels.density(dist);
                near_density += mass * kernels.near_density(dist);
            });
            (density.max(epsilon), near_density.max(epsilon))
        })
    };

    let commit = |(p, (density, near_density)): (&mut Particle, (f32, f32))| {
        p.density = density;
        p.near_density = near_density;
    };
    if parallel {
        particles.par_iter_mut().zip(sums).for_each(commit);
    } else {
        particles.iter_mut().zip(sums).for_each(commit);
    }
}

/// Acceleration on particle `i` from pressure, near pressure and viscosity.
///
/// Requires densities from [`compute_densities`]. Neighbors still sitting at
/// the density floor are skipped.
pub fn acceleration_of(
    particles: &[Particle],
    hash: &SpatialHash,
    kernels: &KernelCoefficients,
    params: &FluidParams,
    i: usize,
) -> Vec2 {
    let epsilon = params.epsilon();
    let pressure = |density: f32| {
        pressure_from_density(density, params.rest_density, params.gas_constant)
    };
    let near_pressure = |near_density: f32| match params.near_pressure_multiplier {
        Some(k) => k * near_density,
        None => pressure(near_density),
    };

    let p = &particles[i];
    let pressure_i = pressure(p.density);
    let near_pressure_i = near_pressure(p.near_density);

    let mut force = Vec2::ZERO;
    for_each_neighbor(particles, hash, kernels, i, p.predicted_position, |j, offset, dist| {
        let other = &particles[j];
        if other.density <= epsilon {
            return;
        }

        // Coincident particles push apart along +-Y, ordered by index so the
        // pair still gets opposite directions.
        let dir = if dist > 0.0 {
            offset / dist
        } else if j > i {
            Vec2::Y
        } else {
            Vec2::NEG_Y
        };

        let shared_pressure = (pressure_i + pressure(other.density)) * 0.5;
        let shared_near_pressure = (near_pressure_i + near_pressure(other.near_density)) * 0.5;

        force += dir * kernels.density_slope(dist) * shared_pressure * other.mass / other.density;
        force += dir * kernels.near_density_slope(dist) * shared_near_pressure * other.mass
            / other.near_density;

        if params.viscosity != 0.0 {
            force += params.viscosity * other.mass * (other.velocity - p.velocity)
                / other.density
                * kernels.viscosity(dist);
        }
    });

    force / p.density.max(epsilon)
}

/// Integrate pressure and viscosity into every particle's velocity.
///
/// Velocities are read from the buffer as it was before this pass and the
/// new ones are committed together at the end.
pub fn apply_pressure_forces(
    particles: &mut [Particle],
    hash: &SpatialHash,
    kernels: &KernelCoefficients,
    params: &FluidParams,
    dt: f32,
) {
    let parallel = params.parallel;
    let velocities: Vec<Vec2> = {
        let particles = &*particles;
        map_particles(particles, parallel, |i, p| {
            let velocity = p.velocity + acceleration_of(particles, hash, kernels, params, i) * dt;
            match params.max_speed {
                Some(limit) => velocity.clamp_length_max(limit.max(0.0)),
                None => velocity,
            }
        })
    };

    let commit = |(p, velocity): (&mut Particle, Vec2)| p.velocity = velocity;
    if parallel {
        particles.par_iter_mut().zip(velocities).for_each(commit);
    } else {
        particles.iter_mut().zip(velocities).for_each(commit);
    }
}
