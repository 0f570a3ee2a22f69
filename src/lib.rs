//! # sph2d
//!
//! Real-time 2D smoothed-particle hydrodynamics on the CPU.
//!
//! The fluid is a fixed set of particles. Every step each particle's density
//! is estimated from its neighbors, turned into a pressure, and the pressure
//! gradient plus an optional viscosity term pushes the particle around.
//! Neighbors are found through a spatial hash that is rebuilt every step, so
//! a step is close to O(n).
//!
//! ## Quick Start
//!
//! ```
//! use sph2d::prelude::*;
//!
//! let bounds = Bounds::new(Vec2::ZERO, Vec2::new(10.0, 10.0));
//! let positions = sph2d::spawn::grid_in_bounds(100, bounds);
//!
//! let mut sim = Simulation::new(&positions, FluidParams::default(), bounds).unwrap();
//! sim.set_colliders([Collider::circle(Vec2::new(5.0, 3.0), 1.0)]);
//!
//! for _ in 0..10 {
//!     sim.advance(1.0 / 60.0);
//! }
//! for p in sim.snapshot() {
//!     assert!(p.position.is_finite());
//! }
//! ```
//!
//! ## Step pipeline
//!
//! | Phase     | Module                | Parallel |
//! |-----------|-----------------------|----------|
//! | predict   | [`simulation`]        | yes      |
//! | hash      | [`spatial`]           | sort     |
//! | density   | [`solver`]            | yes      |
//! | forces    | [`solver`]            | yes      |
//! | integrate | [`simulation`]        | yes      |
//! | collide   | [`collider`]          | yes      |
//!
//! Parallel phases use rayon and can be switched off with
//! [`FluidParams::parallel`]; results are identical either way.
//!
//! ## Colliders
//!
//! Obstacles are a closed enum, [`Collider`]: circles, oriented boxes and
//! polygons. The domain itself is a [`Bounds`] rectangle that particles are
//! clamped into after every collider has run.
//!
//! ## GPU mirror
//!
//! [`shader`] carries WGSL for the same pipeline over the same record
//! layouts, for hosts that want to run the step on a GPU.

pub mod collider;
mod error;
pub mod kernels;
pub mod params;
mod particle;
pub mod shader;
pub mod simulation;
pub mod snapshot;
pub mod solver;
pub mod spatial;
pub mod spawn;
pub mod time;

pub use bytemuck;
pub use collider::{Bounds, Collider, GpuCollider};
pub use error::{ConfigError, SnapshotError};
pub use glam::{IVec2, Vec2};
pub use kernels::KernelCoefficients;
pub use params::FluidParams;
pub use particle::{Particle, ParticleView, PARTICLE_STRIDE};
pub use simulation::{Simulation, SimulationBuilder, StepStats};
pub use spatial::{HashEntry, SpatialHash};
pub use spawn::SpawnContext;
pub use time::FixedTimestep;

/// Convenient re-exports for common usage.
///
/// ```
/// use sph2d::prelude::*;
/// ```
pub mod prelude {
    pub use crate::collider::{Bounds, Collider};
    pub use crate::params::FluidParams;
    pub use crate::particle::{Particle, ParticleView};
    pub use crate::simulation::{Simulation, StepStats};
    pub use crate::spawn::SpawnContext;
    pub use crate::time::FixedTimestep;
    pub use crate::{ConfigError, SnapshotError};
    pub use glam::Vec2;
}
