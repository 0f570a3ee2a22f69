//! Scenario tests for the full step pipeline.
//!
//! These drive `Simulation` through its public API only and check the
//! properties that must hold regardless of how the fluid ends up moving.

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sph2d::prelude::*;
use sph2d::spatial::SpatialHash;
use sph2d::{spawn, FixedTimestep};
use std::collections::BTreeSet;

fn domain() -> Bounds {
    Bounds::new(Vec2::ZERO, Vec2::new(10.0, 10.0))
}

fn assert_contained(sim: &Simulation) {
    let inner = sim.bounds().shrink(sim.params().particle_radius);
    for (i, p) in sim.particles().iter().enumerate() {
        assert!(
            inner.contains(p.position),
            "particle {} escaped to {:?} at step {}",
            i,
            p.position,
            sim.step_count()
        );
    }
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn test_hundred_particle_grid_stays_sane() {
    let bounds = domain();
    let positions = spawn::grid_in_bounds(100, bounds);
    let params = FluidParams::default()
        .with_smoothing_radius(1.0)
        .with_rest_density(1.0)
        .with_gas_constant(2.0)
        .with_gravity(-9.81);
    let mut sim = Simulation::new(&positions, params, bounds).unwrap();

    for _ in 0..60 {
        sim.advance(1.0 / 60.0);
        assert_contained(&sim);
        for p in sim.particles() {
            assert!(p.density >= 1e-4);
            assert!(p.near_density >= 1e-4);
        }
        assert!(sim.kinetic_energy().is_finite());
    }
    assert_eq!(sim.step_count(), 60);

    let stats = sim.stats();
    assert_eq!(stats.particle_count, 100);
    assert!(stats.kinetic_energy.is_finite());
    assert!(stats.max_speed.is_finite());
}

#[test]
fn test_close_pair_repels_symmetrically() {
    let radius = 1.0;
    let positions = [Vec2::new(5.0, 5.0), Vec2::new(5.0 + radius * 0.5, 5.0)];
    // Rest density below the pair's density so pressure is positive.
    let params = FluidParams::default()
        .with_smoothing_radius(radius)
        .with_rest_density(0.1)
        .with_gravity(0.0)
        .with_viscosity(0.0);
    let mut sim = Simulation::new(&positions, params, domain()).unwrap();
    sim.advance(1.0 / 60.0);

    let [a, b] = [sim.particles()[0], sim.particles()[1]];
    assert_eq!(a.density, b.density);
    assert!(a.velocity.x < 0.0, "left particle should move left: {:?}", a.velocity);
    assert!(b.velocity.x > 0.0, "right particle should move right: {:?}", b.velocity);
    assert!((a.velocity + b.velocity).length() < 1e-6);
    assert!(a.velocity.y.abs() < 1e-6);
}

#[test]
fn test_lone_particle_has_no_self_force() {
    for parallel in [true, false] {
        for dt in [1e-4, 1.0 / 60.0, 0.25] {
            let start = Vec2::new(2.5, 7.5);
            let params = FluidParams::default()
                .with_gravity(0.0)
                .with_viscosity(0.0)
                .with_parallel(parallel);
            let mut sim = Simulation::new(&[start], params, domain()).unwrap();
            sim.advance(dt);
            assert_eq!(sim.particles()[0].position, start);
            assert_eq!(sim.particles()[0].velocity, Vec2::ZERO);
        }
    }
}

// ============================================================================
// Containment and colliders
// ============================================================================

#[test]
fn test_random_fluid_with_obstacles_stays_in_domain() {
    let bounds = domain();
    let params = FluidParams::water();
    let positions = spawn::random_in_bounds(300, bounds, params.particle_radius, 17);
    let mut sim = Simulation::new(&positions, params, bounds).unwrap();
    sim.set_colliders([
        Collider::oriented_box(Vec2::new(3.0, 2.0), Vec2::new(3.0, 0.4), 0.4),
        Collider::polygon(vec![
            Vec2::new(6.0, 1.0),
            Vec2::new(8.5, 1.0),
            Vec2::new(7.25, 3.0),
        ]),
    ]);

    for _ in 0..120 {
        sim.advance(1.0 / 60.0);
        assert_contained(&sim);
        assert!(sim.particles().iter().all(|p| p.velocity.is_finite()));
    }
}

#[test]
fn test_particles_end_outside_circle_obstacle() {
    let bounds = domain();
    let center = Vec2::new(5.0, 3.0);
    let radius = 1.0;
    let params = FluidParams::water();
    let reach = radius + params.particle_radius;

    let positions = spawn::block(Vec2::new(3.5, 6.0), 12, 6, 0.25);
    let mut sim = Simulation::new(&positions, params, bounds).unwrap();
    sim.set_colliders([Collider::circle(center, radius)]);

    for _ in 0..90 {
        sim.advance(1.0 / 60.0);
        for p in sim.particles() {
            assert!(p.position.distance(center) >= reach - 1e-4);
        }
    }
}

#[test]
fn test_zero_damping_kills_wall_velocity() {
    let params = FluidParams::default()
        .with_gravity(-20.0)
        .with_collision_damping(0.0);
    let mut sim = Simulation::new(&[Vec2::new(5.0, 0.2)], params, domain()).unwrap();
    for _ in 0..10 {
        sim.advance(1.0 / 60.0);
    }
    let p = sim.particles()[0];
    assert_eq!(p.position.y, sim.params().particle_radius);
    assert_eq!(p.velocity.y, 0.0);
}

// ============================================================================
// Spatial hash through the public API
// ============================================================================

#[test]
fn test_hash_buckets_ignore_input_order() {
    let bounds = domain();
    let positions = spawn::random_in_bounds(400, bounds, 0.0, 3);
    let mut shuffled = positions.clone();
    shuffled.shuffle(&mut SmallRng::seed_from_u64(99));

    let mut a = SpatialHash::new(1.0, 400);
    let mut b = SpatialHash::new(1.0, 400);
    a.rebuild_from_positions(&positions, true);
    b.rebuild_from_positions(&shuffled, true);

    let key = |p: Vec2| (p.x.to_bits(), p.y.to_bits());
    for x in -1..=11 {
        for y in -1..=11 {
            let cell = glam::IVec2::new(x, y);
            let from_a: BTreeSet<_> = a.neighbors_of_cell(cell).map(|i| key(positions[i])).collect();
            let from_b: BTreeSet<_> = b.neighbors_of_cell(cell).map(|i| key(shuffled[i])).collect();
            assert_eq!(from_a, from_b, "bucket of cell {:?} differs", cell);
        }
    }
}

#[test]
fn test_neighbors_match_brute_force_after_steps() {
    let bounds = domain();
    let params = FluidParams::default().with_smoothing_radius(0.8);
    let positions = spawn::random_in_bounds(250, bounds, params.particle_radius, 5);
    let mut sim = Simulation::new(&positions, params, bounds).unwrap();
    for _ in 0..5 {
        sim.advance(1.0 / 60.0);
    }

    let r = sim.params().smoothing_radius;
    let particles = sim.particles();
    for i in (0..particles.len()).step_by(7) {
        let pi = particles[i].predicted_position;
        let brute: Vec<usize> = (0..particles.len())
            .filter(|&j| j != i && particles[j].predicted_position.distance(pi) <= r)
            .collect();
        assert_eq!(sim.neighbors_of(i), brute, "neighbors of {}", i);
    }
}

#[test]
fn test_cell_size_below_radius_is_refused() {
    let bounds = domain();
    let positions = spawn::random_in_bounds(300, bounds, 0.125, 21);
    let small = FluidParams::default()
        .with_smoothing_radius(1.0)
        .with_cell_size(0.4);
    assert!(matches!(
        Simulation::new(&positions, small, bounds),
        Err(ConfigError::CellSmallerThanRadius { .. })
    ));

    // Larger cells are accepted and still find every neighbor.
    let large = FluidParams::default()
        .with_smoothing_radius(1.0)
        .with_cell_size(1.7);
    let mut sim = Simulation::new(&positions, large, bounds).unwrap();
    sim.advance(1.0 / 60.0);
    let particles = sim.particles();
    for i in 0..particles.len() {
        let pi = particles[i].predicted_position;
        let brute: Vec<usize> = (0..particles.len())
            .filter(|&j| j != i && particles[j].predicted_position.distance(pi) <= 1.0)
            .collect();
        assert_eq!(sim.neighbors_of(i), brute, "neighbors of {}", i);
    }
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_parallel_matches_sequential() {
    let bounds = domain();
    let positions = spawn::grid_in_bounds(144, bounds);
    let params = FluidParams::water();

    let mut par = Simulation::new(&positions, params.clone().with_parallel(true), bounds).unwrap();
    let mut seq = Simulation::new(&positions, params.with_parallel(false), bounds).unwrap();
    for _ in 0..30 {
        par.advance(1.0 / 60.0);
        seq.advance(1.0 / 60.0);
    }
    assert_eq!(par.particles(), seq.particles());
}

#[test]
fn test_restored_snapshot_replays_identically() {
    let bounds = domain();
    let positions = spawn::grid_in_bounds(81, bounds);
    let mut sim = Simulation::new(&positions, FluidParams::viscous(), bounds).unwrap();
    for _ in 0..10 {
        sim.advance(1.0 / 60.0);
    }

    let mut bytes = Vec::new();
    sim.save_snapshot(&mut bytes).unwrap();
    for _ in 0..10 {
        sim.advance(1.0 / 60.0);
    }
    let first_run = sim.particles().to_vec();

    sim.restore_snapshot(bytes.as_slice()).unwrap();
    for _ in 0..10 {
        sim.advance(1.0 / 60.0);
    }
    assert_eq!(sim.particles(), first_run.as_slice());
}

// ============================================================================
// Configuration and clock
// ============================================================================

#[test]
fn test_initialization_refusals() {
    let bounds = domain();
    let params = FluidParams::default();

    assert_eq!(
        Simulation::initialize(0, &[], params.clone(), bounds).unwrap_err(),
        ConfigError::NoParticles
    );
    assert_eq!(
        Simulation::initialize(4, &[Vec2::ONE; 3], params.clone(), bounds).unwrap_err(),
        ConfigError::PositionCountMismatch {
            expected: 4,
            actual: 3
        }
    );
    assert!(matches!(
        Simulation::new(&[Vec2::ONE], params.clone().with_smoothing_radius(0.0), bounds),
        Err(ConfigError::InvalidSmoothingRadius(_))
    ));

    let err = Simulation::new(&[], params, bounds).unwrap_err();
    assert!(err.to_string().contains("greater than zero"));
}

#[test]
fn test_fixed_timestep_drives_advance() {
    let mut sim = Simulation::builder().with_grid(16).build().unwrap();
    let mut clock = FixedTimestep::new(1.0 / 120.0).unwrap();

    // Uneven frame times, about a quarter second in total.
    for frame in [0.016, 0.020, 0.033, 0.017, 0.050, 0.016, 0.100] {
        for _ in 0..clock.tick(frame) {
            sim.advance(clock.step());
        }
    }
    assert_eq!(sim.step_count(), clock.total_steps());
    assert!(sim.step_count() >= 20);
    assert_contained(&sim);
}
