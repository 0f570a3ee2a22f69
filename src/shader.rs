//! WGSL mirror of the step pipeline.
//!
//! The GPU path runs the same phases as [`Simulation::advance`] over the same
//! buffers: 36-byte particle records, 8-byte hash entries, the per-bucket start
//! table and [`GpuCollider`] records. Cell rounding, hash primes and kernel
//! normalization are identical to the CPU code so both paths visit the same
//! candidates.
//!
//! Dispatch order per step, one thread per particle:
//!
//! | Entry point          | Reads                         | Writes                     |
//! |----------------------|-------------------------------|----------------------------|
//! | `predict`            | particles                     | velocity, predicted        |
//! | `write_hash_entries` | particles                     | entries, start table reset |
//! | *(sort entries)*     | entries                       | entries                    |
//! | `build_index`        | entries                       | start table                |
//! | `compute_density`    | particles, entries, start     | density, near density      |
//! | `compute_forces`     | particles, entries, start     | `new_velocities`           |
//! | `integrate`          | particles, `new_velocities`   | position, velocity         |
//!
//! Sorting the entry buffer by `(cell_key, particle_index)` and all buffer
//! binding is left to the host renderer.
//!
//! [`Simulation::advance`]: crate::Simulation::advance
//! [`GpuCollider`]: crate::collider::GpuCollider

use crate::collider::Bounds;
use crate::params::FluidParams;

/// Threads per workgroup for every entry point.
pub const WORKGROUP_SIZE: u32 = 256;

/// Entry points in dispatch order.
pub const ENTRY_POINTS: [&str; 6] = [
    "predict",
    "write_hash_entries",
    "build_index",
    "compute_density",
    "compute_forces",
    "integrate",
];

/// Record layouts. Particle fields are scalars so the stride stays 36 bytes.
pub const STRUCTS_WGSL: &str = r#"
struct Particle {
    position_x: f32,
    position_y: f32,
    predicted_x: f32,
    predicted_y: f32,
    velocity_x: f32,
    velocity_y: f32,
    mass: f32,
    density: f32,
    near_density: f32,
}

struct HashEntry {
    particle_index: u32,
    cell_key: u32,
}

struct GpuCollider {
    center: vec2<f32>,
    size: vec2<f32>,
    radius: f32,
    rotation: f32,
    kind: u32,
    _padding: u32,
}

struct KernelParams {
    radius: f32,
    radius_sq: f32,
    density: f32,
    near_density: f32,
    density_slope: f32,
    near_density_slope: f32,
    viscosity: f32,
    _padding: f32,
}

struct SimUniforms {
    dt: f32,
    lookahead: f32,
    gravity: f32,
    rest_density: f32,
    gas_constant: f32,
    viscosity: f32,
    near_multiplier: f32,
    near_mode: u32,
    epsilon: f32,
    cell_size: f32,
    bucket_count: u32,
    particle_count: u32,
    particle_radius: f32,
    damping: f32,
    bounds_min_x: f32,
    bounds_min_y: f32,
    bounds_max_x: f32,
    bounds_max_y: f32,
    collider_count: u32,
    max_speed: f32,
}

@group(0) @binding(0) var<storage, read_write> particles: array<Particle>;
@group(0) @binding(1) var<storage, read_write> entries: array<HashEntry>;
@group(0) @binding(2) var<storage, read_write> start_indices: array<u32>;
@group(0) @binding(3) var<storage, read_write> new_velocities: array<vec2<f32>>;
@group(0) @binding(4) var<storage, read> colliders: array<GpuCollider>;
@group(1) @binding(0) var<uniform> sim: SimUniforms;
@group(1) @binding(1) var<uniform> kernels: KernelParams;

fn position_of(p: Particle) -> vec2<f32> {
    return vec2<f32>(p.position_x, p.position_y);
}

fn predicted_of(p: Particle) -> vec2<f32> {
    return vec2<f32>(p.predicted_x, p.predicted_y);
}

fn velocity_of(p: Particle) -> vec2<f32> {
    return vec2<f32>(p.velocity_x, p.velocity_y);
}
"#;

/// Smoothing kernels and the equation of state.
pub const KERNELS_WGSL: &str = r#"
fn density_kernel(dist: f32) -> f32 {
    if (dist >= kernels.radius) {
        return 0.0;
    }
    let v = kernels.radius - dist;
    return v * v * kernels.density;
}

fn near_density_kernel(dist: f32) -> f32 {
    if (dist >= kernels.radius) {
        return 0.0;
    }
    let v = kernels.radius - dist;
    return v * v * v * kernels.near_density;
}

fn density_slope(dist: f32) -> f32 {
    if (dist >= kernels.radius) {
        return 0.0;
    }
    return -(kernels.radius - dist) * kernels.density_slope;
}

fn near_density_slope(dist: f32) -> f32 {
    if (dist >= kernels.radius) {
        return 0.0;
    }
    let v = kernels.radius - dist;
    return -v * v * kernels.near_density_slope;
}

fn viscosity_kernel(dist: f32) -> f32 {
    if (dist >= kernels.radius) {
        return 0.0;
    }
    let v = kernels.radius_sq - dist * dist;
    return v * v * v * kernels.viscosity;
}

fn pressure_from_density(density: f32) -> f32 {
    return sim.gas_constant * (density - sim.rest_density);
}

fn near_pressure_from(near_density: f32) -> f32 {
    if (sim.near_mode == 1u) {
        return sim.near_multiplier * near_density;
    }
    return pressure_from_density(near_density);
}
"#;

/// Cell rounding, hashing and neighborhood keys.
pub const HASH_WGSL: &str = r#"
const EMPTY_BUCKET: u32 = 0xffffffffu;
const HASH_P1: u32 = 73856093u;
const HASH_P2: u32 = 19349663u;

fn cell_of(position: vec2<f32>) -> vec2<i32> {
    return vec2<i32>(floor(position / sim.cell_size + vec2<f32>(0.5)));
}

fn hash_cell(cell: vec2<i32>) -> u32 {
    let c = bitcast<vec2<u32>>(cell);
    return (c.x * HASH_P1) ^ (c.y * HASH_P2);
}

fn key_of(hash: u32) -> u32 {
    return hash % sim.bucket_count;
}

struct KeySet {
    keys: array<u32, 9>,
    count: u32,
}

// Buckets of the 3x3 neighborhood, each listed once.
fn surrounding_keys(position: vec2<f32>) -> KeySet {
    var key_set: KeySet;
    key_set.count = 0u;
    let center = cell_of(position);
    for (var dy = -1; dy <= 1; dy++) {
        for (var dx = -1; dx <= 1; dx++) {
            let key = key_of(hash_cell(center + vec2<i32>(dx, dy)));
            var seen = false;
            for (var m = 0u; m < key_set.count; m++) {
                if (key_set.keys[m] == key) {
                    seen = true;
                }
            }
            if (!seen) {
                key_set.keys[key_set.count] = key;
                key_set.count += 1u;
            }
        }
    }
    return key_set;
}
"#;

/// Collider and domain resolution.
pub const COLLIDE_WGSL: &str = r#"
const COLLIDER_CIRCLE: u32 = 1u;
const COLLIDER_BOX: u32 = 2u;
const MIN_EXTENT: f32 = 0.0001;

fn resolve_circle(collider: GpuCollider, position: ptr<function, vec2<f32>>, velocity: ptr<function, vec2<f32>>) {
    let reach = max(collider.radius, MIN_EXTENT) + sim.particle_radius;
    let offset = *position - collider.center;
    let dist = length(offset);
    if (dist >= reach) {
        return;
    }
    var dir = vec2<f32>(0.0, 1.0);
    if (dist > 0.0) {
        dir = offset / dist;
    }
    *position = collider.center + dir * reach;
    *velocity = *velocity - 2.0 * dot(*velocity, dir) * dir * sim.damping;
}

fn resolve_oriented_box(collider: GpuCollider, position: ptr<function, vec2<f32>>, velocity: ptr<function, vec2<f32>>) {
    let half = max(collider.size * 0.5, vec2<f32>(MIN_EXTENT));
    let c = cos(collider.rotation);
    let s = sin(collider.rotation);
    let d = *position - collider.center;
    let v = *velocity;
    var local = vec2<f32>(c * d.x + s * d.y, -s * d.x + c * d.y);
    var local_v = vec2<f32>(c * v.x + s * v.y, -s * v.x + c * v.y);

    let reach = half + vec2<f32>(sim.particle_radius);
    if (abs(local.x) >= reach.x || abs(local.y) >= reach.y) {
        return;
    }

    let left = local.x + half.x;
    let right = half.x - local.x;
    let bottom = local.y + half.y;
    let top = half.y - local.y;
    let nearest = min(min(left, right), min(bottom, top));
    if (nearest == left) {
        local.x = -reach.x;
        local_v.x = -abs(local_v.x) * sim.damping;
    } else if (nearest == right) {
        local.x = reach.x;
        local_v.x = abs(local_v.x) * sim.damping;
    } else if (nearest == bottom) {
        local.y = -reach.y;
        local_v.y = -abs(local_v.y) * sim.damping;
    } else {
        local.y = reach.y;
        local_v.y = abs(local_v.y) * sim.damping;
    }

    *position = collider.center + vec2<f32>(c * local.x - s * local.y, s * local.x + c * local.y);
    *velocity = vec2<f32>(c * local_v.x - s * local_v.y, s * local_v.x + c * local_v.y);
}

fn resolve_bounds(position: ptr<function, vec2<f32>>, velocity: ptr<function, vec2<f32>>) {
    let lo = vec2<f32>(sim.bounds_min_x, sim.bounds_min_y) + vec2<f32>(sim.particle_radius);
    let hi = vec2<f32>(sim.bounds_max_x, sim.bounds_max_y) - vec2<f32>(sim.particle_radius);
    if ((*position).x < lo.x) {
        (*position).x = lo.x;
        (*velocity).x *= -sim.damping;
    } else if ((*position).x > hi.x) {
        (*position).x = hi.x;
        (*velocity).x *= -sim.damping;
    }
    if ((*position).y < lo.y) {
        (*position).y = lo.y;
        (*velocity).y *= -sim.damping;
    } else if ((*position).y > hi.y) {
        (*position).y = hi.y;
        (*velocity).y *= -sim.damping;
    }
}
"#;

/// Compute entry points.
pub const PASSES_WGSL: &str = r#"
@compute @workgroup_size(256)
fn predict(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= sim.particle_count) {
        return;
    }
    var p = particles[i];
    let velocity = velocity_of(p) + vec2<f32>(0.0, sim.gravity) * sim.dt;
    let predicted = position_of(p) + velocity * sim.lookahead;
    p.velocity_x = velocity.x;
    p.velocity_y = velocity.y;
    p.predicted_x = predicted.x;
    p.predicted_y = predicted.y;
    particles[i] = p;
}

@compute @workgroup_size(256)
fn write_hash_entries(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= sim.particle_count) {
        return;
    }
    for (var b = i; b < sim.bucket_count; b += sim.particle_count) {
        start_indices[b] = EMPTY_BUCKET;
    }
    let predicted = vec2<f32>(particles[i].predicted_x, particles[i].predicted_y);
    entries[i] = HashEntry(i, key_of(hash_cell(cell_of(predicted))));
}

// Runs after the entries are sorted by (cell_key, particle_index).
@compute @workgroup_size(256)
fn build_index(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= sim.particle_count) {
        return;
    }
    let key = entries[i].cell_key;
    if (i == 0u || entries[i - 1u].cell_key != key) {
        start_indices[key] = i;
    }
}

@compute @workgroup_size(256)
fn compute_density(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= sim.particle_count) {
        return;
    }
    let position = vec2<f32>(particles[i].predicted_x, particles[i].predicted_y);
    var key_set = surrounding_keys(position);
    var density = 0.0;
    var near_density = 0.0;

    for (var k = 0u; k < key_set.count; k++) {
        let key = key_set.keys[k];
        var e = start_indices[key];
        if (e == EMPTY_BUCKET) {
            continue;
        }
        loop {
            if (e >= sim.particle_count) {
                break;
            }
            let entry = entries[e];
            if (entry.cell_key != key) {
                break;
            }
            e += 1u;
            let j = entry.particle_index;
            if (j == i) {
                continue;
            }
            let offset = vec2<f32>(particles[j].predicted_x, particles[j].predicted_y) - position;
            let dist_sq = dot(offset, offset);
            if (dist_sq > kernels.radius_sq) {
                continue;
            }
            let dist = sqrt(dist_sq);
            let mass = particles[j].mass;
            density += mass * density_kernel(dist);
            near_density += mass * near_density_kernel(dist);
        }
    }

    particles[i].density = max(density, sim.epsilon);
    particles[i].near_density = max(near_density, sim.epsilon);
}

@compute @workgroup_size(256)
fn compute_forces(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= sim.particle_count) {
        return;
    }
    let me = particles[i];
    let position = predicted_of(me);
    let velocity = velocity_of(me);
    let pressure_i = pressure_from_density(me.density);
    let near_pressure_i = near_pressure_from(me.near_density);
    var key_set = surrounding_keys(position);
    var force = vec2<f32>(0.0);

    for (var k = 0u; k < key_set.count; k++) {
        let key = key_set.keys[k];
        var e = start_indices[key];
        if (e == EMPTY_BUCKET) {
            continue;
        }
        loop {
            if (e >= sim.particle_count) {
                break;
            }
            let entry = entries[e];
            if (entry.cell_key != key) {
                break;
            }
            e += 1u;
            let j = entry.particle_index;
            if (j == i) {
                continue;
            }
            let other = particles[j];
            if (other.density <= sim.epsilon) {
                continue;
            }
            let offset = predicted_of(other) - position;
            let dist_sq = dot(offset, offset);
            if (dist_sq > kernels.radius_sq) {
                continue;
            }
            let dist = sqrt(dist_sq);
            var dir = vec2<f32>(0.0, select(-1.0, 1.0, j > i));
            if (dist > 0.0) {
                dir = offset / dist;
            }
            let shared_pressure = (pressure_i + pressure_from_density(other.density)) * 0.5;
            let shared_near = (near_pressure_i + near_pressure_from(other.near_density)) * 0.5;
            force += dir * density_slope(dist) * shared_pressure * other.mass / other.density;
            force += dir * near_density_slope(dist) * shared_near * other.mass / other.near_density;
            force += sim.viscosity * other.mass * (velocity_of(other) - velocity) / other.density * viscosity_kernel(dist);
        }
    }

    var new_velocity = velocity + force / max(me.density, sim.epsilon) * sim.dt;
    if (sim.max_speed >= 0.0) {
        let speed = length(new_velocity);
        if (speed > sim.max_speed) {
            new_velocity = new_velocity * (sim.max_speed / speed);
        }
    }
    new_velocities[i] = new_velocity;
}

@compute @workgroup_size(256)
fn integrate(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= sim.particle_count) {
        return;
    }
    var p = particles[i];
    var velocity = new_velocities[i];
    var position = position_of(p) + velocity * sim.dt;

    for (var c = 0u; c < sim.collider_count; c++) {
        let collider = colliders[c];
        if (collider.kind == COLLIDER_CIRCLE) {
            resolve_circle(collider, &position, &velocity);
        } else if (collider.kind == COLLIDER_BOX) {
            resolve_oriented_box(collider, &position, &velocity);
        }
    }
    resolve_bounds(&position, &velocity);

    p.position_x = position.x;
    p.position_y = position.y;
    p.velocity_x = velocity.x;
    p.velocity_y = velocity.y;
    particles[i] = p;
}
"#;

/// The complete compute module.
pub fn compute_shader() -> String {
    [STRUCTS_WGSL, KERNELS_WGSL, HASH_WGSL, COLLIDE_WGSL, PASSES_WGSL].join("\n")
}

/// Workgroups needed to cover `particle_count` threads.
pub fn workgroup_count(particle_count: u32) -> u32 {
    particle_count.div_ceil(WORKGROUP_SIZE)
}

/// Per-step uniform block for the compute module. 80 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimUniforms {
    pub dt: f32,
    pub lookahead: f32,
    pub gravity: f32,
    pub rest_density: f32,
    pub gas_constant: f32,
    pub viscosity: f32,
    pub near_multiplier: f32,
    /// 1 when `near_multiplier` replaces the equation of state.
    pub near_mode: u32,
    pub epsilon: f32,
    pub cell_size: f32,
    pub bucket_count: u32,
    pub particle_count: u32,
    pub particle_radius: f32,
    pub damping: f32,
    pub bounds_min_x: f32,
    pub bounds_min_y: f32,
    pub bounds_max_x: f32,
    pub bounds_max_y: f32,
    pub collider_count: u32,
    /// Negative disables the cap.
    pub max_speed: f32,
}

impl SimUniforms {
    pub fn new(
        params: &FluidParams,
        bounds: Bounds,
        particle_count: u32,
        collider_count: u32,
        dt: f32,
    ) -> Self {
        Self {
            dt,
            lookahead: params.lookahead,
            gravity: params.gravity,
            rest_density: params.rest_density,
            gas_constant: params.gas_constant,
            viscosity: params.viscosity,
            near_multiplier: params.near_pressure_multiplier.unwrap_or(0.0),
            near_mode: params.near_pressure_multiplier.is_some() as u32,
            epsilon: params.epsilon(),
            cell_size: params.effective_cell_size(),
            bucket_count: params.effective_bucket_count(particle_count as usize),
            particle_count,
            particle_radius: params.particle_radius,
            damping: params.collision_damping,
            bounds_min_x: bounds.min.x,
            bounds_min_y: bounds.min.y,
            bounds_max_x: bounds.max.x,
            bounds_max_y: bounds.max.y,
            collider_count,
            max_speed: params.max_speed.map_or(-1.0, |s| s.max(0.0)),
        }
    }
}
