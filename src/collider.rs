//! Static obstacles and the domain rectangle.
//!
//! Colliders are a closed set of shapes dispatched through one `match` in
//! [`Collider::resolve`]. Each resolution only touches the particle it is
//! given, so the collision pass can run over particles in any order.
//!
//! ```
//! use sph2d::prelude::*;
//!
//! let circle = Collider::circle(Vec2::ZERO, 1.0);
//! let mut position = Vec2::new(0.5, 0.0);
//! let mut velocity = Vec2::new(-1.0, 0.0);
//! assert!(circle.resolve(&mut position, &mut velocity, 0.1, 1.0));
//! assert!((position.x - 1.1).abs() < 1e-6);
//! assert!(velocity.x > 0.0);
//! ```

use glam::{Mat2, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest half-extent or radius a collider is clamped to.
pub const MIN_EXTENT: f32 = 1e-4;

/// GPU collider tag for an unused slot (also used for polygons).
pub const GPU_COLLIDER_INACTIVE: u32 = 0;
/// GPU collider tag for a circle.
pub const GPU_COLLIDER_CIRCLE: u32 = 1;
/// GPU collider tag for an oriented box.
pub const GPU_COLLIDER_BOX: u32 = 2;

/// A static obstacle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Collider {
    Circle {
        center: Vec2,
        radius: f32,
    },
    /// Rectangle of full extent `size`, rotated by `rotation` radians
    /// (counter-clockwise) about `center`.
    OrientedBox {
        center: Vec2,
        size: Vec2,
        #[serde(default)]
        rotation: f32,
    },
    /// Closed loop of vertices, either winding. Fewer than three vertices is
    /// a no-op.
    Polygon { vertices: Vec<Vec2> },
}

impl Collider {
    pub fn circle(center: Vec2, radius: f32) -> Self {
        Collider::Circle { center, radius }
    }

    /// Axis-aligned box.
    pub fn rect(center: Vec2, size: Vec2) -> Self {
        Collider::OrientedBox {
            center,
            size,
            rotation: 0.0,
        }
    }

    pub fn oriented_box(center: Vec2, size: Vec2, rotation: f32) -> Self {
        Collider::OrientedBox {
            center,
            size,
            rotation,
        }
    }

    pub fn polygon(vertices: impl Into<Vec<Vec2>>) -> Self {
        Collider::Polygon {
            vertices: vertices.into(),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Collider::Circle { .. } => "circle",
            Collider::OrientedBox { .. } => "box",
            Collider::Polygon { .. } => "polygon",
        }
    }

    /// Push a particle out of this collider and reflect its velocity.
    ///
    /// Returns `true` if the particle was touching the collider (closer than
    /// `particle_radius` to its surface, or inside it).
    pub fn resolve(
        &self,
        position: &mut Vec2,
        velocity: &mut Vec2,
        particle_radius: f32,
        damping: f32,
    ) -> bool {
        match self {
            Collider::Circle { center, radius } => {
                resolve_circle(*center, *radius, position, velocity, particle_radius, damping)
            }
            Collider::OrientedBox {
                center,
                size,
                rotation,
            } => resolve_box(
                *center,
                *size,
                *rotation,
                position,
                velocity,
                particle_radius,
                damping,
            ),
            Collider::Polygon { vertices } => {
                resolve_polygon(vertices, position, velocity, particle_radius, damping)
            }
        }
    }

    /// Flat record for the GPU collision pass.
    pub fn to_gpu(&self) -> GpuCollider {
        match self {
            Collider::Circle { center, radius } => GpuCollider {
                center: *center,
                size: Vec2::ZERO,
                radius: radius.max(MIN_EXTENT),
                rotation: 0.0,
                kind: GPU_COLLIDER_CIRCLE,
                _padding: 0,
            },
            Collider::OrientedBox {
                center,
                size,
                rotation,
            } => GpuCollider {
                center: *center,
                size: size.max(Vec2::splat(2.0 * MIN_EXTENT)),
                radius: 0.0,
                rotation: *rotation,
                kind: GPU_COLLIDER_BOX,
                _padding: 0,
            },
            Collider::Polygon { .. } => GpuCollider::default(),
        }
    }
}

/// Collider record shared with the WGSL mirror. 32 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuCollider {
    pub center: Vec2,
    pub size: Vec2,
    pub radius: f32,
    pub rotation: f32,
    pub kind: u32,
    pub _padding: u32,
}

/// Reflect `velocity` about the unit normal `dir`, scaled by `damping`.
#[inline]
fn reflect(velocity: Vec2, dir: Vec2, damping: f32) -> Vec2 {
    velocity - 2.0 * velocity.dot(dir) * dir * damping
}

fn resolve_circle(
    center: Vec2,
    radius: f32,
    position: &mut Vec2,
    velocity: &mut Vec2,
    particle_radius: f32,
    damping: f32,
) -> bool {
    let reach = radius.max(MIN_EXTENT) + particle_radius;
    let offset = *position - center;
    let dist = offset.length();
    if dist >= reach {
        return false;
    }
    // A particle sitting exactly on the center is pushed straight up.
    let dir = if dist > 0.0 { offset / dist } else { Vec2::Y };
    *position = center + dir * reach;
    *velocity = reflect(*velocity, dir, damping);
    true
}

fn resolve_box(
    center: Vec2,
    size: Vec2,
    rotation: f32,
    position: &mut Vec2,
    velocity: &mut Vec2,
    particle_radius: f32,
    damping: f32,
) -> bool {
    let half = (size * 0.5).max(Vec2::splat(MIN_EXTENT));
    let to_world = Mat2::from_angle(rotation);
    let to_local = to_world.transpose();

    let mut local = to_local * (*position - center);
    let mut local_velocity = to_local * *velocity;

    let reach = half + Vec2::splat(particle_radius);
    if local.x.abs() >= reach.x || local.y.abs() >= reach.y {
        return false;
    }

    // Distance from each face, measured inward: left, right, bottom, top.
    let faces = [
        local.x + half.x,
        half.x - local.x,
        local.y + half.y,
        half.y - local.y,
    ];
    let mut nearest = 0;
    for face in 1..4 {
        if faces[face] < faces[nearest] {
            nearest = face;
        }
    }

    match nearest {
        0 => {
            local.x = -reach.x;
            local_velocity.x = -local_velocity.x.abs() * damping;
        }
        1 => {
            local.x = reach.x;
            local_velocity.x = local_velocity.x.abs() * damping;
        }
        2 => {
            local.y = -reach.y;
            local_velocity.y = -local_velocity.y.abs() * damping;
        }
        _ => {
            local.y = reach.y;
            local_velocity.y = local_velocity.y.abs() * damping;
        }
    }

    *position = center + to_world * local;
    *velocity = to_world * local_velocity;
    true
}

/// Twice the signed area; positive for counter-clockwise loops.
fn signed_area2(vertices: &[Vec2]) -> f32 {
    let n = vertices.len();
    (0..n)
        .map(|i| vertices[i].perp_dot(vertices[(i + 1) % n]))
        .sum()
}

/// Even-odd point-in-polygon test.
fn contains_point(vertices: &[Vec2], p: Vec2) -> bool {
    let n = vertices.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn resolve_polygon(
    vertices: &[Vec2],
    position: &mut Vec2,
    velocity: &mut Vec2,
    particle_radius: f32,
    damping: f32,
) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let area = signed_area2(vertices);
    if area.abs() <= f32::EPSILON {
        return false;
    }
    // Outward normal of edge (a, b) is the edge rotated clockwise for a
    // counter-clockwise loop.
    let winding = area.signum();

    let p = *position;
    let mut best: Option<(f32, Vec2, Vec2)> = None;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let edge = b - a;
        let len_sq = edge.length_squared();
        if len_sq <= f32::EPSILON {
            continue;
        }
        let t = ((p - a).dot(edge) / len_sq).clamp(0.0, 1.0);
        let closest = a + edge * t;
        let dist = p.distance(closest);
        if best.map_or(true, |(d, _, _)| dist < d) {
            let normal = Vec2::new(edge.y, -edge.x).normalize() * winding;
            best = Some((dist, closest, normal));
        }
    }
    let Some((dist, closest, normal)) = best else {
        return false;
    };

    if !contains_point(vertices, p) && dist >= particle_radius {
        return false;
    }
    *position = closest + normal * particle_radius;
    *velocity = reflect(*velocity, normal, damping);
    true
}

/// Axis-aligned simulation domain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::splat(10.0),
        }
    }
}

impl Bounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Rectangle of the given size with its lower-left corner at the origin.
    pub fn from_size(size: Vec2) -> Self {
        Self {
            min: Vec2::ZERO,
            max: size,
        }
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// The rectangle particle centers are confined to.
    pub fn shrink(&self, margin: f32) -> Bounds {
        Bounds {
            min: self.min + Vec2::splat(margin),
            max: self.max - Vec2::splat(margin),
        }
    }

    /// Non-empty and finite.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmplt(self.max).all()
    }

    #[inline]
    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Clamp a particle into `[min + r, max - r]`. Every axis that was
    /// clamped has its velocity inverted and scaled by `damping`.
    pub fn resolve(
        &self,
        position: &mut Vec2,
        velocity: &mut Vec2,
        particle_radius: f32,
        damping: f32,
    ) -> bool {
        let inner = self.shrink(particle_radius);
        let mut hit = false;
        for axis in 0..2 {
            if position[axis] < inner.min[axis] {
                position[axis] = inner.min[axis];
                velocity[axis] *= -damping;
                hit = true;
            } else if position[axis] > inner.max[axis] {
                position[axis] = inner.max[axis];
                velocity[axis] *= -damping;
                hit = true;
            }
        }
        hit
    }
}
