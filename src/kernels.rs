//! Smoothing kernels for 2D SPH.
//!
//! Every kernel takes the smoothing radius `r` and a distance `d`, is zero for
//! `d >= r`, and reaches zero continuously at `d = r`. Normalization constants
//! are the reciprocal of the unnormalized shape integrated over a disk of
//! radius `r`, so a single particle's density contribution integrates to its
//! mass regardless of the radius.
//!
//! | Kernel        | Shape           | Normalization |
//! |---------------|-----------------|---------------|
//! | density       | `(r-d)²`        | `6 / (π r⁴)`  |
//! | near density  | `(r-d)³`        | `10 / (π r⁵)` |
//! | viscosity     | `(r²-d²)³`      | `4 / (π r⁸)`  |
//!
//! The free functions recompute the constants on every call and are meant for
//! tooling and tests. The solver uses [`KernelCoefficients`], which caches the
//! constants once per step.

use std::f32::consts::PI;

/// Density kernel `(r-d)² · 6/(π r⁴)`.
#[inline]
pub fn density_kernel(radius: f32, dist: f32) -> f32 {
    if dist >= radius {
        return 0.0;
    }
    let v = radius - dist;
    v * v * 6.0 / (PI * radius.powi(4))
}

/// Near-density kernel `(r-d)³ · 10/(π r⁵)`.
///
/// Falls off faster than [`density_kernel`]; used for the short-range
/// repulsion that keeps particles from clumping.
#[inline]
pub fn near_density_kernel(radius: f32, dist: f32) -> f32 {
    if dist >= radius {
        return 0.0;
    }
    let v = radius - dist;
    v * v * v * 10.0 / (PI * radius.powi(5))
}

/// Derivative of [`density_kernel`] with respect to `d`.
#[inline]
pub fn density_kernel_slope(radius: f32, dist: f32) -> f32 {
    if dist >= radius {
        return 0.0;
    }
    -(radius - dist) * 12.0 / (PI * radius.powi(4))
}

/// Derivative of [`near_density_kernel`] with respect to `d`.
#[inline]
pub fn near_density_kernel_slope(radius: f32, dist: f32) -> f32 {
    if dist >= radius {
        return 0.0;
    }
    let v = radius - dist;
    -v * v * 30.0 / (PI * radius.powi(5))
}

/// Viscosity weight `(r²-d²)³ · 4/(π r⁸)`.
#[inline]
pub fn viscosity_kernel(radius: f32, dist: f32) -> f32 {
    if dist >= radius {
        return 0.0;
    }
    let v = radius * radius - dist * dist;
    v * v * v * 4.0 / (PI * radius.powi(8))
}

/// Kernel constants for one smoothing radius.
///
/// The layout matches the `KernelParams` uniform in the WGSL mirror.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelCoefficients {
    pub radius: f32,
    pub radius_sq: f32,
    pub density: f32,
    pub near_density: f32,
    pub density_slope: f32,
    pub near_density_slope: f32,
    pub viscosity: f32,
    pub _padding: f32,
}

impl KernelCoefficients {
    pub fn new(radius: f32) -> Self {
        let r4 = radius.powi(4);
        let r5 = radius.powi(5);
        let r8 = r4 * r4;
        Self {
            radius,
            radius_sq: radius * radius,
            density: 6.0 / (PI * r4),
            near_density: 10.0 / (PI * r5),
            density_slope: 12.0 / (PI * r4),
            near_density_slope: 30.0 / (PI * r5),
            viscosity: 4.0 / (PI * r8),
            _padding: 0.0,
        }
    }

    #[inline]
    pub fn density(&self, dist: f32) -> f32 {
        if dist >= self.radius {
            return 0.0;
        }
        let v = self.radius - dist;
        v * v * self.density
    }

    #[inline]
    pub fn near_density(&self, dist: f32) -> f32 {
        if dist >= self.radius {
            return 0.0;
        }
        let v = self.radius - dist;
        v * v * v * self.near_density
    }

    #[inline]
    pub fn density_slope(&self, dist: f32) -> f32 {
        if dist >= self.radius {
            return 0.0;
        }
        -(self.radius - dist) * self.density_slope
    }

    #[inline]
    pub fn near_density_slope(&self, dist: f32) -> f32 {
        if dist >= self.radius {
            return 0.0;
        }
        let v = self.radius - dist;
        -v * v * self.near_density_slope
    }

    #[inline]
    pub fn viscosity(&self, dist: f32) -> f32 {
        if dist >= self.radius {
            return 0.0;
        }
        let v = self.radius_sq - dist * dist;
        v * v * v * self.viscosity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Midpoint-rule integral of a radial function over a disk.
    fn integrate_disk(radius: f32, f: impl Fn(f32) -> f32) -> f64 {
        let steps = 20_000;
        let dr = radius as f64 / steps as f64;
        (0..steps)
            .map(|i| {
                let d = (i as f64 + 0.5) * dr;
                f(d as f32) as f64 * 2.0 * std::f64::consts::PI * d * dr
            })
            .sum()
    }

    #[test]
    fn test_kernels_normalized_over_disk() {
        for radius in [0.25, 1.0, 2.5] {
            let density = integrate_disk(radius, |d| density_kernel(radius, d));
            let near = integrate_disk(radius, |d| near_density_kernel(radius, d));
            let visc = integrate_disk(radius, |d| viscosity_kernel(radius, d));
            assert!((density - 1.0).abs() < 1e-3, "density r={} -> {}", radius, density);
            assert!((near - 1.0).abs() < 1e-3, "near r={} -> {}", radius, near);
            assert!((visc - 1.0).abs() < 1e-3, "viscosity r={} -> {}", radius, visc);
        }
    }

    #[test]
    fn test_kernels_vanish_at_radius() {
        for radius in [0.1, 1.0, 3.0] {
            assert!(density_kernel(radius, 0.0) > 0.0);
            assert_eq!(density_kernel(radius, radius), 0.0);
            assert_eq!(near_density_kernel(radius, radius), 0.0);
            assert_eq!(viscosity_kernel(radius, radius), 0.0);
            assert_eq!(density_kernel_slope(radius, radius), 0.0);
            assert_eq!(near_density_kernel_slope(radius, radius), 0.0);
            assert_eq!(density_kernel(radius, radius * 2.0), 0.0);
        }
    }

    #[test]
    fn test_slopes_match_finite_differences() {
        let radius = 1.3;
        let h = 1e-3;
        for d in [0.1, 0.5, 0.9, 1.2] {
            let fd = (density_kernel(radius, d + h) - density_kernel(radius, d - h)) / (2.0 * h);
            assert!((fd - density_kernel_slope(radius, d)).abs() < 1e-3);

            let fd = (near_density_kernel(radius, d + h) - near_density_kernel(radius, d - h))
                / (2.0 * h);
            assert!((fd - near_density_kernel_slope(radius, d)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_cached_coefficients_agree() {
        let radius = 0.8;
        let k = KernelCoefficients::new(radius);
        for d in [0.0, 0.2, 0.5, 0.79, 0.8, 1.0] {
            assert!((k.density(d) - density_kernel(radius, d)).abs() < 1e-5);
            assert!((k.near_density(d) - near_density_kernel(radius, d)).abs() < 1e-5);
            assert!((k.density_slope(d) - density_kernel_slope(radius, d)).abs() < 1e-5);
            assert!(
                (k.near_density_slope(d) - near_density_kernel_slope(radius, d)).abs() < 1e-5
            );
            assert!((k.viscosity(d) - viscosity_kernel(radius, d)).abs() < 1e-5);
        }
    }
}
