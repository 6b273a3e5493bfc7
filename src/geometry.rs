//! Vector helpers used to orient water molecules.
//!
//! This module provides the small pieces of differential geometry needed by
//! the rigid-body transforms and the dimer coordinates:
//!
//! - [`normalize`], [`bisector`] and [`plane_normal`] with explicit failure on
//!   degenerate input
//! - [`spherical_angles`] of a unit vector
//! - [`euler_rotation`], the `z-y-z` Euler rotation `Rz(α)·Ry(β)·Rz(γ)`
//!
//! All angles are in radians.

use crate::error::{Result, WaterError};
use nalgebra::{Rotation3, Vector3};
use std::f64::consts::PI;

/// Norm below which a vector cannot be normalized.
const MIN_NORM: f64 = 1.0e-12;

/// Cross-product norm below which two unit vectors are treated as collinear.
pub const COLLINEAR_TOLERANCE: f64 = 1.0e-6;

/// Tolerance on the in-plane components when a unit vector lies on the z axis.
const POLE_TOLERANCE: f64 = 1.0e-12;

/// Unit vector along `v`.
///
/// # Errors
///
/// Returns [`WaterError::DegenerateGeometry`] if `v` has (near) zero length.
pub fn normalize(v: &Vector3<f64>) -> Result<Vector3<f64>> {
    v.try_normalize(MIN_NORM).ok_or_else(|| {
        WaterError::DegenerateGeometry(format!(
            "cannot normalize a vector of length {:e}",
            v.norm()
        ))
    })
}

/// Unit bisector of `v1` and `v2`.
pub fn bisector(v1: &Vector3<f64>, v2: &Vector3<f64>) -> Result<Vector3<f64>> {
    normalize(&(v1 + v2))
}

/// Unit normal of the plane spanned by `v1` and `v2`, oriented as `v1 × v2`.
///
/// # Errors
///
/// Returns [`WaterError::DegenerateGeometry`] if the vectors are collinear.
pub fn plane_normal(v1: &Vector3<f64>, v2: &Vector3<f64>) -> Result<Vector3<f64>> {
    let n = v1.cross(v2);
    if n.norm() < COLLINEAR_TOLERANCE {
        return Err(WaterError::DegenerateGeometry(
            "vectors are collinear, plane normal is undefined".to_string(),
        ));
    }
    normalize(&n)
}

/// Spherical angles `(phi, theta)` of a unit vector.
///
/// `phi` is the azimuth in `[0, 2π)` and `theta` the polar angle in `[0, π]`.
/// A vector on the z axis has `phi = 0`.
pub fn spherical_angles(u: &Vector3<f64>) -> (f64, f64) {
    let theta = u.z.clamp(-1.0, 1.0).acos();
    if u.x.abs() < POLE_TOLERANCE && u.y.abs() < POLE_TOLERANCE {
        return (0.0, theta);
    }

    let mut phi = u.y.atan2(u.x);
    if phi < 0.0 {
        phi += 2.0 * PI;
    }
    (phi, theta)
}

/// Euler rotation `R(α, β, γ) = Rz(α)·Ry(β)·Rz(γ)`.
///
/// Applied to a vector, `γ` acts first, then `β`, then `α`.
pub fn euler_rotation(alpha: f64, beta: f64, gamma: f64) -> Rotation3<f64> {
    let rz_alpha = Rotation3::from_axis_angle(&Vector3::z_axis(), alpha);
    let ry_beta = Rotation3::from_axis_angle(&Vector3::y_axis(), beta);
    let rz_gamma = Rotation3::from_axis_angle(&Vector3::z_axis(), gamma);
    rz_alpha * ry_beta * rz_gamma
}

/// Rotation that brings the unit vector `u` onto `+z`.
///
/// This is `R(0, -θ, -φ)` with `(φ, θ)` the spherical angles of `u`.
pub fn align_with_z(u: &Vector3<f64>) -> Rotation3<f64> {
    let (phi, theta) = spherical_angles(u);
    euler_rotation(0.0, -theta, -phi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zero_vector_fails() {
        assert!(matches!(
            normalize(&Vector3::zeros()),
            Err(WaterError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_plane_normal_orientation() {
        let n = plane_normal(&Vector3::x(), &Vector3::y()).unwrap();
        assert!((n - Vector3::z()).norm() < 1e-14);
    }

    #[test]
    fn test_plane_normal_collinear() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert!(matches!(
            plane_normal(&v, &(v * -2.0)),
            Err(WaterError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_spherical_angles() {
        let (phi, theta) = spherical_angles(&Vector3::new(0.0, -1.0, 0.0));
        assert!((phi - 1.5 * PI).abs() < 1e-12);
        assert!((theta - 0.5 * PI).abs() < 1e-12);

        let (phi, theta) = spherical_angles(&Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(phi, 0.0);
        assert!((theta - PI).abs() < 1e-12);
    }

    #[test]
    fn test_euler_rotation_composition() {
        // Rz(γ) acts first: x -> y, then Ry(π/2) leaves y, then Rz(0)
        let r = euler_rotation(0.0, 0.5 * PI, 0.5 * PI);
        let v = r * Vector3::x();
        assert!((v - Vector3::y()).norm() < 1e-12);

        let r = euler_rotation(0.0, 0.5 * PI, 0.0);
        let v = r * Vector3::z();
        assert!((v - Vector3::x()).norm() < 1e-12);
    }

    #[test]
    fn test_align_with_z() {
        let inputs = [
            Vector3::new(1.0, 2.0, -0.5),
            Vector3::new(-0.3, -0.1, 0.9),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        for u in inputs.iter() {
            let u = normalize(u).unwrap();
            let aligned = align_with_z(&u) * u;
            assert!(
                (aligned - Vector3::z()).norm() < 1e-12,
                "{:?} aligned to {:?}",
                u,
                aligned
            );
        }
    }
}
