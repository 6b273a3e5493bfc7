//! Periodic simulation cell and minimum-image geometry.
//!
//! A [`Cell`] stores the lattice vectors as the columns of a 3×3 matrix `A`
//! together with its inverse. Cartesian vectors are converted to fractional
//! coordinates with `A⁻¹`, reduced to the nearest periodic image and converted
//! back with `A`. This works for any non-singular (triclinic) cell.
//!
//! Exact half-cell offsets are rounded half to even, so a fractional component
//! of exactly `±0.5` is left unchanged.
//!
//! # Examples
//!
//! ```
//! use nalgebra::Vector3;
//! use waterpack::cell::Cell;
//!
//! let cell = Cell::cubic(10.0).unwrap();
//! let a = Vector3::new(0.5, 0.0, 0.0);
//! let b = Vector3::new(9.5, 0.0, 0.0);
//! assert!((cell.distance(&a, &b) - 1.0).abs() < 1e-12);
//! ```

use crate::error::{Result, WaterError};
use nalgebra::{Matrix3, Rotation3, Vector3};

/// Smallest accepted absolute determinant of the lattice matrix.
pub const MIN_CELL_DETERMINANT: f64 = 1.0e-6;

/// Arms shorter than this make an angle undefined.
const MIN_ARM_LENGTH: f64 = 1.0e-12;

/// Periodic simulation cell with lattice vectors stored in columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Cell {
    /// Builds a cell from a matrix whose columns are the lattice vectors.
    ///
    /// # Errors
    ///
    /// Returns [`WaterError::InvalidCell`] if the matrix contains non-finite
    /// entries or `|det(A)| <= 1e-6`.
    pub fn new(matrix: Matrix3<f64>) -> Result<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(WaterError::InvalidCell(
                "lattice matrix contains non-finite entries".to_string(),
            ));
        }

        let det = matrix.determinant();
        if det.abs() <= MIN_CELL_DETERMINANT {
            return Err(WaterError::InvalidCell(format!(
                "lattice vectors are not linearly independent (det = {:e})",
                det
            )));
        }

        let inverse = matrix.try_inverse().ok_or_else(|| {
            WaterError::InvalidCell("lattice matrix could not be inverted".to_string())
        })?;

        Ok(Self { matrix, inverse })
    }

    /// Builds a cell from its three lattice vectors.
    pub fn from_vectors(a1: Vector3<f64>, a2: Vector3<f64>, a3: Vector3<f64>) -> Result<Self> {
        Self::new(Matrix3::from_columns(&[a1, a2, a3]))
    }

    /// Builds a cubic cell with side length `side`.
    pub fn cubic(side: f64) -> Result<Self> {
        Self::new(Matrix3::from_diagonal_element(side))
    }

    /// Lattice matrix `A` (lattice vectors in columns).
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Inverse lattice matrix `A⁻¹`.
    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    /// Lattice vector `i` (0, 1 or 2).
    pub fn lattice_vector(&self, i: usize) -> Vector3<f64> {
        self.matrix.column(i).into_owned()
    }

    /// Cell volume, `|det(A)|`.
    pub fn volume(&self) -> f64 {
        self.matrix.determinant().abs()
    }

    /// Converts a cartesian vector to fractional (cell) coordinates.
    pub fn to_fractional(&self, r: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * r
    }

    /// Converts fractional coordinates back to a cartesian vector.
    pub fn to_cartesian(&self, s: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * s
    }

    /// Reduces a displacement vector to its minimum image.
    pub fn minimum_image(&self, r: &Vector3<f64>) -> Vector3<f64> {
        let s = self.to_fractional(r);
        let reduced = s - s.map(f64::round_ties_even);
        self.to_cartesian(&reduced)
    }

    /// Minimum-image displacement pointing from `from` to `to`.
    pub fn displacement(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> Vector3<f64> {
        self.minimum_image(&(to - from))
    }

    /// Minimum-image distance between two points.
    pub fn distance(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
        self.displacement(a, b).norm()
    }

    /// Angle in radians at `vertex` between the minimum-image arms to `end1` and `end2`.
    ///
    /// The cosine is clamped to `[-1, 1]` before `acos`, so the result is always
    /// within `[0, π]`.
    ///
    /// # Errors
    ///
    /// Returns [`WaterError::DegenerateGeometry`] if either arm has (near) zero length.
    pub fn angle(
        &self,
        end1: &Vector3<f64>,
        vertex: &Vector3<f64>,
        end2: &Vector3<f64>,
    ) -> Result<f64> {
        let v1 = self.displacement(vertex, end1);
        let v2 = self.displacement(vertex, end2);
        vector_angle(&v1, &v2)
    }

    /// Returns the cell carried along by a rigid rotation of its contents.
    ///
    /// Fractional coordinates of rotated atoms are unchanged in the rotated cell.
    pub fn rotated(&self, rotation: &Rotation3<f64>) -> Self {
        let r = rotation.matrix();
        Self {
            matrix: r * self.matrix,
            inverse: self.inverse * r.transpose(),
        }
    }

    /// Returns the cell mirrored through the xy plane along with its contents.
    pub fn mirrored_xy(&self) -> Self {
        let m = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        Self {
            matrix: m * self.matrix,
            inverse: self.inverse * m,
        }
    }
}

/// Angle in radians between two (non-periodic) vectors, within `[0, π]`.
///
/// # Errors
///
/// Returns [`WaterError::DegenerateGeometry`] if either vector has (near) zero length.
pub fn vector_angle(v1: &Vector3<f64>, v2: &Vector3<f64>) -> Result<f64> {
    let n1 = v1.norm();
    let n2 = v2.norm();
    if n1 < MIN_ARM_LENGTH || n2 < MIN_ARM_LENGTH {
        return Err(WaterError::DegenerateGeometry(format!(
            "cannot measure an angle with a zero-length arm (|v1| = {:e}, |v2| = {:e})",
            n1, n2
        )));
    }
    let cos = (v1.dot(v2) / (n1 * n2)).clamp(-1.0, 1.0);
    Ok(cos.acos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn triclinic() -> Cell {
        Cell::from_vectors(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(2.0, 9.0, 0.0),
            Vector3::new(1.5, -1.0, 8.0),
        )
        .unwrap()
    }

    #[test]
    fn test_singular_cell_rejected() {
        let result = Cell::from_vectors(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        );
        assert!(matches!(result, Err(WaterError::InvalidCell(_))));
        assert!(matches!(Cell::cubic(0.0), Err(WaterError::InvalidCell(_))));
        assert!(matches!(Cell::cubic(f64::NAN), Err(WaterError::InvalidCell(_))));
    }

    #[test]
    fn test_minimum_image_fractional_bounds() {
        let cell = triclinic();
        let points = [
            Vector3::new(0.3, 0.1, -0.2),
            Vector3::new(17.3, -4.2, 9.9),
            Vector3::new(-23.7, 31.0, -15.1),
            Vector3::new(5.1, 4.4, 3.9),
            Vector3::new(-0.01, 12.5, 40.2),
        ];
        for a in &points {
            for b in &points {
                let d = cell.displacement(a, b);
                let s = cell.to_fractional(&d);
                for k in 0..3 {
                    assert!(
                        s[k] >= -0.5 - 1e-12 && s[k] <= 0.5 + 1e-12,
                        "fractional component {} out of range: {}",
                        k,
                        s[k]
                    );
                }
            }
        }
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let cell = triclinic();
        let p = Vector3::new(3.3, -7.1, 12.0);
        assert_eq!(cell.distance(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_across_boundary() {
        let cell = Cell::cubic(10.0).unwrap();
        let a = Vector3::new(0.5, 9.5, 0.0);
        let b = Vector3::new(9.5, 0.5, 0.0);
        assert!((cell.distance(&a, &b) - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_distance_invariant_under_lattice_translation() {
        let cell = triclinic();
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(2.5, 1.0, 2.0);
        let shifted = b + cell.lattice_vector(0) * 2.0 - cell.lattice_vector(2) * 3.0;
        assert!((cell.distance(&a, &b) - cell.distance(&a, &shifted)).abs() < 1e-10);
    }

    #[test]
    fn test_half_cell_offset_rounds_to_even() {
        let cell = Cell::cubic(10.0).unwrap();
        let d = cell.minimum_image(&Vector3::new(5.0, -5.0, 15.0));
        assert!((d.x - 5.0).abs() < 1e-12);
        assert!((d.y + 5.0).abs() < 1e-12);
        // 1.5 rounds to 2
        assert!((d.z + 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_angle_symmetric_and_bounded() {
        let cell = triclinic();
        let v = Vector3::new(1.0, 1.0, 1.0);
        let a = Vector3::new(2.0, 1.0, 1.0);
        let b = Vector3::new(1.0, 2.0, 1.0);
        let ab = cell.angle(&a, &v, &b).unwrap();
        let ba = cell.angle(&b, &v, &a).unwrap();
        assert!((ab - ba).abs() < 1e-14);
        assert!((ab - PI / 2.0).abs() < 1e-12);

        let c = Vector3::new(0.0, 1.0, 1.0);
        let straight = cell.angle(&a, &v, &c).unwrap();
        assert!((0.0..=PI).contains(&straight));
        assert!((straight - PI).abs() < 1e-7);
    }

    #[test]
    fn test_angle_degenerate_arm() {
        let cell = Cell::cubic(10.0).unwrap();
        let v = Vector3::new(1.0, 1.0, 1.0);
        let a = Vector3::new(2.0, 1.0, 1.0);
        let result = cell.angle(&v, &v, &a);
        assert!(matches!(result, Err(WaterError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_rotated_cell_preserves_fractional_coordinates() {
        let cell = triclinic();
        let rotation = Rotation3::from_euler_angles(0.3, -1.1, 2.0);
        let rotated = cell.rotated(&rotation);
        let r = Vector3::new(4.0, -2.0, 7.5);
        let s_before = cell.to_fractional(&r);
        let s_after = rotated.to_fractional(&(rotation * r));
        assert!((s_before - s_after).norm() < 1e-12);
        assert!((rotated.volume() - cell.volume()).abs() < 1e-9);
    }

    #[test]
    fn test_mirrored_cell_preserves_fractional_coordinates() {
        let cell = triclinic();
        let mirrored = cell.mirrored_xy();
        let mirror = |v: &Vector3<f64>| Vector3::new(v.x, v.y, -v.z);
        let r = Vector3::new(4.0, -2.0, 7.5);
        let s_before = cell.to_fractional(&r);
        let s_after = mirrored.to_fractional(&mirror(&r));
        assert!((s_before - s_after).norm() < 1e-12);
        assert!((mirrored.volume() - cell.volume()).abs() < 1e-9);

        let a = Vector3::new(0.5, 9.0, -3.0);
        let b = Vector3::new(-1.0, 0.2, 6.0);
        let d_before = cell.distance(&a, &b);
        let d_after = mirrored.distance(&mirror(&a), &mirror(&b));
        assert!((d_before - d_after).abs() < 1e-12);
    }
}
