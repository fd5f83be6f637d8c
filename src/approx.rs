//! Utilities to approximate equality of floating point matrices.
//!
//! Host and accelerated multiplies reassociate sums differently, so their
//! results are compared with a tolerance instead of `==`.

use crate::matrix::Matrix;

/// Relative tolerance at which host and accelerated multiplies must agree.
pub const MULTIPLY_TOLERANCE: f32 = 1e-4;

/// Absolute floor so that values near zero are not judged purely relatively.
pub const ABSOLUTE_FLOOR: f32 = 1e-5;

/// Checks the relative distance of two scalars.
#[must_use]
pub fn scalar_approx_eq(a: f32, b: f32, rel_tol: f32) -> bool {
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    diff <= ABSOLUTE_FLOOR || diff <= rel_tol * a.abs().max(b.abs())
}

/// Whether `a` and `b` have the same shape and every element pair is
/// within `rel_tol` relative distance.
#[must_use]
pub fn approx_eq(a: &Matrix, b: &Matrix, rel_tol: f32) -> bool {
    a.shape() == b.shape()
        && a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .all(|(&x, &y)| scalar_approx_eq(x, y, rel_tol))
}

/// Largest element-wise relative difference, or `None` if the shapes differ.
#[must_use]
pub fn max_relative_error(a: &Matrix, b: &Matrix) -> Option<f32> {
    if a.shape() != b.shape() {
        return None;
    }
    Some(
        a.as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(&x, &y)| (x - y).abs() / x.abs().max(y.abs()).max(ABSOLUTE_FLOOR))
            .fold(0.0, f32::max),
    )
}
