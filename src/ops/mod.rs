//! # Matrix Operations
//!
//! Free functions over [`Matrix`] used by the network. Each public function
//! checks operand shapes and then delegates to a backend.
//!
//! ## Submodules
//!
//! - [`cpu`] — Multi-threaded + optional SIMD host implementations
//! - [`wgpu`] *(opt-in)* — GPU compute shader for multiplication
//! - [`dispatch`] — Runtime choice between host and accelerated multiply
//!
//! Only multiplication is ever offloaded; it dominates the cost of a
//! forward/backward pass. The element-wise operations always run on the host.
//!
//! All operations except the two `*_assign` helpers are pure and return new
//! matrices.
//!
//! ## Feature Flags
//!
//! - `simd` — Enables the AVX2/FMA host inner loop
//! - `wgpu` — Enables the `wgpu` accelerated multiply
//!
//! Example:
//! ```rust
//! use tiny_cnn::{matrix, ops};
//!
//! let a = matrix![[1.0, 2.0], [3.0, 4.0]];
//! let b = matrix![[1.0, 1.0], [1.0, 1.0]];
//! let sum = ops::add(&a, &b).unwrap();
//! assert_eq!(sum.as_slice(), &[2.0f32, 3.0, 4.0, 5.0]);
//! ```

pub mod cpu;
pub mod dispatch;
#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use self::dispatch::{multiply, MultiplyStrategy};

use crate::error::{CnnError, Result};
use crate::matrix::Matrix;

fn check_same_shape(op: &'static str, a: &Matrix, b: &Matrix) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(CnnError::shape_mismatch(op, a.shape(), b.shape()));
    }
    Ok(())
}

/// Element-wise `a + b`.
///
/// # Errors
/// Returns [`CnnError::DimensionMismatch`] if the shapes differ.
pub fn add(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_same_shape("add", a, b)?;
    Ok(cpu::zip_map(a, b, |x, y| x + y))
}

/// Element-wise `a - b`.
///
/// # Errors
/// Returns [`CnnError::DimensionMismatch`] if the shapes differ.
pub fn subtract(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_same_shape("subtract", a, b)?;
    Ok(cpu::zip_map(a, b, |x, y| x - y))
}

/// Element-wise (Hadamard) product `a ⊙ b`.
///
/// # Errors
/// Returns [`CnnError::DimensionMismatch`] if the shapes differ.
pub fn hadamard(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_same_shape("hadamard", a, b)?;
    Ok(cpu::zip_map(a, b, |x, y| x * y))
}

/// Multiplies every element by `factor`.
#[must_use]
pub fn scale(a: &Matrix, factor: f32) -> Matrix {
    cpu::map(a, |x| x * factor)
}

/// Applies `f` to every element.
#[must_use]
pub fn map(a: &Matrix, f: impl Fn(f32) -> f32 + Sync) -> Matrix {
    cpu::map(a, f)
}

/// In-place `a += b`.
///
/// # Errors
/// Returns [`CnnError::DimensionMismatch`] if the shapes differ; `a` is untouched.
pub fn add_assign(a: &mut Matrix, b: &Matrix) -> Result<()> {
    check_same_shape("add_assign", a, b)?;
    cpu::add_assign(a, b);
    Ok(())
}

/// In-place SGD step `w -= lr * grad`.
///
/// # Errors
/// Returns [`CnnError::DimensionMismatch`] if the shapes differ; `w` is untouched.
pub fn sub_scaled_assign(w: &mut Matrix, grad: &Matrix, lr: f32) -> Result<()> {
    check_same_shape("sgd", w, grad)?;
    cpu::sub_scaled_assign(w, grad, lr);
    Ok(())
}
