//! Multiply strategy selection.
//!
//! Every multiplication chooses a [`MultiplyStrategy`] at call time:
//!
//! 1. `Cpu` preference → `Host`
//! 2. `wgpu` feature not compiled, or no GPU context → `Host`
//! 3. Operands larger than the device limits → `Host`
//! 4. `Auto` preference and any dimension below the offload threshold → `Host`
//! 5. Otherwise → `Accelerated`
//!
//! The probe never fails: an unavailable accelerator is a policy fallback.
//! Once the accelerated path has been chosen, a device failure is reported
//! as [`CnnError::Computation`] and is *not* retried on the host.
//!
//! # Example
//! ```rust
//! use tiny_cnn::matrix;
//! use tiny_cnn::ops::dispatch::MultiplyStrategy;
//!
//! let a = matrix![[1.0, 2.0], [3.0, 4.0]];
//! let b = matrix![[5.0], [6.0]];
//! let c = MultiplyStrategy::Host.multiply(&a, &b).unwrap();
//! assert_eq!(c.as_slice(), &[17.0f32, 39.0]);
//! ```

use crate::backend::{get_backend, offload_threshold, Backend};
use crate::error::{CnnError, Result};
use crate::matrix::Matrix;

/// Execution path for one matrix multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplyStrategy {
    /// Parallel host implementation in [`super::cpu`].
    Host,
    /// Compute shader dispatched through `wgpu`.
    Accelerated,
}

impl MultiplyStrategy {
    /// Probes the backend preference and the accelerator for `a x b`.
    #[must_use]
    pub fn select(a: &Matrix, b: &Matrix) -> Self {
        let backend = get_backend();
        if backend == Backend::Cpu {
            return Self::Host;
        }

        let (m, k) = a.shape();
        let n = b.cols();
        if backend == Backend::Auto && m.min(k).min(n) < offload_threshold() {
            return Self::Host;
        }

        if accelerator_fits(m, k, n) {
            log::debug!("offloading {m}x{k} * {k}x{n} multiply");
            Self::Accelerated
        } else {
            Self::Host
        }
    }

    /// Multiplies `a x b` along this path.
    ///
    /// # Errors
    ///
    /// - [`CnnError::DimensionMismatch`] if `a.cols() != b.rows()`
    /// - [`CnnError::Computation`] if the accelerated path fails or is unavailable
    pub fn multiply(self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_inner(a, b)?;
        match self {
            Self::Host => Ok(super::cpu::matmul(a, b)),
            Self::Accelerated => accelerated_matmul(a, b),
        }
    }
}

/// Dispatches `a x b` to the strategy chosen by [`MultiplyStrategy::select`].
///
/// # Errors
///
/// - [`CnnError::DimensionMismatch`] if `a.cols() != b.rows()`
/// - [`CnnError::Computation`] if the accelerated path was chosen and failed
pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_inner(a, b)?;
    MultiplyStrategy::select(a, b).multiply(a, b)
}

fn check_inner(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(CnnError::DimensionMismatch {
            op: "multiply",
            expected: format!("{} rows in right operand", a.cols()),
            found: format!("{}x{}", b.rows(), b.cols()),
        });
    }
    Ok(())
}

#[cfg(feature = "wgpu")]
fn accelerator_fits(m: usize, k: usize, n: usize) -> bool {
    m > 0
        && k > 0
        && n > 0
        && super::wgpu::context().is_some_and(|ctx| ctx.fits(m, k, n))
}

#[cfg(not(feature = "wgpu"))]
const fn accelerator_fits(_m: usize, _k: usize, _n: usize) -> bool {
    false
}

#[cfg(feature = "wgpu")]
fn accelerated_matmul(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    super::wgpu::matmul(a, b).map_err(|e| CnnError::Computation(e.to_string()))
}

#[cfg(not(feature = "wgpu"))]
fn accelerated_matmul(_a: &Matrix, _b: &Matrix) -> Result<Matrix> {
    Err(CnnError::Computation(
        "accelerated multiply requested but the `wgpu` feature is not enabled".into(),
    ))
}
