//! Parallel host implementations of the matrix operations.
//!
//! # Host Backend
//!
//! These functions are what [`super::dispatch`] falls back to whenever the
//! accelerator is not selected. They assume their operands were already
//! shape-checked by the public entry points in [`super`].
//!
//! ## Features
//!
//! - Parallel execution over output rows using [`rayon`](https://docs.rs/rayon)
//! - Optional AVX2 fused multiply-add inner loop (`simd` feature flag)
//! - Pure Rust fallback path when SIMD is disabled or unavailable
//!
//! ## Safety
//!
//! - SIMD paths use `unsafe` blocks and are only compiled when the target
//!   enables AVX2 and FMA

#[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2", target_feature = "fma"))]
use core::arch::x86_64::{
    _mm256_fmadd_ps, _mm256_loadu_ps, _mm256_set_ps, _mm256_setzero_ps, _mm256_storeu_ps,
};

use rayon::prelude::*;

use crate::matrix::Matrix;

/// Computes `C = A x B` for `A: m x k` and `B: k x n` on the host.
///
/// Rows of `C` are computed in parallel; within a row, the sum over `k`
/// is sequential, so results are deterministic.
pub fn matmul(a: &Matrix, b: &Matrix) -> Matrix {
    let (m, k) = a.shape();
    let n = b.cols();
    debug_assert_eq!(k, b.rows(), "matmul shape mismatch");

    let a_data = a.as_slice();
    let b_data = b.as_slice();

    let mut out = Matrix::new(m, n);
    if n == 0 {
        return out;
    }

    out.as_mut_slice()
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| {
            let a_row = &a_data[i * k..(i + 1) * k];
            for (j, c) in row.iter_mut().enumerate() {
                *c = dot_column(a_row, b_data, j, n);
            }
        });

    out
}

#[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2", target_feature = "fma"))]
fn dot_column(a_row: &[f32], b_data: &[f32], j: usize, n: usize) -> f32 {
    let k = a_row.len();
    let mut idx = 0;
    let mut acc = unsafe { _mm256_setzero_ps() };
    while idx + 8 <= k {
        unsafe {
            let a_chunk = _mm256_loadu_ps(a_row.as_ptr().add(idx));
            let b_chunk = _mm256_set_ps(
                b_data[(idx + 7) * n + j],
                b_data[(idx + 6) * n + j],
                b_data[(idx + 5) * n + j],
                b_data[(idx + 4) * n + j],
                b_data[(idx + 3) * n + j],
                b_data[(idx + 2) * n + j],
                b_data[(idx + 1) * n + j],
                b_data[idx * n + j],
            );
            acc = _mm256_fmadd_ps(a_chunk, b_chunk, acc);
        }
        idx += 8;
    }

    let mut lanes = [0.0f32; 8];
    unsafe { _mm256_storeu_ps(lanes.as_mut_ptr(), acc) };
    let mut sum: f32 = lanes.iter().sum();

    for (l, &a) in a_row.iter().enumerate().skip(idx) {
        sum += a * b_data[l * n + j];
    }
    sum
}

#[cfg(not(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2", target_feature = "fma")))]
fn dot_column(a_row: &[f32], b_data: &[f32], j: usize, n: usize) -> f32 {
    a_row
        .iter()
        .enumerate()
        .map(|(l, &a)| a * b_data[l * n + j])
        .sum()
}

/// Element-wise combination of two equally shaped matrices.
pub fn zip_map(a: &Matrix, b: &Matrix, f: impl Fn(f32, f32) -> f32 + Sync) -> Matrix {
    let mut out = Matrix::new(a.rows(), a.cols());
    out.as_mut_slice()
        .par_iter_mut()
        .zip(a.as_slice().par_iter().zip(b.as_slice().par_iter()))
        .for_each(|(o, (&x, &y))| *o = f(x, y));
    out
}

/// Applies `f` to every element.
pub fn map(a: &Matrix, f: impl Fn(f32) -> f32 + Sync) -> Matrix {
    let mut out = a.clone();
    out.as_mut_slice().par_iter_mut().for_each(|x| *x = f(*x));
    out
}

/// In-place `w -= lr * g`, the SGD step.
pub fn sub_scaled_assign(w: &mut Matrix, g: &Matrix, lr: f32) {
    for (param, grad) in w.as_mut_slice().iter_mut().zip(g.as_slice()) {
        *param -= lr * *grad;
    }
}

/// In-place `a += b`.
pub fn add_assign(a: &mut Matrix, b: &Matrix) {
    for (x, y) in a.as_mut_slice().iter_mut().zip(b.as_slice()) {
        *x += *y;
    }
}
