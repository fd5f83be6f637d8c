//! Dense row-major matrices.
//!
//! # Core Matrix Type
//!
//! [`Matrix`] is the only data entity of the crate: network inputs, labels,
//! weights, biases and every intermediate activation are matrices.
//!
//! It supports:
//! - Zero-filled construction with explicit extents, or checked construction
//!   from a flat row-major buffer
//! - Bounds-checked element access returning [`CnnError::IndexOutOfRange`]
//! - Uniform random initialisation in `[-1, 1]`
//! - Transposition
//! - A borrowed contiguous view for accelerator interop
//! - The `matrix!` literal macro
//!
//! ## Invariants
//! - `data.len() == rows * cols`, always. The mutable view is a slice, so it
//!   can change values but never the length.
//! - `Matrix::default()` is the empty `0x0` matrix and is a valid value.
//!
//! ## Example
//!
//! ```rust
//! use tiny_cnn::matrix::Matrix;
//!
//! let mut m = Matrix::new(2, 3);
//! m.set(1, 2, 5.0).unwrap();
//! assert_eq!(m.get(1, 2).unwrap(), 5.0);
//! assert_eq!(m.transpose().shape(), (3, 2));
//! ```

use core::fmt;
use core::ops::{Index, IndexMut};

use rand::Rng;

use crate::error::{CnnError, Result};

/// Lower bound of the range used by [`Matrix::randomize`].
pub const INIT_MIN: f32 = -1.0;

/// Upper bound of the range used by [`Matrix::randomize`].
pub const INIT_MAX: f32 = 1.0;

/// A dense 2-D matrix of `f32` stored in row-major order.
///
/// Element `(r, c)` lives at `data[r * cols + c]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Creates a zero-filled `rows x cols` matrix.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Creates a matrix from a flat row-major buffer.
    ///
    /// # Errors
    /// Returns [`CnnError::DimensionMismatch`] if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(CnnError::count_mismatch("from_vec", rows * cols, data.len()));
        }
        Ok(Self { rows, cols, data })
    }

    /// Creates a matrix from equally sized rows.
    ///
    /// # Errors
    /// Returns [`CnnError::DimensionMismatch`] if the rows are ragged.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(CnnError::count_mismatch("from_rows", cols, row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Creates a `(values.len(), 1)` column vector.
    #[must_use]
    pub fn column(values: &[f32]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the matrix holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.rows || col >= self.cols {
            return Err(CnnError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    /// Reads element `(row, col)`.
    ///
    /// # Errors
    /// Returns [`CnnError::IndexOutOfRange`] outside the matrix bounds.
    pub fn get(&self, row: usize, col: usize) -> Result<f32> {
        self.offset(row, col).map(|i| self.data[i])
    }

    /// Mutable handle to element `(row, col)`.
    ///
    /// # Errors
    /// Returns [`CnnError::IndexOutOfRange`] outside the matrix bounds.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Result<&mut f32> {
        let i = self.offset(row, col)?;
        Ok(&mut self.data[i])
    }

    /// Writes element `(row, col)`.
    ///
    /// # Errors
    /// Returns [`CnnError::IndexOutOfRange`] outside the matrix bounds.
    pub fn set(&mut self, row: usize, col: usize, value: f32) -> Result<()> {
        *self.get_mut(row, col)? = value;
        Ok(())
    }

    /// Borrowed row-major view of the elements.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable row-major view of the elements. The length is fixed.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the matrix, returning its row-major buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Fills every element with an independent uniform value in
    /// `[INIT_MIN, INIT_MAX]` drawn from the thread-local generator.
    pub fn randomize(&mut self) {
        self.randomize_with(&mut rand::rng());
    }

    /// Same as [`Matrix::randomize`] with a caller-supplied generator,
    /// for reproducible initialisation.
    pub fn randomize_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for x in &mut self.data {
            *x = rng.random_range(INIT_MIN..=INIT_MAX);
        }
    }

    /// Returns a new `cols x rows` matrix with `out(j, i) == self(i, j)`.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut out = Self::new(self.cols, self.rows);
        for (i, row) in self.data.chunks_exact(self.cols.max(1)).enumerate() {
            for (j, &x) in row.iter().enumerate() {
                out.data[j * self.rows + i] = x;
            }
        }
        out
    }

    /// Largest element, or `None` for an empty matrix.
    ///
    /// Used to decode one-hot predictions.
    #[must_use]
    pub fn argmax(&self) -> Option<usize> {
        self.data
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f32;

    /// # Panics
    /// Panics outside the matrix bounds; use [`Matrix::get`] for a checked read.
    fn index(&self, (row, col): (usize, usize)) -> &f32 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of range for {}x{} matrix",
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    /// # Panics
    /// Panics outside the matrix bounds; use [`Matrix::get_mut`] for a checked write.
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f32 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of range for {}x{} matrix",
            self.rows,
            self.cols
        );
        &mut self.data[row * self.cols + col]
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(4);
        for row in self.data.chunks(self.cols.max(1)) {
            let mut first = true;
            for x in row {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{x:.precision$}")?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Defines a matrix from nested literal rows.
///
/// # Panics
/// Panics if the rows have different lengths.
///
/// # Example
/// ```
/// use tiny_cnn::matrix;
/// let m = matrix![[1.0, 2.0], [3.0, 4.0]];
/// assert_eq!(m.shape(), (2, 2));
/// ```
#[macro_export]
macro_rules! matrix {
    ($([ $($x:expr),* $(,)? ]),+ $(,)?) => {{
        let rows: ::std::vec::Vec<::std::vec::Vec<f32>> = vec![$(vec![$($x as f32),*]),+];
        match $crate::matrix::Matrix::from_rows(&rows) {
            Ok(m) => m,
            Err(e) => panic!("ragged matrix literal: {e}"),
        }
    }};
}
