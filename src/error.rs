//! Error types shared by every module of the crate.
//!
//! All fallible operations return [`Result`]. Nothing is swallowed: the only
//! condition that is *not* an error is an unavailable accelerator, which
//! silently selects the host path instead.

use thiserror::Error;

/// Result type for matrix, network and I/O operations.
pub type Result<T> = std::result::Result<T, CnnError>;

/// Errors that can occur while building, training or persisting a network.
#[derive(Error, Debug)]
pub enum CnnError {
    /// Invalid topology or training hyper-parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Operand shapes are incompatible for the requested operation.
    #[error("dimension mismatch in {op}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Operation that detected the mismatch.
        op: &'static str,
        /// Shape (or count) the operation required.
        expected: String,
        /// Shape (or count) it was given.
        found: String,
    },

    /// Element access outside the matrix bounds.
    #[error("index ({row}, {col}) out of range for {rows}x{cols} matrix")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// The accelerator failed after a computation was dispatched to it.
    #[error("computation failed: {0}")]
    Computation(String),

    /// Reading or writing a dataset or model file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dataset or model file is malformed.
    #[error("malformed data: {0}")]
    Format(String),
}

impl CnnError {
    /// Builds a [`CnnError::DimensionMismatch`] from two `(rows, cols)` shapes.
    pub(crate) fn shape_mismatch(
        op: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Self {
        Self::DimensionMismatch {
            op,
            expected: format!("{}x{}", expected.0, expected.1),
            found: format!("{}x{}", found.0, found.1),
        }
    }

    /// Builds a [`CnnError::DimensionMismatch`] from two element counts.
    pub(crate) fn count_mismatch(op: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            op,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
