//! Activation and loss functions.
//!
//! The network applies one [`Activation`] after every layer and scores its
//! output with one [`Loss`]. The defaults are `Sigmoid` and `CrossEntropy`:
//! for a sigmoid output unit, the gradient of binary cross-entropy with
//! respect to the pre-activation is exactly `prediction - label`, so the
//! output error needs no derivative term.

use crate::error::{CnnError, Result};
use crate::matrix::Matrix;
use crate::ops;

/// Predictions are clamped to `[EPS, 1 - EPS]` before taking logarithms.
const EPS: f32 = 1e-7;

/// Element-wise non-linearity applied after each layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Activation {
    /// `1 / (1 + e^-x)`
    #[default]
    Sigmoid = 0,
    /// `tanh(x)`
    Tanh = 1,
}

impl Activation {
    /// Scalar value at `x`.
    #[must_use]
    pub fn value(self, x: f32) -> f32 {
        match self {
            Self::Sigmoid => sigmoid(x),
            Self::Tanh => x.tanh(),
        }
    }

    /// Scalar derivative at pre-activation `x`.
    #[must_use]
    pub fn derivative(self, x: f32) -> f32 {
        match self {
            Self::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Self::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
        }
    }

    /// Applies the activation to every element of `z`.
    #[must_use]
    pub fn apply(self, z: &Matrix) -> Matrix {
        ops::map(z, move |x| self.value(x))
    }

    /// Derivative evaluated at every element of the pre-activation `z`.
    #[must_use]
    pub fn gradient(self, z: &Matrix) -> Matrix {
        ops::map(z, move |x| self.derivative(x))
    }
}

impl TryFrom<u8> for Activation {
    type Error = CnnError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Sigmoid),
            1 => Ok(Self::Tanh),
            _ => Err(CnnError::Format(format!("unknown activation tag {tag}"))),
        }
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Loss minimised by training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Loss {
    /// Binary cross-entropy per output unit. Only valid with a sigmoid output.
    #[default]
    CrossEntropy = 0,
    /// `0.5 * Σ (prediction - label)^2`
    SquaredError = 1,
}

impl Loss {
    /// Rejects pairings whose output range the loss cannot score.
    ///
    /// # Errors
    /// [`CnnError::Configuration`] for cross-entropy on a non-sigmoid output.
    pub fn check_compatible(self, activation: Activation) -> Result<()> {
        if self == Self::CrossEntropy && activation != Activation::Sigmoid {
            return Err(CnnError::Configuration(format!(
                "cross-entropy loss requires a sigmoid output, got {activation:?}"
            )));
        }
        Ok(())
    }

    /// Scalar loss of one prediction against its label.
    ///
    /// # Errors
    /// [`CnnError::DimensionMismatch`] if the shapes differ.
    pub fn value(self, prediction: &Matrix, label: &Matrix) -> Result<f32> {
        if prediction.shape() != label.shape() {
            return Err(CnnError::shape_mismatch("loss", label.shape(), prediction.shape()));
        }
        let pairs = prediction.as_slice().iter().zip(label.as_slice());
        Ok(match self {
            Self::CrossEntropy => pairs
                .map(|(&a, &y)| {
                    let a = a.clamp(EPS, 1.0 - EPS);
                    -(y * a.ln() + (1.0 - y) * (1.0 - a).ln())
                })
                .sum(),
            Self::SquaredError => 0.5 * pairs.map(|(&a, &y)| (a - y) * (a - y)).sum::<f32>(),
        })
    }

    /// Gradient of the loss with respect to the output pre-activation `z`.
    ///
    /// # Errors
    /// [`CnnError::DimensionMismatch`] if the shapes differ.
    pub fn output_error(
        self,
        activation: Activation,
        z: &Matrix,
        prediction: &Matrix,
        label: &Matrix,
    ) -> Result<Matrix> {
        let error = ops::subtract(prediction, label)?;
        match self {
            Self::CrossEntropy => Ok(error),
            Self::SquaredError => ops::hadamard(&error, &activation.gradient(z)),
        }
    }
}

impl TryFrom<u8> for Loss {
    type Error = CnnError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::CrossEntropy),
            1 => Ok(Self::SquaredError),
            _ => Err(CnnError::Format(format!("unknown loss tag {tag}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_derivative_matches_finite_difference() {
        let h = 1e-3;
        for &x in &[-3.0f32, -0.5, 0.0, 0.7, 2.5] {
            for act in [Activation::Sigmoid, Activation::Tanh] {
                let numeric = (act.value(x + h) - act.value(x - h)) / (2.0 * h);
                assert!((numeric - act.derivative(x)).abs() < 1e-3, "{act:?} at {x}");
            }
        }
    }

    #[test]
    fn cross_entropy_requires_sigmoid() {
        assert!(Loss::CrossEntropy.check_compatible(Activation::Sigmoid).is_ok());
        assert!(matches!(
            Loss::CrossEntropy.check_compatible(Activation::Tanh),
            Err(CnnError::Configuration(_))
        ));
        assert!(Loss::SquaredError.check_compatible(Activation::Tanh).is_ok());
    }

    #[test]
    fn squared_error_value() {
        let p = Matrix::column(&[1.0, 2.0]);
        let y = Matrix::column(&[0.0, 0.0]);
        assert_eq!(Loss::SquaredError.value(&p, &y).unwrap(), 2.5);
    }
}
