//! tiny_cnn: A minimal fully connected neural network over dense matrices.
//!
//! Despite the name there are no convolutions: the network is a plain
//! feed-forward stack trained by backpropagation and per-example stochastic
//! gradient descent.
//!
//! # Features
//!
//! - Dense row-major `f32` matrices with checked element access.
//! - Matrix multiply with a parallel host path and an optional GPU path
//!   (`wgpu` feature), chosen per call by a runtime capability probe.
//! - Forward pass, backward pass and in-place SGD across any number of layers.
//! - IDX (MNIST) dataset loading and a compact parameter file format.
//!
//! # Modules
//!
//! - [`matrix`] — The `Matrix` type.
//! - [`ops`] — Matrix arithmetic and multiply dispatch.
//! - [`backend`] — Runtime backend preference and offload threshold.
//! - [`activation`] — Activation and loss functions.
//! - [`network`] — The network engine.
//! - [`data`] — IDX dataset loader.
//! - [`modelio`] — Saving/loading trained parameters.
//! - [`approx`] — Tolerance comparisons.
//!
//! # Example
//!
//! ```rust
//! use tiny_cnn::{matrix, network::Network};
//!
//! let mut net = Network::new(&[1, 1]).unwrap();
//! let x = matrix![[1.0]];
//! let y = matrix![[1.0]];
//! net.train(&[x.clone()], &[y], 500, 0.1).unwrap();
//! assert!(net.predict(&x).unwrap().get(0, 0).unwrap() > 0.9);
//! ```

pub mod activation;
pub mod approx;
pub mod backend;
pub mod data;
pub mod error;
pub mod matrix;
pub mod modelio;
pub mod network;
pub mod ops;

pub use error::{CnnError, Result};
pub use matrix::Matrix;
pub use network::{Network, NetworkConfig, TrainConfig};
