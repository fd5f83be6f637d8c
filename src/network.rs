//! Fully connected feed-forward network trained by per-example SGD.
//!
//! # Network Engine
//!
//! A [`Network`] owns one weight matrix and one bias column per transition
//! between adjacent layer sizes, stored in a flat `Vec<Layer>` indexed by
//! layer position.
//!
//! ## Forward pass
//!
//! Inputs are `(layer_sizes[0], 1)` column vectors. For every layer `i`:
//!
//! ```text
//! z_i = W_i · a_{i-1} + b_i
//! a_i = act(z_i)
//! ```
//!
//! ## Backward pass
//!
//! For one `(input, label)` pair the output error is the loss gradient with
//! respect to `z_L` (`prediction - label` for the default sigmoid +
//! cross-entropy pairing). It is propagated towards the input with
//!
//! ```text
//! grad_W_i = delta_i · a_{i-1}ᵀ
//! grad_b_i = delta_i
//! delta_{i-1} = (W_iᵀ · delta_i) ⊙ act'(z_{i-1})
//! ```
//!
//! All gradients of an example are computed from the pre-update weights
//! before any parameter is touched, then applied as
//! `W_i -= lr · grad_W_i`, `b_i -= lr · grad_b_i`.
//!
//! ## Example
//!
//! ```rust
//! use tiny_cnn::{matrix, network::Network};
//!
//! let mut net = Network::new(&[2, 3, 1]).unwrap();
//! let inputs = vec![matrix![[1.0], [0.0]]];
//! let labels = vec![matrix![[1.0]]];
//! net.train(&inputs, &labels, 100, 0.1).unwrap();
//! assert_eq!(net.predict(&inputs[0]).unwrap().shape(), (1, 1));
//! ```

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::activation::{Activation, Loss};
use crate::error::{CnnError, Result};
use crate::matrix::Matrix;
use crate::ops;

/// Topology and function choices for a new [`Network`].
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Neurons per layer, input first. At least two entries, all positive.
    pub layer_sizes: Vec<usize>,
    /// Non-linearity applied after every layer.
    pub activation: Activation,
    /// Loss minimised by [`Network::train`].
    pub loss: Loss,
    /// Seed for parameter initialisation; `None` draws a fresh one.
    pub seed: Option<u64>,
}

impl NetworkConfig {
    /// Default activation and loss with the given topology.
    pub fn new(layer_sizes: impl Into<Vec<usize>>) -> Self {
        Self {
            layer_sizes: layer_sizes.into(),
            activation: Activation::default(),
            loss: Loss::default(),
            seed: None,
        }
    }

    /// Sets the activation.
    #[must_use]
    pub const fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Sets the loss.
    #[must_use]
    pub const fn loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Fixes the initialisation seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Hyper-parameters of one [`Network::train_with`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    /// Passes over the dataset. Zero is a valid no-op.
    pub epochs: usize,
    /// SGD step size. Must be finite and positive.
    pub learning_rate: f32,
    /// Visit examples in a fresh random order each epoch instead of the given order.
    pub shuffle: bool,
    /// Seed for the shuffling order; `None` draws a fresh one.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            learning_rate: 0.1,
            shuffle: false,
            seed: None,
        }
    }
}

/// Summary returned by training.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    /// Number of epochs run.
    pub epochs: usize,
    /// Mean per-example loss of each epoch, measured before that example's update.
    pub mean_loss: Vec<f32>,
}

/// Result of scoring a network on labelled data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Evaluation {
    /// Mean per-example loss.
    pub loss: f32,
    /// Fraction of examples classified correctly, in `[0, 1]`.
    pub accuracy: f32,
}

/// Weight and bias of one layer transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    weights: Matrix,
    bias: Matrix,
}

impl Layer {
    /// Pairs a `(out, in)` weight matrix with an `(out, 1)` bias.
    ///
    /// # Errors
    /// [`CnnError::DimensionMismatch`] if the bias is not `(weights.rows(), 1)`.
    pub fn new(weights: Matrix, bias: Matrix) -> Result<Self> {
        if bias.shape() != (weights.rows(), 1) {
            return Err(CnnError::shape_mismatch("layer bias", (weights.rows(), 1), bias.shape()));
        }
        Ok(Self { weights, bias })
    }

    /// `(out, in)` weight matrix.
    #[must_use]
    pub const fn weights(&self) -> &Matrix {
        &self.weights
    }

    /// `(out, 1)` bias column.
    #[must_use]
    pub const fn bias(&self) -> &Matrix {
        &self.bias
    }
}

/// Every pre-activation `z_i` and post-activation `a_i` of one forward pass.
///
/// `post[0]` is the input, so `post.len() == pre.len() + 1`.
struct ForwardTrace {
    pre: Vec<Matrix>,
    post: Vec<Matrix>,
}

/// A fully connected feed-forward network.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layer_sizes: Vec<usize>,
    layers: Vec<Layer>,
    activation: Activation,
    loss: Loss,
}

impl Network {
    /// Creates a network with the default activation and loss and randomly
    /// initialised parameters in `[-1, 1]`.
    ///
    /// # Errors
    /// [`CnnError::Configuration`] if fewer than two sizes are given or any is zero.
    pub fn new(layer_sizes: &[usize]) -> Result<Self> {
        Self::with_config(NetworkConfig::new(layer_sizes))
    }

    /// Creates a network from a full [`NetworkConfig`].
    ///
    /// # Errors
    /// [`CnnError::Configuration`] for an invalid topology or an incompatible
    /// activation/loss pairing.
    pub fn with_config(config: NetworkConfig) -> Result<Self> {
        check_topology(&config.layer_sizes)?;
        config.loss.check_compatible(config.activation)?;

        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        let layers = config
            .layer_sizes
            .windows(2)
            .map(|pair| random_layer(pair[0], pair[1], &mut rng))
            .collect();

        log::info!(
            "network {:?} ({:?}, {:?})",
            config.layer_sizes,
            config.activation,
            config.loss
        );

        Ok(Self {
            layer_sizes: config.layer_sizes,
            layers,
            activation: config.activation,
            loss: config.loss,
        })
    }

    /// Rebuilds a network from explicit parameters.
    ///
    /// # Errors
    /// - [`CnnError::Configuration`] for an invalid topology or pairing
    /// - [`CnnError::DimensionMismatch`] if the layers do not match the topology
    pub fn from_layers(
        layer_sizes: Vec<usize>,
        layers: Vec<Layer>,
        activation: Activation,
        loss: Loss,
    ) -> Result<Self> {
        check_topology(&layer_sizes)?;
        loss.check_compatible(activation)?;
        if layers.len() != layer_sizes.len() - 1 {
            return Err(CnnError::count_mismatch("layers", layer_sizes.len() - 1, layers.len()));
        }
        for (pair, layer) in layer_sizes.windows(2).zip(&layers) {
            let expected = (pair[1], pair[0]);
            if layer.weights.shape() != expected {
                return Err(CnnError::shape_mismatch("layer weights", expected, layer.weights.shape()));
            }
        }
        Ok(Self {
            layer_sizes,
            layers,
            activation,
            loss,
        })
    }

    /// Neurons per layer, input first.
    #[must_use]
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    /// Parameters, one entry per layer transition.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Activation applied after each layer.
    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    /// Loss minimised by training.
    #[must_use]
    pub const fn loss(&self) -> Loss {
        self.loss
    }

    /// Total number of weights and biases.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.weights.len() + l.bias.len()).sum()
    }

    fn input_shape(&self) -> (usize, usize) {
        (self.layer_sizes[0], 1)
    }

    fn output_shape(&self) -> (usize, usize) {
        (self.layer_sizes[self.layer_sizes.len() - 1], 1)
    }

    /// Runs one forward pass. Parameters are not modified.
    ///
    /// # Errors
    /// - [`CnnError::DimensionMismatch`] if `input` is not `(layer_sizes[0], 1)`
    /// - [`CnnError::Computation`] if an accelerated multiply fails
    pub fn predict(&self, input: &Matrix) -> Result<Matrix> {
        self.check_input(input)?;
        let mut a = input.clone();
        for layer in &self.layers {
            let z = self.pre_activation(layer, &a)?;
            a = self.activation.apply(&z);
        }
        Ok(a)
    }

    fn pre_activation(&self, layer: &Layer, a: &Matrix) -> Result<Matrix> {
        let mut z = ops::multiply(&layer.weights, a)?;
        ops::add_assign(&mut z, &layer.bias)?;
        Ok(z)
    }

    fn forward(&self, input: &Matrix) -> Result<ForwardTrace> {
        let mut pre = Vec::with_capacity(self.layers.len());
        let mut post = Vec::with_capacity(self.layers.len() + 1);
        post.push(input.clone());

        for layer in &self.layers {
            let z = self.pre_activation(layer, &post[post.len() - 1])?;
            post.push(self.activation.apply(&z));
            pre.push(z);
        }

        Ok(ForwardTrace { pre, post })
    }

    /// Trains on `(inputs[i], labels[i])` pairs in the given order.
    ///
    /// # Errors
    /// See [`Network::train_with`].
    pub fn train(
        &mut self,
        inputs: &[Matrix],
        labels: &[Matrix],
        epochs: usize,
        learning_rate: f32,
    ) -> Result<TrainReport> {
        self.train_with(
            inputs,
            labels,
            &TrainConfig {
                epochs,
                learning_rate,
                ..TrainConfig::default()
            },
        )
    }

    /// Trains with per-example stochastic gradient descent.
    ///
    /// Every argument is validated before the first update. A failure in the
    /// middle of training aborts the call; updates of earlier examples remain
    /// applied, the failing example's update is not.
    ///
    /// # Errors
    /// - [`CnnError::Configuration`] if the learning rate is not finite and positive
    /// - [`CnnError::DimensionMismatch`] if counts differ or any input/label has
    ///   the wrong shape
    /// - [`CnnError::Computation`] if an accelerated multiply fails
    pub fn train_with(
        &mut self,
        inputs: &[Matrix],
        labels: &[Matrix],
        config: &TrainConfig,
    ) -> Result<TrainReport> {
        if !config.learning_rate.is_finite() || config.learning_rate <= 0.0 {
            return Err(CnnError::Configuration(format!(
                "learning rate must be finite and positive, got {}",
                config.learning_rate
            )));
        }
        self.check_dataset(inputs, labels)?;

        let mut report = TrainReport {
            epochs: config.epochs,
            mean_loss: Vec::with_capacity(config.epochs),
        };
        if config.epochs == 0 {
            return Ok(report);
        }

        log::info!(
            "training on {} examples for {} epochs (lr {})",
            inputs.len(),
            config.epochs,
            config.learning_rate
        );

        let mut order: Vec<usize> = (0..inputs.len()).collect();
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));

        for epoch in 0..config.epochs {
            if config.shuffle {
                order.shuffle(&mut rng);
            }

            let mut total = 0.0;
            for &i in &order {
                total += self.backward(&inputs[i], &labels[i], config.learning_rate)?;
            }

            let mean = if order.is_empty() {
                0.0
            } else {
                total / order.len() as f32
            };
            log::debug!("epoch {}/{}: mean loss {mean:.6}", epoch + 1, config.epochs);
            report.mean_loss.push(mean);
        }

        log::info!(
            "training finished, final mean loss {:.6}",
            report.mean_loss.last().copied().unwrap_or_default()
        );
        Ok(report)
    }

    /// One SGD step on a single example. Returns the example's loss before the update.
    fn backward(&mut self, input: &Matrix, label: &Matrix, learning_rate: f32) -> Result<f32> {
        let started = log::log_enabled!(log::Level::Trace).then(Instant::now);

        let ForwardTrace { pre, post } = self.forward(input)?;
        let last = self.layers.len() - 1;
        let prediction = &post[last + 1];
        let loss = self.loss.value(prediction, label)?;

        let mut delta = self
            .loss
            .output_error(self.activation, &pre[last], prediction, label)?;

        let mut gradients = Vec::with_capacity(self.layers.len());
        for i in (0..self.layers.len()).rev() {
            let grad_w = ops::multiply(&delta, &post[i].transpose())?;
            let next = if i > 0 {
                let back = ops::multiply(&self.layers[i].weights.transpose(), &delta)?;
                Some(ops::hadamard(&back, &self.activation.gradient(&pre[i - 1]))?)
            } else {
                None
            };
            gradients.push((grad_w, delta));
            match next {
                Some(d) => delta = d,
                None => break,
            }
        }

        for (layer, (grad_w, grad_b)) in self.layers.iter_mut().rev().zip(&gradients) {
            ops::sub_scaled_assign(&mut layer.weights, grad_w, learning_rate)?;
            ops::sub_scaled_assign(&mut layer.bias, grad_b, learning_rate)?;
        }

        if let Some(t) = started {
            log::trace!(
                "example step: loss {loss:.6} in {:.3}ms",
                t.elapsed().as_secs_f64() * 1000.0
            );
        }
        Ok(loss)
    }

    /// Mean loss and classification accuracy over a labelled dataset.
    ///
    /// With a single output unit an example counts as correct when prediction
    /// and label fall on the same side of 0.5; otherwise the arg-max of
    /// prediction and label must agree.
    ///
    /// # Errors
    /// Same shape errors as [`Network::train_with`].
    pub fn evaluate(&self, inputs: &[Matrix], labels: &[Matrix]) -> Result<Evaluation> {
        self.check_dataset(inputs, labels)?;
        if inputs.is_empty() {
            return Ok(Evaluation::default());
        }

        let mut loss = 0.0;
        let mut correct = 0usize;
        for (input, label) in inputs.iter().zip(labels) {
            let prediction = self.predict(input)?;
            loss += self.loss.value(&prediction, label)?;
            let hit = if prediction.len() == 1 {
                (prediction.as_slice()[0] >= 0.5) == (label.as_slice()[0] >= 0.5)
            } else {
                prediction.argmax() == label.argmax()
            };
            correct += usize::from(hit);
        }

        let n = inputs.len() as f32;
        Ok(Evaluation {
            loss: loss / n,
            accuracy: correct as f32 / n,
        })
    }

    fn check_input(&self, input: &Matrix) -> Result<()> {
        if input.shape() != self.input_shape() {
            return Err(CnnError::shape_mismatch("input", self.input_shape(), input.shape()));
        }
        Ok(())
    }

    fn check_dataset(&self, inputs: &[Matrix], labels: &[Matrix]) -> Result<()> {
        if inputs.len() != labels.len() {
            return Err(CnnError::count_mismatch("dataset", inputs.len(), labels.len()));
        }
        for (input, label) in inputs.iter().zip(labels) {
            self.check_input(input)?;
            if label.shape() != self.output_shape() {
                return Err(CnnError::shape_mismatch("label", self.output_shape(), label.shape()));
            }
        }
        Ok(())
    }
}

fn check_topology(layer_sizes: &[usize]) -> Result<()> {
    if layer_sizes.len() < 2 {
        return Err(CnnError::Configuration(format!(
            "need at least 2 layer sizes, got {}",
            layer_sizes.len()
        )));
    }
    if let Some(pos) = layer_sizes.iter().position(|&s| s == 0) {
        return Err(CnnError::Configuration(format!("layer {pos} has size 0")));
    }
    Ok(())
}

fn random_layer<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Layer {
    let mut weights = Matrix::new(outputs, inputs);
    let mut bias = Matrix::new(outputs, 1);
    weights.randomize_with(rng);
    bias.randomize_with(rng);
    Layer { weights, bias }
}
