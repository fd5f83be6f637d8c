use tiny_cnn::activation::{Activation, Loss};
use tiny_cnn::matrix::Matrix;
use tiny_cnn::network::{Layer, Network, NetworkConfig, TrainConfig};
use tiny_cnn::{matrix, CnnError};

fn xor_data() -> (Vec<Matrix>, Vec<Matrix>) {
    let inputs = vec![
        matrix![[0.0], [0.0]],
        matrix![[0.0], [1.0]],
        matrix![[1.0], [0.0]],
        matrix![[1.0], [1.0]],
    ];
    let labels = vec![matrix![[0.0]], matrix![[1.0]], matrix![[1.0]], matrix![[0.0]]];
    (inputs, labels)
}

#[test]
fn test_new_builds_layer_shapes() {
    let net = Network::new(&[3, 5, 2]).unwrap();
    assert_eq!(net.layer_sizes(), &[3, 5, 2]);
    assert_eq!(net.layers().len(), 2);
    assert_eq!(net.layers()[0].weights().shape(), (5, 3));
    assert_eq!(net.layers()[0].bias().shape(), (5, 1));
    assert_eq!(net.layers()[1].weights().shape(), (2, 5));
    assert_eq!(net.parameter_count(), 5 * 3 + 5 + 2 * 5 + 2);
    for layer in net.layers() {
        assert!(layer.weights().as_slice().iter().all(|w| (-1.0..=1.0).contains(w)));
    }
}

#[test]
fn test_invalid_topology() {
    assert!(matches!(Network::new(&[]), Err(CnnError::Configuration(_))));
    assert!(matches!(Network::new(&[4]), Err(CnnError::Configuration(_))));
    assert!(matches!(Network::new(&[2, 0, 1]), Err(CnnError::Configuration(_))));
}

#[test]
fn test_cross_entropy_requires_sigmoid() {
    let config = NetworkConfig::new([2, 1]).activation(Activation::Tanh);
    assert!(matches!(Network::with_config(config), Err(CnnError::Configuration(_))));

    let config = NetworkConfig::new([2, 1])
        .activation(Activation::Tanh)
        .loss(Loss::SquaredError);
    assert!(Network::with_config(config).is_ok());
}

#[test]
fn test_seeded_networks_are_identical() {
    let a = Network::with_config(NetworkConfig::new([4, 3, 2]).seed(11)).unwrap();
    let b = Network::with_config(NetworkConfig::new([4, 3, 2]).seed(11)).unwrap();
    let c = Network::with_config(NetworkConfig::new([4, 3, 2]).seed(12)).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_predict_known_parameters() {
    let layer = Layer::new(matrix![[0.0, 0.0]], matrix![[0.0]]).unwrap();
    let net = Network::from_layers(vec![2, 1], vec![layer], Activation::Sigmoid, Loss::CrossEntropy)
        .unwrap();
    let out = net.predict(&matrix![[3.0], [-7.0]]).unwrap();
    assert_eq!(out.shape(), (1, 1));
    assert!((out.get(0, 0).unwrap() - 0.5).abs() < 1e-6);
}

#[test]
fn test_predict_does_not_mutate() {
    let net = Network::with_config(NetworkConfig::new([3, 4, 2]).seed(5)).unwrap();
    let before = net.clone();
    let x = matrix![[0.1], [0.2], [0.3]];
    let first = net.predict(&x).unwrap();
    let second = net.predict(&x).unwrap();
    assert_eq!(first, second);
    assert_eq!(net, before);
    assert!(first.as_slice().iter().all(|&v| v > 0.0 && v < 1.0));
}

#[test]
fn test_predict_wrong_input_shape() {
    let net = Network::new(&[3, 2]).unwrap();
    assert!(matches!(
        net.predict(&Matrix::column(&[1.0, 2.0])),
        Err(CnnError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        net.predict(&Matrix::new(1, 3)),
        Err(CnnError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_from_layers_rejects_wrong_shapes() {
    let layer = Layer::new(Matrix::new(2, 2), Matrix::new(2, 1)).unwrap();
    assert!(matches!(
        Network::from_layers(vec![3, 2], vec![layer.clone()], Activation::Sigmoid, Loss::CrossEntropy),
        Err(CnnError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        Network::from_layers(vec![2, 2, 2], vec![layer], Activation::Sigmoid, Loss::CrossEntropy),
        Err(CnnError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        Layer::new(Matrix::new(2, 2), Matrix::new(1, 1)),
        Err(CnnError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_single_weight_converges() {
    let mut net = Network::new(&[1, 1]).unwrap();
    let x = matrix![[1.0]];
    let y = matrix![[1.0]];

    let report = net.train(&[x.clone()], &[y], 2000, 0.1).unwrap();

    assert_eq!(report.epochs, 2000);
    assert_eq!(report.mean_loss.len(), 2000);
    for pair in report.mean_loss.windows(2) {
        assert!(pair[1] <= pair[0]);
    }
    let out = net.predict(&x).unwrap().get(0, 0).unwrap();
    assert!((out - 1.0).abs() < 0.02, "prediction {out}");
}

#[test]
fn test_train_hidden_layer_output_shape() {
    let mut net = Network::new(&[2, 3, 1]).unwrap();
    let inputs = vec![matrix![[1.0], [0.0]]];
    let labels = vec![matrix![[1.0]]];
    net.train(&inputs, &labels, 100, 0.1).unwrap();
    assert_eq!(net.predict(&inputs[0]).unwrap().shape(), (1, 1));
}

#[test]
fn test_zero_epochs_is_noop() {
    let mut net = Network::with_config(NetworkConfig::new([2, 2]).seed(3)).unwrap();
    let before = net.clone();
    let report = net
        .train(&[matrix![[1.0], [1.0]]], &[matrix![[0.0], [1.0]]], 0, 0.5)
        .unwrap();
    assert_eq!(report.epochs, 0);
    assert!(report.mean_loss.is_empty());
    assert_eq!(net, before);
}

#[test]
fn test_empty_dataset_is_noop() {
    let mut net = Network::with_config(NetworkConfig::new([2, 1]).seed(3)).unwrap();
    let before = net.clone();
    let report = net.train(&[], &[], 5, 0.1).unwrap();
    assert_eq!(report.mean_loss, vec![0.0; 5]);
    assert_eq!(net, before);
}

#[test]
fn test_invalid_learning_rate() {
    let mut net = Network::new(&[1, 1]).unwrap();
    let x = [matrix![[1.0]]];
    for lr in [0.0, -0.1, f32::NAN, f32::INFINITY] {
        assert!(matches!(net.train(&x, &x, 1, lr), Err(CnnError::Configuration(_))));
    }
}

#[test]
fn test_dataset_mismatches_are_rejected_upfront() {
    let mut net = Network::with_config(NetworkConfig::new([2, 1]).seed(9)).unwrap();
    let before = net.clone();
    let good_x = matrix![[1.0], [0.0]];
    let good_y = matrix![[1.0]];

    let count = net.train(&[good_x.clone(), good_x.clone()], &[good_y.clone()], 3, 0.1);
    assert!(matches!(count, Err(CnnError::DimensionMismatch { .. })));

    // the bad pair comes last, so nothing may have been applied
    let input = net.train(
        &[good_x.clone(), matrix![[1.0]]],
        &[good_y.clone(), good_y.clone()],
        3,
        0.1,
    );
    assert!(matches!(input, Err(CnnError::DimensionMismatch { .. })));

    let label = net.train(&[good_x.clone(), good_x], &[good_y, matrix![[1.0], [0.0]]], 3, 0.1);
    assert!(matches!(label, Err(CnnError::DimensionMismatch { .. })));

    assert_eq!(net, before);
}

#[test]
fn test_xor_loss_decreases() {
    let (inputs, labels) = xor_data();
    let mut net = Network::with_config(NetworkConfig::new([2, 4, 1]).seed(42)).unwrap();

    let report = net.train(&inputs, &labels, 3000, 0.5).unwrap();

    let first = report.mean_loss[0];
    let last = report.mean_loss[report.mean_loss.len() - 1];
    assert!(last < first, "loss went from {first} to {last}");
}

#[test]
fn test_shuffled_training_is_reproducible() {
    let (inputs, labels) = xor_data();
    let config = TrainConfig {
        epochs: 20,
        learning_rate: 0.3,
        shuffle: true,
        seed: Some(99),
    };

    let mut a = Network::with_config(NetworkConfig::new([2, 3, 1]).seed(1)).unwrap();
    let mut b = a.clone();
    let ra = a.train_with(&inputs, &labels, &config).unwrap();
    let rb = b.train_with(&inputs, &labels, &config).unwrap();

    assert_eq!(ra, rb);
    assert_eq!(a, b);
}

#[test]
fn test_backprop_matches_numeric_gradient() {
    let net = Network::with_config(NetworkConfig::new([2, 3, 2]).seed(21)).unwrap();
    let x = matrix![[0.6], [-0.4]];
    let y = matrix![[1.0], [0.0]];

    // central difference of the loss w.r.t. first-layer weight (1, 0)
    let eps = 1e-2;
    let loss_with = |delta: f32| {
        let mut layers = net.layers().to_vec();
        let mut weights = layers[0].weights().clone();
        weights.set(1, 0, weights.get(1, 0).unwrap() + delta).unwrap();
        layers[0] = Layer::new(weights, layers[0].bias().clone()).unwrap();
        let probe = Network::from_layers(
            net.layer_sizes().to_vec(),
            layers,
            net.activation(),
            net.loss(),
        )
        .unwrap();
        probe.evaluate(&[x.clone()], &[y.clone()]).unwrap().loss
    };
    let numeric = (loss_with(eps) - loss_with(-eps)) / (2.0 * eps);

    let lr = 1e-3;
    let mut trained = net.clone();
    trained.train(&[x.clone()], &[y.clone()], 1, lr).unwrap();
    let before = net.layers()[0].weights().get(1, 0).unwrap();
    let after = trained.layers()[0].weights().get(1, 0).unwrap();
    let analytic = (before - after) / lr;

    assert!(
        (numeric - analytic).abs() <= 1e-2 * numeric.abs().max(1.0),
        "numeric {numeric} vs analytic {analytic}"
    );
}

#[test]
fn test_tanh_squared_error_trains() {
    let config = NetworkConfig::new([1, 2, 1])
        .activation(Activation::Tanh)
        .loss(Loss::SquaredError)
        .seed(4);
    let mut net = Network::with_config(config).unwrap();
    let inputs = [matrix![[0.5]], matrix![[-0.5]]];
    let labels = [matrix![[0.4]], matrix![[-0.4]]];

    let report = net.train(&inputs, &labels, 500, 0.1).unwrap();

    assert!(report.mean_loss[499] < report.mean_loss[0]);
    let out = net.predict(&inputs[0]).unwrap().get(0, 0).unwrap();
    assert!(out > -1.0 && out < 1.0);
}

#[test]
fn test_evaluate_scores_dataset() {
    let layer = Layer::new(matrix![[10.0]], matrix![[-5.0]]).unwrap();
    let net = Network::from_layers(vec![1, 1], vec![layer], Activation::Sigmoid, Loss::CrossEntropy)
        .unwrap();

    let inputs = [matrix![[0.0]], matrix![[1.0]]];
    let eval = net.evaluate(&inputs, &[matrix![[0.0]], matrix![[1.0]]]).unwrap();
    assert_eq!(eval.accuracy, 1.0);
    assert!(eval.loss < 0.01);

    let flipped = net.evaluate(&inputs, &[matrix![[1.0]], matrix![[1.0]]]).unwrap();
    assert_eq!(flipped.accuracy, 0.5);
}

#[test]
fn test_evaluate_one_hot_uses_argmax() {
    let layer = Layer::new(matrix![[1.0, 0.0], [0.0, 1.0]], Matrix::new(2, 1)).unwrap();
    let net = Network::from_layers(vec![2, 2], vec![layer], Activation::Sigmoid, Loss::CrossEntropy)
        .unwrap();

    let inputs = [matrix![[2.0], [0.0]], matrix![[0.0], [2.0]]];
    let labels = [matrix![[1.0], [0.0]], matrix![[1.0], [0.0]]];
    let eval = net.evaluate(&inputs, &labels).unwrap();
    assert_eq!(eval.accuracy, 0.5);
}
