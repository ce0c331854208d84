//! Behavioural properties of the network engine, exercised through the
//! public API only.

use approx::assert_abs_diff_eq;

use carnage_nn::{Activation, Matrix, Network, NetworkError, ParameterSnapshot};

/// Two well separated clusters split by the sign of the first feature.
fn separable() -> (Matrix, Matrix) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for i in 0..20 {
        let t = i as f64 * 0.05;
        x.push(vec![-1.0 - t, -0.5 + t]);
        y.push(vec![1.0, 0.0]);
        x.push(vec![1.0 + t, 0.5 - t]);
        y.push(vec![0.0, 1.0]);
    }
    (Matrix::from_rows(x).unwrap(), Matrix::from_rows(y).unwrap())
}

fn wave_batch(rows: usize, cols: usize) -> Matrix {
    let data = (0..rows * cols).map(|k| ((k as f64) * 0.37).sin() * 3.0).collect();
    Matrix::from_vec(rows, cols, data).unwrap()
}

// ============================================================================
// Forward pass
// ============================================================================

#[test]
fn forward_output_rows_are_probability_distributions() {
    for (layers, act) in [
        (vec![1, 1], "relu"),
        (vec![4, 7, 3], "sigmoid"),
        (vec![5, 6, 6, 4, 10], "tanh"),
    ] {
        let net = Network::new(&layers, act, 0.1).unwrap();
        let x = wave_batch(9, layers[0]);
        let (out, _) = net.forward(&x).unwrap();
        assert_eq!(out.shape(), (9, *layers.last().unwrap()));
        for row in out.iter_rows() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
    }
}

#[test]
fn predictions_cover_every_row_and_stay_in_range() {
    let net = Network::new(&[3, 5, 4], "relu", 0.1).unwrap();
    let x = wave_batch(12, 3);
    let preds = net.predict(&x).unwrap();
    assert_eq!(preds.len(), 12);
    assert!(preds.iter().all(|&k| k < 4));
}

#[test]
fn shape_errors_are_reported() {
    let mut net = Network::new(&[2, 3], "relu", 0.1).unwrap();
    let x = wave_batch(4, 2);

    let wide_y = wave_batch(4, 2);
    assert!(matches!(
        net.train(&x, &wide_y, 1),
        Err(NetworkError::ShapeMismatch { expected: 3, actual: 2, .. })
    ));

    let narrow_x = wave_batch(4, 1);
    assert!(matches!(
        net.predict(&narrow_x),
        Err(NetworkError::ShapeMismatch { expected: 2, actual: 1, .. })
    ));

    let short_y = wave_batch(3, 3);
    assert!(matches!(
        net.evaluate(&x, &short_y),
        Err(NetworkError::ShapeMismatch { .. })
    ));
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn construction_validates_inputs() {
    assert!(matches!(
        Network::new(&[5], "relu", 0.1),
        Err(NetworkError::InvalidArchitecture { .. })
    ));
    assert!(matches!(
        Network::new(&[3, 0, 2], "relu", 0.1),
        Err(NetworkError::InvalidArchitecture { .. })
    ));
    assert!(matches!(
        Network::new(&[3, 2], "swish", 0.1),
        Err(NetworkError::InvalidActivation { .. })
    ));
}

#[test]
fn initial_weights_respect_the_xavier_limit() {
    let net = Network::new(&[10, 30, 5], "relu", 0.1).unwrap();
    for layer in net.layers() {
        let limit = (6.0 / (layer.units_in() + layer.units_out()) as f64).sqrt();
        assert!(layer.weights().as_slice().iter().all(|w| w.abs() <= limit));
        assert!(layer.biases().as_slice().iter().all(|&b| b == 0.0));
    }
}

// ============================================================================
// Training
// ============================================================================

#[test]
fn loss_sequence_has_one_entry_per_epoch() {
    let (x, y) = separable();
    let mut net = Network::new(&[2, 3, 2], "sigmoid", 0.1).unwrap();
    assert_eq!(net.train(&x, &y, 17).unwrap().len(), 17);
}

#[test]
fn learns_a_linearly_separable_problem() {
    let (x, y) = separable();
    for seed in 0..5 {
        let mut net = Network::seeded(&[2, 4, 2], "relu", 0.1, seed).unwrap();
        let losses = net.train(&x, &y, 500).unwrap();
        assert!(losses[499] < losses[0], "seed {seed}: loss did not drop");
        let acc = net.evaluate(&x, &y).unwrap();
        assert!(acc > 0.9, "seed {seed}: accuracy {acc}");
    }
}

#[test]
fn evaluate_is_a_fraction() {
    let (x, y) = separable();
    for act in Activation::ALL {
        let net = Network::new(&[2, 5, 2], act.as_str(), 0.1).unwrap();
        let acc = net.evaluate(&x, &y).unwrap();
        assert!((0.0..=1.0).contains(&acc));
    }
}

// ============================================================================
// Export / import
// ============================================================================

#[test]
fn export_import_reproduces_forward_exactly() {
    let (x, y) = separable();
    let mut net = Network::new(&[2, 6, 3, 2], "tanh", 0.2).unwrap();
    net.train(&x, &y, 20).unwrap();

    let json = net.export().to_json().unwrap();
    let restored = Network::from_snapshot(ParameterSnapshot::from_json(&json).unwrap()).unwrap();

    let held_out = wave_batch(15, 2);
    assert_eq!(net.probabilities(&held_out).unwrap(), restored.probabilities(&held_out).unwrap());
    assert_eq!(net.predict(&held_out).unwrap(), restored.predict(&held_out).unwrap());
}

#[test]
fn import_into_an_existing_engine() {
    let trained = Network::seeded(&[2, 4, 2], "sigmoid", 0.05, 8).unwrap();
    let mut fresh = Network::new(&[2, 4, 2], "sigmoid", 0.05).unwrap();
    fresh.import(trained.export()).unwrap();

    let held_out = wave_batch(6, 2);
    assert_eq!(trained.probabilities(&held_out).unwrap(), fresh.probabilities(&held_out).unwrap());
}
