//! Unit tests for ensemble aggregation

use chrono::Utc;
use vigil::analysis::ensemble::{aggregate, BiasLabel, EnsembleInput};
use vigil::config::EnsembleConfig;
use vigil::models::signal::SignalKey;

fn input(name: &str, weight: f64, score: Option<f64>) -> EnsembleInput {
    EnsembleInput {
        key: SignalKey::new("test", name, "BTC"),
        weight,
        score,
    }
}

#[test]
fn test_all_bullish_agreement() {
    let inputs = vec![
        input("a", 1.0, Some(75.0)),
        input("b", 1.0, Some(80.0)),
        input("c", 1.0, Some(70.0)),
    ];
    let outcome = aggregate(&inputs, &EnsembleConfig::default(), Utc::now());
    assert!(outcome.bias > 0.0);
    assert_eq!(outcome.label, BiasLabel::Bullish);
    // Full coverage and full agreement: maximum confidence.
    assert!((outcome.confidence - 1.0).abs() < 1e-9);
    assert_eq!(outcome.present, 3);
    assert_eq!(outcome.expected, 3);
}

#[test]
fn test_confidence_decreases_with_missing_signals() {
    // Holding present scores constant, each additional missing signal
    // strictly lowers confidence.
    let present = vec![input("a", 1.0, Some(70.0)), input("b", 1.0, Some(65.0))];

    let mut confidences = Vec::new();
    for missing_count in 0..4 {
        let mut inputs = present.clone();
        for i in 0..missing_count {
            inputs.push(input(&format!("missing{}", i), 1.0, None));
        }
        let outcome = aggregate(&inputs, &EnsembleConfig::default(), Utc::now());
        confidences.push(outcome.confidence);
    }

    for pair in confidences.windows(2) {
        assert!(
            pair[0] > pair[1],
            "confidence must strictly decrease: {:?}",
            confidences
        );
    }
}

#[test]
fn test_missing_inputs_never_block_aggregation() {
    let inputs = vec![
        input("a", 1.0, Some(90.0)),
        input("b", 1.0, None),
        input("c", 1.0, None),
    ];
    let outcome = aggregate(&inputs, &EnsembleConfig::default(), Utc::now());
    assert!(outcome.bias > 0.0);
    assert!(outcome.confidence > 0.0);
    assert_eq!(outcome.present, 1);
}

#[test]
fn test_no_signals_present() {
    let inputs = vec![input("a", 1.0, None), input("b", 1.0, None)];
    let outcome = aggregate(&inputs, &EnsembleConfig::default(), Utc::now());
    assert_eq!(outcome.bias, 0.0);
    assert_eq!(outcome.confidence, 0.0);
    assert_eq!(outcome.label, BiasLabel::Flat);
}

#[test]
fn test_disagreement_halves_confidence() {
    let inputs = vec![input("a", 1.0, Some(80.0)), input("b", 1.0, Some(20.0))];
    let outcome = aggregate(&inputs, &EnsembleConfig::default(), Utc::now());
    // Coverage 1.0, sign agreement 0: confidence lands at the floor.
    assert!((outcome.confidence - 0.5).abs() < 1e-9);
    assert_eq!(outcome.label, BiasLabel::Flat);
}

#[test]
fn test_weights_shift_the_bias() {
    let inputs = vec![input("heavy", 3.0, Some(80.0)), input("light", 1.0, Some(30.0))];
    let outcome = aggregate(&inputs, &EnsembleConfig::default(), Utc::now());
    // Weighted mean of +0.6 (w=3) and -0.4 (w=1) is positive.
    assert!(outcome.bias > 0.0);
    assert_eq!(outcome.label, BiasLabel::Bullish);
}

#[test]
fn test_neutral_scores_stay_flat() {
    let inputs = vec![input("a", 1.0, Some(50.0)), input("b", 1.0, Some(51.0))];
    let outcome = aggregate(&inputs, &EnsembleConfig::default(), Utc::now());
    assert_eq!(outcome.label, BiasLabel::Flat);
}

#[test]
fn test_deterministic_for_same_inputs() {
    let inputs = vec![input("a", 1.0, Some(62.0)), input("b", 2.0, Some(44.0))];
    let now = Utc::now();
    let first = aggregate(&inputs, &EnsembleConfig::default(), now);
    let second = aggregate(&inputs, &EnsembleConfig::default(), now);
    assert_eq!(first.bias, second.bias);
    assert_eq!(first.confidence, second.confidence);
}
