//! Unit tests for observation normalization

use chrono::Utc;
use vigil::analysis::normalizer::{normal_cdf, normalize};
use vigil::models::signal::{
    BucketStep, Calibration, Observation, ScoreBucket, Signal, SignalClass, SignalKey,
};

fn linear_signal(min: f64, max: f64) -> Signal {
    Signal {
        key: SignalKey::new("test", "rsi", "BTC"),
        class: SignalClass::Price,
        calibration: Calibration::Linear { min, max },
        unit: "index".to_string(),
        weight: 1.0,
    }
}

fn observe(signal: &Signal, value: f64) -> Observation {
    Observation::new(signal.key.clone(), Utc::now(), value)
}

#[test]
fn test_linear_passthrough_for_bounded_indicator() {
    let signal = linear_signal(0.0, 100.0);
    for raw in [0.0, 19.9, 20.0, 47.3, 80.0, 100.0] {
        let score = normalize(&signal, &observe(&signal, raw));
        assert!((score.score.unwrap() - raw).abs() < 1e-9);
    }
}

#[test]
fn test_output_always_within_range() {
    let signal = linear_signal(0.0, 100.0);
    for raw in [-500.0, -0.1, 0.0, 50.0, 100.0, 100.1, 1e9] {
        let score = normalize(&signal, &observe(&signal, raw)).score.unwrap();
        assert!((0.0..=100.0).contains(&score), "score {} out of range", score);
    }
}

#[test]
fn test_bucket_boundaries_inclusive_on_lower_edge() {
    assert_eq!(ScoreBucket::from_score(0.0), ScoreBucket::ExtremeBearish);
    assert_eq!(ScoreBucket::from_score(19.99), ScoreBucket::ExtremeBearish);
    assert_eq!(ScoreBucket::from_score(20.0), ScoreBucket::Bearish);
    assert_eq!(ScoreBucket::from_score(39.99), ScoreBucket::Bearish);
    assert_eq!(ScoreBucket::from_score(40.0), ScoreBucket::Neutral);
    assert_eq!(ScoreBucket::from_score(59.99), ScoreBucket::Neutral);
    assert_eq!(ScoreBucket::from_score(60.0), ScoreBucket::Bullish);
    assert_eq!(ScoreBucket::from_score(79.99), ScoreBucket::Bullish);
    assert_eq!(ScoreBucket::from_score(80.0), ScoreBucket::ExtremeBullish);
    assert_eq!(ScoreBucket::from_score(100.0), ScoreBucket::ExtremeBullish);
}

#[test]
fn test_bucket_label_matches_score() {
    let signal = linear_signal(0.0, 100.0);
    for raw in [5.0, 25.0, 50.0, 70.0, 95.0] {
        let normalized = normalize(&signal, &observe(&signal, raw));
        assert_eq!(
            normalized.bucket.unwrap(),
            ScoreBucket::from_score(normalized.score.unwrap())
        );
    }
}

#[test]
fn test_z_score_calibration_maps_to_percentile() {
    let signal = Signal {
        key: SignalKey::new("fred", "m2-growth", "US"),
        class: SignalClass::Macro,
        calibration: Calibration::ZScore {
            mean: 6.0,
            stdev: 2.0,
        },
        unit: "pct".to_string(),
        weight: 1.0,
    };

    let at_mean = normalize(&signal, &observe(&signal, 6.0)).score.unwrap();
    assert!((at_mean - 50.0).abs() < 0.1);

    // Two stdevs above the mean sits near the 97.7th percentile.
    let high = normalize(&signal, &observe(&signal, 10.0)).score.unwrap();
    assert!((high - 97.7).abs() < 0.2);

    let low = normalize(&signal, &observe(&signal, 2.0)).score.unwrap();
    assert!((low - 2.3).abs() < 0.2);
}

#[test]
fn test_categorical_bucket_table() {
    let signal = Signal {
        key: SignalKey::new("social", "fear-greed", "crypto"),
        class: SignalClass::Sentiment,
        calibration: Calibration::Buckets {
            steps: vec![
                BucketStep { upper: 25.0, score: 10.0 },
                BucketStep { upper: 50.0, score: 40.0 },
                BucketStep { upper: 75.0, score: 60.0 },
                BucketStep { upper: 100.0, score: 90.0 },
            ],
        },
        unit: "index".to_string(),
        weight: 1.0,
    };

    assert_eq!(normalize(&signal, &observe(&signal, 10.0)).score, Some(10.0));
    assert_eq!(normalize(&signal, &observe(&signal, 25.0)).score, Some(10.0));
    assert_eq!(normalize(&signal, &observe(&signal, 26.0)).score, Some(40.0));
    assert_eq!(normalize(&signal, &observe(&signal, 99.0)).score, Some(90.0));
    // Above the last step takes the last step's score.
    assert_eq!(normalize(&signal, &observe(&signal, 500.0)).score, Some(90.0));
}

#[test]
fn test_non_finite_values_become_no_data() {
    let signal = linear_signal(0.0, 100.0);
    for raw in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let score = normalize(&signal, &observe(&signal, raw));
        assert!(score.is_no_data());
        assert!(score.bucket.is_none());
    }
}

#[test]
fn test_normal_cdf_reference_points() {
    assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
    assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
    assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-3);
    assert!(normal_cdf(6.0) > 0.999);
}
