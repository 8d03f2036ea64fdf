//! Unit tests for engine configuration

use vigil::config::{BackpressurePolicy, EngineConfig};
use vigil::models::alert::AlertPriority;

#[test]
fn test_defaults_are_valid() {
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    // Warm-up default equivalent to a 20-period history.
    assert_eq!(config.window.warmup, 20);
    assert_eq!(config.detector.z_score_cutoff, 2.0);
}

#[test]
fn test_warmup_cannot_exceed_capacity() {
    let mut config = EngineConfig::default();
    config.window.capacity = 10;
    config.window.warmup = 11;
    assert!(config.validate().is_err());
}

#[test]
fn test_priority_thresholds_must_be_ordered() {
    let mut config = EngineConfig::default();
    config.alerts.warning_threshold = 0.9;
    config.alerts.critical_threshold = 0.7;
    assert!(config.validate().is_err());
}

#[test]
fn test_correlation_min_samples_must_support_significance() {
    let mut config = EngineConfig::default();
    config.correlation.min_samples = 3;
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_queue_capacity_rejected() {
    let mut config = EngineConfig::default();
    config.ingress.queue_capacity = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_backpressure_policy_parsing() {
    assert_eq!(
        "drop-oldest".parse::<BackpressurePolicy>().unwrap(),
        BackpressurePolicy::DropOldest
    );
    assert_eq!(
        "reject-new".parse::<BackpressurePolicy>().unwrap(),
        BackpressurePolicy::RejectNew
    );
    assert!("block".parse::<BackpressurePolicy>().is_err());
}

#[test]
fn test_priority_mapping() {
    let config = EngineConfig::default();
    assert_eq!(config.alerts.priority(0.1), AlertPriority::Info);
    assert_eq!(config.alerts.priority(0.39), AlertPriority::Info);
    assert_eq!(config.alerts.priority(0.4), AlertPriority::Warning);
    assert_eq!(config.alerts.priority(0.69), AlertPriority::Warning);
    assert_eq!(config.alerts.priority(0.7), AlertPriority::Critical);
    assert_eq!(config.alerts.priority(1.0), AlertPriority::Critical);
}
