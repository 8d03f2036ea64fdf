//! Signal registry: the engine's static configuration surface
//!
//! Explicitly constructed and passed around; there is no process-wide
//! singleton, so multiple engine instances never share state.

use crate::models::signal::{Calibration, Signal, SignalKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fatal configuration problems. Raised at startup, never mid-run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    UnregisteredKey(SignalKey),
    DuplicateKey(SignalKey),
    InvalidCalibration { key: SignalKey, detail: String },
    InvalidThreshold(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnregisteredKey(key) => {
                write!(f, "signal key '{}' is not registered", key)
            }
            ConfigError::DuplicateKey(key) => {
                write!(f, "signal key '{}' is already registered", key)
            }
            ConfigError::InvalidCalibration { key, detail } => {
                write!(f, "invalid calibration for '{}': {}", key, detail)
            }
            ConfigError::InvalidThreshold(detail) => {
                write!(f, "invalid threshold: {}", detail)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serializable registry definition, loaded from configuration at
/// startup (the binary reads it as JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub signals: Vec<Signal>,
    /// Pairs evaluated by the cross-signal divergence rule.
    #[serde(default)]
    pub divergence_pairs: Vec<(SignalKey, SignalKey)>,
    /// (event, reaction) pairs searched by the correlation engine.
    #[serde(default)]
    pub correlation_pairs: Vec<(SignalKey, SignalKey)>,
}

/// Registered signals plus the cross-signal pair lists. Immutable after
/// construction; the engine holds it behind an `Arc`.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    signals: HashMap<SignalKey, Signal>,
    divergence_pairs: Vec<(SignalKey, SignalKey)>,
    correlation_pairs: Vec<(SignalKey, SignalKey)>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from its serialized definition, validating every
    /// calibration and pair reference. Fails fast on the first problem.
    pub fn from_config(config: RegistryConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for signal in config.signals {
            registry.register(signal)?;
        }
        for (a, b) in config.divergence_pairs {
            registry.register_divergence_pair(a, b)?;
        }
        for (event, reaction) in config.correlation_pairs {
            registry.register_correlation_pair(event, reaction)?;
        }
        Ok(registry)
    }

    /// Register a signal. Calibration parameters are validated here so
    /// bad configuration surfaces at startup.
    pub fn register(&mut self, signal: Signal) -> Result<(), ConfigError> {
        validate_calibration(&signal)?;
        if self.signals.contains_key(&signal.key) {
            return Err(ConfigError::DuplicateKey(signal.key));
        }
        if !signal.weight.is_finite() || signal.weight < 0.0 {
            return Err(ConfigError::InvalidCalibration {
                key: signal.key,
                detail: "weight must be finite and non-negative".to_string(),
            });
        }
        self.signals.insert(signal.key.clone(), signal);
        Ok(())
    }

    pub fn register_divergence_pair(
        &mut self,
        a: SignalKey,
        b: SignalKey,
    ) -> Result<(), ConfigError> {
        self.require(&a)?;
        self.require(&b)?;
        self.divergence_pairs.push((a, b));
        Ok(())
    }

    pub fn register_correlation_pair(
        &mut self,
        event: SignalKey,
        reaction: SignalKey,
    ) -> Result<(), ConfigError> {
        self.require(&event)?;
        self.require(&reaction)?;
        self.correlation_pairs.push((event, reaction));
        Ok(())
    }

    pub fn get(&self, key: &SignalKey) -> Option<&Signal> {
        self.signals.get(key)
    }

    pub fn contains(&self, key: &SignalKey) -> bool {
        self.signals.contains_key(key)
    }

    /// Lookup that fails fast on an unregistered key.
    pub fn require(&self, key: &SignalKey) -> Result<&Signal, ConfigError> {
        self.signals
            .get(key)
            .ok_or_else(|| ConfigError::UnregisteredKey(key.clone()))
    }

    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn divergence_pairs(&self) -> &[(SignalKey, SignalKey)] {
        &self.divergence_pairs
    }

    pub fn correlation_pairs(&self) -> &[(SignalKey, SignalKey)] {
        &self.correlation_pairs
    }
}

fn validate_calibration(signal: &Signal) -> Result<(), ConfigError> {
    let invalid = |detail: &str| ConfigError::InvalidCalibration {
        key: signal.key.clone(),
        detail: detail.to_string(),
    };

    match &signal.calibration {
        Calibration::Linear { min, max } => {
            if !min.is_finite() || !max.is_finite() {
                return Err(invalid("linear bounds must be finite"));
            }
            if min >= max {
                return Err(invalid("linear min must be below max"));
            }
        }
        Calibration::ZScore { mean, stdev } => {
            if !mean.is_finite() || !stdev.is_finite() {
                return Err(invalid("z-score parameters must be finite"));
            }
            if *stdev <= 0.0 {
                return Err(invalid("z-score stdev must be positive"));
            }
        }
        Calibration::Buckets { steps } => {
            if steps.is_empty() {
                return Err(invalid("bucket table must not be empty"));
            }
            let mut prev = f64::NEG_INFINITY;
            for step in steps {
                if !step.upper.is_finite() || !step.score.is_finite() {
                    return Err(invalid("bucket steps must be finite"));
                }
                if step.upper <= prev {
                    return Err(invalid("bucket steps must be strictly ascending"));
                }
                if !(0.0..=100.0).contains(&step.score) {
                    return Err(invalid("bucket scores must lie in [0, 100]"));
                }
                prev = step.upper;
            }
        }
    }
    Ok(())
}
