//! Engine configuration, resolved once at startup
//!
//! Defaults are code-level; every knob can be overridden through a
//! `VIGIL_*` environment variable in the binaries.

use crate::registry::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Deployment environment name, used to pick the log formatter.
pub fn get_environment() -> String {
    env::var("VIGIL_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Rolling window sizing shared by every signal key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum samples retained per key.
    pub capacity: usize,
    /// Minimum samples before detectors fire.
    pub warmup: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity: 120,
            warmup: 20,
        }
    }
}

/// Anomaly rule thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Volume-spike z-score cutoff.
    pub z_score_cutoff: f64,
    /// Z-score magnitude mapping to severity 1.0.
    pub z_score_cap: f64,
    /// Sentiment score points per tick that count as a shift.
    pub sentiment_shift_threshold: f64,
    /// Minimum per-tick score movement for the divergence rule.
    pub divergence_min_magnitude: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            z_score_cutoff: 2.0,
            z_score_cap: 6.0,
            sentiment_shift_threshold: 25.0,
            divergence_min_magnitude: 10.0,
        }
    }
}

/// Lag-correlation search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Lags tested in `[-max_lag, +max_lag]` ticks.
    pub max_lag: usize,
    /// Minimum overlapping samples for a usable coefficient.
    pub min_samples: usize,
    /// Fisher z statistic bound for a confirmed hypothesis (1.96 is the
    /// two-sided 5% level).
    pub significance_bound: f64,
    /// Time budget per pair; exceeding it yields `inconclusive`.
    pub time_budget_ms: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_lag: 12,
            min_samples: 12,
            significance_bound: 1.96,
            time_budget_ms: 250,
        }
    }
}

/// Alert lifecycle thresholds and timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Severity at which an active alert escalates.
    pub escalation_threshold: f64,
    /// Severity below this maps to info priority.
    pub warning_threshold: f64,
    /// Severity at or above this maps to critical priority.
    pub critical_threshold: f64,
    /// Quiet seconds before an open alert resolves.
    pub cooldown_secs: u64,
    /// Seconds a resolved alert is retained before expiry.
    pub retention_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 0.8,
            warning_threshold: 0.4,
            critical_threshold: 0.7,
            cooldown_secs: 300,
            retention_secs: 3600,
        }
    }
}

impl AlertConfig {
    pub fn priority(&self, severity: f64) -> crate::models::alert::AlertPriority {
        use crate::models::alert::AlertPriority;
        if severity >= self.critical_threshold {
            AlertPriority::Critical
        } else if severity >= self.warning_threshold {
            AlertPriority::Warning
        } else {
            AlertPriority::Info
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Bias dead zone: |bias| at or below this labels as flat.
    pub flat_threshold: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            flat_threshold: 0.05,
        }
    }
}

/// What to do when a producer queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Evict the queue head to make room for the new observation.
    DropOldest,
    /// Refuse the new observation and surface the error to the producer.
    RejectNew,
}

impl FromStr for BackpressurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop-oldest" => Ok(BackpressurePolicy::DropOldest),
            "reject-new" => Ok(BackpressurePolicy::RejectNew),
            other => Err(format!("unknown backpressure policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Bounded queue capacity per producer.
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            backpressure: BackpressurePolicy::DropOldest,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub ingress: IngressConfig,
}

impl EngineConfig {
    /// Defaults overridden by `VIGIL_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.window.capacity = env_parse("VIGIL_WINDOW_CAPACITY", config.window.capacity);
        config.window.warmup = env_parse("VIGIL_WINDOW_WARMUP", config.window.warmup);
        config.detector.z_score_cutoff =
            env_parse("VIGIL_Z_SCORE_CUTOFF", config.detector.z_score_cutoff);
        config.detector.sentiment_shift_threshold = env_parse(
            "VIGIL_SENTIMENT_SHIFT_THRESHOLD",
            config.detector.sentiment_shift_threshold,
        );
        config.detector.divergence_min_magnitude = env_parse(
            "VIGIL_DIVERGENCE_MIN_MAGNITUDE",
            config.detector.divergence_min_magnitude,
        );
        config.correlation.max_lag = env_parse("VIGIL_MAX_LAG", config.correlation.max_lag);
        config.correlation.min_samples =
            env_parse("VIGIL_CORRELATION_MIN_SAMPLES", config.correlation.min_samples);
        config.correlation.significance_bound = env_parse(
            "VIGIL_SIGNIFICANCE_BOUND",
            config.correlation.significance_bound,
        );
        config.correlation.time_budget_ms = env_parse(
            "VIGIL_CORRELATION_BUDGET_MS",
            config.correlation.time_budget_ms,
        );
        config.alerts.cooldown_secs =
            env_parse("VIGIL_ALERT_COOLDOWN_SECS", config.alerts.cooldown_secs);
        config.alerts.retention_secs =
            env_parse("VIGIL_ALERT_RETENTION_SECS", config.alerts.retention_secs);
        config.ingress.queue_capacity =
            env_parse("VIGIL_QUEUE_CAPACITY", config.ingress.queue_capacity);
        if let Ok(policy) = env::var("VIGIL_BACKPRESSURE") {
            if let Ok(parsed) = policy.parse() {
                config.ingress.backpressure = parsed;
            }
        }
        config
    }

    /// Startup validation: bad thresholds are fatal configuration
    /// errors, not runtime surprises.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.capacity == 0 {
            return Err(ConfigError::InvalidThreshold(
                "window capacity must be positive".to_string(),
            ));
        }
        if self.window.warmup > self.window.capacity {
            return Err(ConfigError::InvalidThreshold(
                "window warmup cannot exceed capacity".to_string(),
            ));
        }
        if self.detector.z_score_cutoff <= 0.0 || self.detector.z_score_cap <= 0.0 {
            return Err(ConfigError::InvalidThreshold(
                "z-score thresholds must be positive".to_string(),
            ));
        }
        if self.alerts.warning_threshold >= self.alerts.critical_threshold {
            return Err(ConfigError::InvalidThreshold(
                "warning threshold must be below critical threshold".to_string(),
            ));
        }
        if self.correlation.min_samples <= 3 {
            return Err(ConfigError::InvalidThreshold(
                "correlation min samples must exceed 3 for the significance test".to_string(),
            ));
        }
        if self.ingress.queue_capacity == 0 {
            return Err(ConfigError::InvalidThreshold(
                "ingress queue capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
