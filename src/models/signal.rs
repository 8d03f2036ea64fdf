//! Signal identity, calibration, and score types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a registered signal: source, indicator kind, instrument.
///
/// Rendered as `source:indicator:instrument` in logs and API paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalKey {
    pub source: String,
    pub indicator: String,
    pub instrument: String,
}

impl SignalKey {
    pub fn new(source: &str, indicator: &str, instrument: &str) -> Self {
        Self {
            source: source.to_string(),
            indicator: indicator.to_string(),
            instrument: instrument.to_string(),
        }
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.indicator, self.instrument)
    }
}

impl FromStr for SignalKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(indicator), Some(instrument))
                if !source.is_empty() && !indicator.is_empty() && !instrument.is_empty() =>
            {
                Ok(SignalKey::new(source, indicator, instrument))
            }
            _ => Err(format!("invalid signal key '{}'", s)),
        }
    }
}

/// Broad class of a signal, used to select detector rules
/// (sentiment-shift only fires for `Sentiment` signals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalClass {
    Price,
    Volume,
    Sentiment,
    Macro,
    OnChain,
}

/// One step of a categorical bucket table: raw values up to and
/// including `upper` map to `score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketStep {
    pub upper: f64,
    pub score: f64,
}

/// Calibration strategy selected per indicator kind.
///
/// Tagged variant rather than a trait object: the set of strategies is
/// closed and each carries its own parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Calibration {
    /// Linear min-max scaling for bounded indicators (RSI-style).
    Linear { min: f64, max: f64 },
    /// Z-score against an expected distribution, mapped to a percentile.
    /// For unbounded indicators such as money supply growth.
    ZScore { mean: f64, stdev: f64 },
    /// Explicit bucket table for categorical signals. Steps must be
    /// sorted ascending by `upper`; values above the last step take the
    /// last step's score.
    Buckets { steps: Vec<BucketStep> },
}

/// A registered signal: identity plus calibration metadata.
/// Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub key: SignalKey,
    pub class: SignalClass,
    pub calibration: Calibration,
    pub unit: String,
    /// Ensemble weight. Defaults to equal weighting.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Quality flag supplied by the ingestion adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    Stale,
    Partial,
}

/// One timestamped raw data point for a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub key: SignalKey,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quality: Option<QualityFlag>,
}

impl Observation {
    pub fn new(key: SignalKey, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            key,
            timestamp,
            value,
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: QualityFlag) -> Self {
        self.quality = Some(quality);
        self
    }
}

/// Five-band bucket label over the 0-100 scale.
/// Boundaries are inclusive on the lower edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreBucket {
    ExtremeBearish,
    Bearish,
    Neutral,
    Bullish,
    ExtremeBullish,
}

impl ScoreBucket {
    pub fn from_score(score: f64) -> Self {
        if score < 20.0 {
            ScoreBucket::ExtremeBearish
        } else if score < 40.0 {
            ScoreBucket::Bearish
        } else if score < 60.0 {
            ScoreBucket::Neutral
        } else if score < 80.0 {
            ScoreBucket::Bullish
        } else {
            ScoreBucket::ExtremeBullish
        }
    }
}

/// A signal's value mapped onto the common 0-100 scale.
///
/// `score` is `None` when the raw value was non-finite or missing; the
/// no-data marker propagates downstream instead of a silent zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub key: SignalKey,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<ScoreBucket>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quality: Option<QualityFlag>,
}

impl NormalizedScore {
    pub fn no_data(key: SignalKey, timestamp: DateTime<Utc>) -> Self {
        Self {
            key,
            timestamp,
            score: None,
            bucket: None,
            quality: None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.score.is_none()
    }
}
