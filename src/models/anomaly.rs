//! Anomaly event types emitted by the detector

use crate::models::signal::SignalKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detection rule that produced an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyKind {
    VolumeSpike,
    SentimentShift,
    CrossSignalDivergence,
}

/// A statistically flagged deviation. Immutable once created; consumed
/// by the alert lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub key: SignalKey,
    /// Second signal involved, for cross-signal divergence.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paired_key: Option<SignalKey>,
    pub kind: AnomalyKind,
    /// Severity in [0, 1].
    pub severity: f64,
    pub detected_at: DateTime<Utc>,
    /// Supporting statistic: z-score for spikes, score delta for shifts.
    pub statistic: f64,
    pub reason: String,
}

/// Outcome of a per-key detector evaluation. `InsufficientData` is an
/// explicit status distinct from "no anomaly found".
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorStatus {
    /// Window still warming up; detectors refuse to fire.
    InsufficientData { have: usize, need: usize },
    /// Window ready, no rule fired.
    NoAnomaly,
    /// One or more rules fired.
    Anomalous(Vec<AnomalyEvent>),
}

impl DetectorStatus {
    pub fn events(self) -> Vec<AnomalyEvent> {
        match self {
            DetectorStatus::Anomalous(events) => events,
            _ => Vec::new(),
        }
    }
}
