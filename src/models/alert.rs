//! Alert types and lifecycle states

use crate::models::anomaly::{AnomalyEvent, AnomalyKind};
use crate::models::correlation::CorrelationHypothesis;
use crate::models::signal::SignalKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle: `New -> Active -> (Escalated | Resolved) -> Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    New,
    Active,
    Escalated,
    Resolved,
    Expired,
}

impl AlertState {
    /// Open alerts are the ones a new detection deduplicates against.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            AlertState::New | AlertState::Active | AlertState::Escalated
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Info,
    Warning,
    Critical,
}

/// Key used to decide whether a new detection updates an existing alert
/// instead of creating a duplicate: signal key(s) plus detection kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub key: SignalKey,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paired_key: Option<SignalKey>,
    pub kind: String,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.paired_key {
            Some(paired) => write!(f, "{}|{}|{}", self.key, paired, self.kind),
            None => write!(f, "{}|{}", self.key, self.kind),
        }
    }
}

impl Fingerprint {
    pub fn for_anomaly(event: &AnomalyEvent) -> Self {
        let kind = match event.kind {
            AnomalyKind::VolumeSpike => "volume-spike",
            AnomalyKind::SentimentShift => "sentiment-shift",
            AnomalyKind::CrossSignalDivergence => "cross-signal-divergence",
        };
        Self {
            key: event.key.clone(),
            paired_key: event.paired_key.clone(),
            kind: kind.to_string(),
        }
    }

    pub fn for_correlation(hypothesis: &CorrelationHypothesis) -> Self {
        Self {
            key: hypothesis.event_key.clone(),
            paired_key: Some(hypothesis.reaction_key.clone()),
            kind: "correlation".to_string(),
        }
    }
}

/// What triggered the alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "trigger")]
pub enum AlertTrigger {
    Anomaly(AnomalyEvent),
    Correlation(CorrelationHypothesis),
}

/// An alert owned by the lifecycle manager for its full lifecycle.
/// Readers only observe; the manager is the sole writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub fingerprint: Fingerprint,
    pub trigger: AlertTrigger,
    pub state: AlertState,
    pub priority: AlertPriority,
    /// Severity in [0, 1], updated in place on re-detection.
    pub severity: f64,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolved_at: Option<DateTime<Utc>>,
}
