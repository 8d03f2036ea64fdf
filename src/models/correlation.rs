//! Lagged correlation hypothesis types

use crate::models::signal::SignalKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a hypothesis could not be confirmed. Distinguishes "no
/// correlation" from "not enough data to tell".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InconclusiveReason {
    /// Fewer overlapping samples than the configured minimum.
    TooFewSamples,
    /// Best correlation found, but below the significance bound.
    BelowSignificance,
    /// One or both series are (near) constant over the overlap.
    DegenerateSeries,
    /// The lag search exceeded its time budget.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum CorrelationStatus {
    Confirmed,
    Inconclusive { reason: InconclusiveReason },
}

/// Association between an event series and a lag-shifted reaction
/// series. Recomputed periodically; a new hypothesis supersedes the
/// previous one for the same pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationHypothesis {
    pub event_key: SignalKey,
    pub reaction_key: SignalKey,
    /// Ticks by which the reaction trails the event. Positive means the
    /// reaction follows the event.
    pub best_lag: i64,
    /// Pearson coefficient at the best lag.
    pub coefficient: f64,
    /// Fisher-transform z statistic at the best lag.
    pub significance: f64,
    pub sample_count: usize,
    pub status: CorrelationStatus,
    pub computed_at: DateTime<Utc>,
}

impl CorrelationHypothesis {
    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, CorrelationStatus::Confirmed)
    }

    /// Empty hypothesis for a pair that could not be evaluated at all.
    pub fn inconclusive(
        event_key: SignalKey,
        reaction_key: SignalKey,
        reason: InconclusiveReason,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_key,
            reaction_key,
            best_lag: 0,
            coefficient: 0.0,
            significance: 0.0,
            sample_count: 0,
            status: CorrelationStatus::Inconclusive { reason },
            computed_at,
        }
    }
}
