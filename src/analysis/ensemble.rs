//! Ensemble scoring: weighted combination of current normalized scores
//!
//! Deterministic and side-effect-free. Missing inputs reduce confidence
//! but never block aggregation.

use crate::config::EnsembleConfig;
use crate::models::signal::SignalKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One expected signal's contribution to the ensemble: its configured
/// weight and the latest normalized score, if any arrived.
#[derive(Debug, Clone)]
pub struct EnsembleInput {
    pub key: SignalKey,
    pub weight: f64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasLabel {
    Bullish,
    Bearish,
    Flat,
}

/// Aggregate directional bias with confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleOutcome {
    /// Signed bias in [-1, 1].
    pub bias: f64,
    /// Confidence in [0, 1]; shrinks with missing inputs.
    pub confidence: f64,
    pub label: BiasLabel,
    pub present: usize,
    pub expected: usize,
    pub reasons: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

/// Combine available scores via a weighted sum over the 0-100 scale
/// centered to [-1, 1].
///
/// Confidence is the weight fraction of expected signals actually
/// present, shaped by sign agreement among the present components:
/// full agreement keeps the coverage fraction, full disagreement
/// halves it. Holding present scores constant, each additional missing
/// signal strictly lowers confidence.
pub fn aggregate(
    inputs: &[EnsembleInput],
    config: &EnsembleConfig,
    now: DateTime<Utc>,
) -> EnsembleOutcome {
    let expected = inputs.len();
    let total_weight: f64 = inputs.iter().map(|i| i.weight).sum();

    let present: Vec<(&EnsembleInput, f64)> = inputs
        .iter()
        .filter_map(|input| input.score.map(|score| (input, (score - 50.0) / 50.0)))
        .collect();

    if present.is_empty() || total_weight <= 0.0 {
        return EnsembleOutcome {
            bias: 0.0,
            confidence: 0.0,
            label: BiasLabel::Flat,
            present: 0,
            expected,
            reasons: vec!["no signals present".to_string()],
            computed_at: now,
        };
    }

    let present_weight: f64 = present.iter().map(|(input, _)| input.weight).sum();
    let bias = present
        .iter()
        .map(|(input, centered)| input.weight * centered)
        .sum::<f64>()
        / present_weight;

    let coverage = (present_weight / total_weight).min(1.0);
    let agreement = sign_agreement(&present);
    let confidence = (coverage * (0.5 + 0.5 * agreement)).clamp(0.0, 1.0);

    let label = if bias > config.flat_threshold {
        BiasLabel::Bullish
    } else if bias < -config.flat_threshold {
        BiasLabel::Bearish
    } else {
        BiasLabel::Flat
    };

    let mut reasons: Vec<String> = present
        .iter()
        .map(|(input, centered)| {
            format!(
                "{}: {:+.2} (weight {:.2})",
                input.key, centered, input.weight
            )
        })
        .collect();
    let missing = expected - present.len();
    if missing > 0 {
        reasons.push(format!("{} of {} signals missing", missing, expected));
    }

    EnsembleOutcome {
        bias: bias.clamp(-1.0, 1.0),
        confidence,
        label,
        present: present.len(),
        expected,
        reasons,
        computed_at: now,
    }
}

/// Fraction of present components agreeing in sign: |sum of signs| over
/// the component count, 0 to 1.
fn sign_agreement(present: &[(&EnsembleInput, f64)]) -> f64 {
    if present.is_empty() {
        return 0.0;
    }
    let sign_sum: f64 = present
        .iter()
        .map(|(_, centered)| {
            if *centered > 0.0 {
                1.0
            } else if *centered < 0.0 {
                -1.0
            } else {
                0.0
            }
        })
        .sum();
    sign_sum.abs() / present.len() as f64
}
