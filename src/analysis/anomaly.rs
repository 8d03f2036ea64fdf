//! Anomaly detection rules
//!
//! Per-key volume-spike detection runs synchronously on each append
//! (O(1) against the rolling window). Sentiment-shift and cross-signal
//! divergence are tick-level rules evaluated by the engine once all
//! normalized scores for the tick are available.

use crate::analysis::window::{RollingWindow, WindowState};
use crate::config::DetectorConfig;
use crate::models::anomaly::{AnomalyEvent, AnomalyKind, DetectorStatus};
use crate::models::signal::SignalKey;
use chrono::{DateTime, Utc};

/// Per-key detector state: the rolling window plus warm-up tracking.
#[derive(Debug)]
pub struct KeyDetector {
    key: SignalKey,
    window: RollingWindow,
}

impl KeyDetector {
    pub fn new(key: SignalKey, capacity: usize, warmup: usize) -> Self {
        Self {
            key,
            window: RollingWindow::new(capacity, warmup),
        }
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    /// Append one raw value and evaluate the volume-spike rule against
    /// the updated window.
    ///
    /// Returns `InsufficientData` until the window holds the warm-up
    /// sample count; a zero-variance window reports no anomaly rather
    /// than an undefined z-score.
    pub fn observe(
        &mut self,
        timestamp: DateTime<Utc>,
        value: f64,
        config: &DetectorConfig,
    ) -> DetectorStatus {
        self.window.push(timestamp, value);

        if self.window.state() == WindowState::Warming {
            return DetectorStatus::InsufficientData {
                have: self.window.len(),
                need: self.window.warmup(),
            };
        }

        let z = match self.window.z_score(value) {
            Some(z) => z,
            None => return DetectorStatus::NoAnomaly,
        };

        if z.abs() <= config.z_score_cutoff {
            return DetectorStatus::NoAnomaly;
        }

        let severity = spike_severity(z, config);
        let event = AnomalyEvent {
            key: self.key.clone(),
            paired_key: None,
            kind: AnomalyKind::VolumeSpike,
            severity,
            detected_at: timestamp,
            statistic: z,
            reason: format!(
                "value {:.4} deviates {:.2} stdevs from rolling mean {:.4}",
                value,
                z.abs(),
                self.window.mean()
            ),
        };
        DetectorStatus::Anomalous(vec![event])
    }
}

/// Severity scales with z-score magnitude past the cutoff, capped at 1.
fn spike_severity(z: f64, config: &DetectorConfig) -> f64 {
    (z.abs() / config.z_score_cap).min(1.0)
}

/// Sentiment-shift rule: the change of a bounded-sentiment score
/// between consecutive evaluation ticks exceeds the configured rate.
/// The polarity flip is recorded in the statistic's sign.
pub fn detect_sentiment_shift(
    key: &SignalKey,
    previous_score: f64,
    current_score: f64,
    config: &DetectorConfig,
    now: DateTime<Utc>,
) -> Option<AnomalyEvent> {
    let delta = current_score - previous_score;
    if delta.abs() < config.sentiment_shift_threshold {
        return None;
    }

    let direction = if delta > 0.0 { "bullish" } else { "bearish" };
    Some(AnomalyEvent {
        key: key.clone(),
        paired_key: None,
        kind: AnomalyKind::SentimentShift,
        severity: (delta.abs() / 50.0).min(1.0),
        detected_at: now,
        statistic: delta,
        reason: format!(
            "sentiment score moved {:.1} -> {:.1} ({} shift of {:.1} points)",
            previous_score,
            current_score,
            direction,
            delta.abs()
        ),
    })
}

/// Cross-signal divergence rule: two independently normalized signals
/// moved in opposite directions beyond the minimum magnitude within the
/// same evaluation tick.
pub fn detect_divergence(
    key_a: &SignalKey,
    key_b: &SignalKey,
    delta_a: f64,
    delta_b: f64,
    config: &DetectorConfig,
    now: DateTime<Utc>,
) -> Option<AnomalyEvent> {
    let opposite = (delta_a > 0.0 && delta_b < 0.0) || (delta_a < 0.0 && delta_b > 0.0);
    if !opposite {
        return None;
    }
    if delta_a.abs() < config.divergence_min_magnitude
        || delta_b.abs() < config.divergence_min_magnitude
    {
        return None;
    }

    let magnitude = (delta_a.abs() + delta_b.abs()) / 2.0;
    Some(AnomalyEvent {
        key: key_a.clone(),
        paired_key: Some(key_b.clone()),
        kind: AnomalyKind::CrossSignalDivergence,
        severity: (magnitude / 50.0).min(1.0),
        detected_at: now,
        statistic: magnitude,
        reason: format!(
            "{} moved {:+.1} while {} moved {:+.1} in the same tick",
            key_a, delta_a, key_b, delta_b
        ),
    })
}
