//! Lagged correlation search between event and reaction series
//!
//! Batch computation: the search is O(series-length x lag-range), so it
//! runs on the scheduled correlation tick, not per observation. The
//! async search yields between lag candidates so callers can time-box
//! it with `tokio::time::timeout`; a timeout maps to an inconclusive
//! hypothesis rather than blocking the tick.

use crate::config::CorrelationConfig;
use crate::models::correlation::{
    CorrelationHypothesis, CorrelationStatus, InconclusiveReason,
};
use crate::models::signal::SignalKey;
use chrono::{DateTime, Utc};

/// Search every lag in `[-max_lag, +max_lag]` for the one maximizing
/// the absolute Pearson coefficient between the event series and the
/// lag-shifted reaction series.
///
/// Positive lag means the reaction trails the event: the event value at
/// index `i` is paired with the reaction value at `i + lag`. Samples
/// are aligned by index over the overlapping timestamp range, which
/// assumes both series share the evaluation cadence.
pub async fn correlate(
    event_key: SignalKey,
    reaction_key: SignalKey,
    event: &[(DateTime<Utc>, f64)],
    reaction: &[(DateTime<Utc>, f64)],
    config: &CorrelationConfig,
    now: DateTime<Utc>,
) -> CorrelationHypothesis {
    let inconclusive = |reason| {
        CorrelationHypothesis::inconclusive(event_key.clone(), reaction_key.clone(), reason, now)
    };

    let (event_values, reaction_values) = overlapping_values(event, reaction);
    if event_values.len() < config.min_samples || reaction_values.len() < config.min_samples {
        return inconclusive(InconclusiveReason::TooFewSamples);
    }

    // A constant series cannot carry correlation; report it rather than
    // producing NaN coefficients downstream.
    if is_degenerate(&event_values) || is_degenerate(&reaction_values) {
        return inconclusive(InconclusiveReason::DegenerateSeries);
    }

    let max_lag = config.max_lag as i64;
    let mut best: Option<(i64, f64, usize)> = None;

    for (i, lag) in (-max_lag..=max_lag).enumerate() {
        // Cooperative cancellation point for the caller's time budget.
        if i % 8 == 7 {
            tokio::task::yield_now().await;
        }

        if let Some((r, n)) = pearson_at_lag(&event_values, &reaction_values, lag) {
            if n < config.min_samples {
                continue;
            }
            let better = match best {
                Some((_, best_r, _)) => r.abs() > best_r.abs(),
                None => true,
            };
            if better {
                best = Some((lag, r, n));
            }
        }
    }

    let (best_lag, coefficient, sample_count) = match best {
        Some(found) => found,
        None => return inconclusive(InconclusiveReason::TooFewSamples),
    };

    let significance = fisher_z(coefficient, sample_count);
    let status = if significance.abs() >= config.significance_bound {
        CorrelationStatus::Confirmed
    } else {
        CorrelationStatus::Inconclusive {
            reason: InconclusiveReason::BelowSignificance,
        }
    };

    CorrelationHypothesis {
        event_key,
        reaction_key,
        best_lag,
        coefficient,
        significance,
        sample_count,
        status,
        computed_at: now,
    }
}

/// Restrict both series to their overlapping timestamp range and strip
/// non-finite values, keeping index alignment by order.
fn overlapping_values(
    event: &[(DateTime<Utc>, f64)],
    reaction: &[(DateTime<Utc>, f64)],
) -> (Vec<f64>, Vec<f64>) {
    let bounds = |s: &[(DateTime<Utc>, f64)]| s.first().map(|f| (f.0, s[s.len() - 1].0));
    let (Some((e_start, e_end)), Some((r_start, r_end))) = (bounds(event), bounds(reaction))
    else {
        return (Vec::new(), Vec::new());
    };

    let start = e_start.max(r_start);
    let end = e_end.min(r_end);

    let clip = |s: &[(DateTime<Utc>, f64)]| {
        s.iter()
            .filter(|(ts, v)| *ts >= start && *ts <= end && v.is_finite())
            .map(|(_, v)| *v)
            .collect::<Vec<f64>>()
    };
    (clip(event), clip(reaction))
}

fn is_degenerate(values: &[f64]) -> bool {
    let Some(first) = values.first() else {
        return true;
    };
    values.iter().all(|v| (v - first).abs() <= f64::EPSILON)
}

/// Pearson coefficient of `x[i]` against `y[i + lag]` over the valid
/// index range. Returns the coefficient and the pair count, or `None`
/// when the overlap is empty or degenerate at this lag.
pub fn pearson_at_lag(x: &[f64], y: &[f64], lag: i64) -> Option<(f64, usize)> {
    let pairs: Vec<(f64, f64)> = (0..x.len() as i64)
        .filter_map(|i| {
            let j = i + lag;
            if j >= 0 && (j as usize) < y.len() {
                Some((x[i as usize], y[j as usize]))
            } else {
                None
            }
        })
        .collect();

    pearson(&pairs).map(|r| (r, pairs.len()))
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return None;
    }

    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Fisher-transform z statistic: `atanh(r) * sqrt(n - 3)`. Standard
/// significance test for a Pearson coefficient at moderate sample
/// sizes; requires n > 3.
pub fn fisher_z(r: f64, n: usize) -> f64 {
    if n <= 3 {
        return 0.0;
    }
    // atanh diverges at |r| = 1; clamp just inside the open interval.
    let clamped = r.clamp(-0.999_999, 0.999_999);
    let z = 0.5 * ((1.0 + clamped) / (1.0 - clamped)).ln();
    z * ((n - 3) as f64).sqrt()
}
