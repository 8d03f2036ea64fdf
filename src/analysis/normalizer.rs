//! Observation normalization onto the common 0-100 scale
//!
//! Pure functions of observation plus registered calibration; no state.
//! Non-finite raw values become no-data scores, never a silent zero.

use crate::models::signal::{
    Calibration, NormalizedScore, Observation, ScoreBucket, Signal,
};

/// Map a raw observation to a 0-100 score using the signal's
/// calibration. The caller guarantees `signal.key == observation.key`.
pub fn normalize(signal: &Signal, observation: &Observation) -> NormalizedScore {
    if !observation.value.is_finite() {
        let mut score = NormalizedScore::no_data(observation.key.clone(), observation.timestamp);
        score.quality = observation.quality;
        return score;
    }

    let raw = match &signal.calibration {
        Calibration::Linear { min, max } => (observation.value - min) / (max - min) * 100.0,
        Calibration::ZScore { mean, stdev } => {
            let z = (observation.value - mean) / stdev;
            normal_cdf(z) * 100.0
        }
        Calibration::Buckets { steps } => {
            let mut score = steps.last().map(|s| s.score).unwrap_or(0.0);
            for step in steps {
                if observation.value <= step.upper {
                    score = step.score;
                    break;
                }
            }
            score
        }
    };

    let clamped = raw.clamp(0.0, 100.0);
    NormalizedScore {
        key: observation.key.clone(),
        timestamp: observation.timestamp,
        score: Some(clamped),
        bucket: Some(ScoreBucket::from_score(clamped)),
        quality: observation.quality,
    }
}

/// Standard normal CDF via the Abramowitz-Stegun erf approximation
/// (7.1.26), accurate to ~1.5e-7. Good enough for percentile mapping.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}
