//! Unit tests for the rolling window statistics

use chrono::{Duration, Utc};
use vigil::analysis::window::{RollingWindow, WindowState};

fn fill(window: &mut RollingWindow, values: &[f64]) {
    let start = Utc::now();
    for (i, value) in values.iter().enumerate() {
        window.push(start + Duration::seconds(i as i64), *value);
    }
}

#[test]
fn test_capacity_bound_holds() {
    let mut window = RollingWindow::new(10, 5);
    fill(&mut window, &(0..100).map(|i| i as f64).collect::<Vec<_>>());
    assert_eq!(window.len(), 10);
}

#[test]
fn test_warming_until_minimum_samples() {
    let mut window = RollingWindow::new(50, 20);
    fill(&mut window, &vec![1.0; 19]);
    assert_eq!(window.state(), WindowState::Warming);
    window.push(Utc::now(), 1.0);
    assert_eq!(window.state(), WindowState::Ready);
}

#[test]
fn test_incremental_stats_match_direct_computation() {
    // Push past capacity so evictions exercise the reverse update.
    let values: Vec<f64> = (0..40).map(|i| ((i * 37) % 17) as f64 - 8.0).collect();
    let mut window = RollingWindow::new(16, 5);
    fill(&mut window, &values);

    let retained: Vec<f64> = values[values.len() - 16..].to_vec();
    let direct_mean = retained.iter().sum::<f64>() / retained.len() as f64;
    let direct_var = retained
        .iter()
        .map(|v| (v - direct_mean).powi(2))
        .sum::<f64>()
        / (retained.len() as f64 - 1.0);

    assert!((window.mean() - direct_mean).abs() < 1e-9);
    assert!((window.variance() - direct_var).abs() < 1e-9);
}

#[test]
fn test_zero_variance_z_score_is_none() {
    let mut window = RollingWindow::new(30, 5);
    fill(&mut window, &vec![42.0; 25]);
    assert!(window.z_score(42.0).is_none());
    assert!(window.z_score(1000.0).is_none());
}

#[test]
fn test_z_score_for_known_distribution() {
    // Values 1..=9: mean 5, sample stdev sqrt(7.5)
    let mut window = RollingWindow::new(20, 5);
    fill(&mut window, &(1..=9).map(|i| i as f64).collect::<Vec<_>>());
    let z = window.z_score(10.0).unwrap();
    let expected = (10.0 - 5.0) / 7.5_f64.sqrt();
    assert!((z - expected).abs() < 1e-9);
}

#[test]
fn test_series_snapshot_is_ordered() {
    let mut window = RollingWindow::new(5, 2);
    fill(&mut window, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    let series = window.series();
    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    assert_eq!(values, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
}
