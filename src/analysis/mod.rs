//! Analysis algorithms: normalization, rolling statistics, anomaly
//! rules, lag correlation, and ensemble scoring.

pub mod anomaly;
pub mod correlation;
pub mod ensemble;
pub mod normalizer;
pub mod window;

pub use anomaly::KeyDetector;
pub use ensemble::{BiasLabel, EnsembleInput, EnsembleOutcome};
pub use window::{RollingWindow, WindowState};
