//! Vigil: a trust/risk signal analysis engine
//!
//! Normalizes heterogeneous indicators onto a common 0-100 scale,
//! detects statistically significant anomalies in streaming
//! time-series, and searches for lagged correlations between event and
//! reaction signals. Data-source adapters and delivery mechanisms are
//! external collaborators; this crate covers the analysis engine only.

pub mod alerts;
pub mod analysis;
pub mod config;
pub mod core;
pub mod delivery;
pub mod engine;
pub mod ingress;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod registry;
