//! Outbound delivery contract
//!
//! Delivery collaborators (chat bots, report generators) are external;
//! the engine only exposes alerts to them. The runtime forwards every
//! published alert to the configured channel.

use crate::models::alert::Alert;
use async_trait::async_trait;
use tracing::info;

/// One delivery channel for published alerts. Implementations must not
/// block the runtime; failures are logged and the alert is not retried
/// (the next detection republishes it).
#[async_trait]
pub trait AlertDelivery: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Default channel: structured log lines. External processes tail them
/// or poll the HTTP surface instead.
pub struct LogDelivery;

#[async_trait]
impl AlertDelivery for LogDelivery {
    async fn deliver(&self, alert: &Alert) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            fingerprint = %alert.fingerprint,
            state = ?alert.state,
            priority = ?alert.priority,
            severity = alert.severity,
            "alert published"
        );
        Ok(())
    }
}
