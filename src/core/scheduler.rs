//! Cron-based scheduler for the engine's periodic passes

use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Fires a named pass on a fixed cadence. The evaluation tick and the
/// (more expensive) correlation pass each get their own scheduler.
pub struct TickScheduler {
    name: &'static str,
    schedule: Schedule,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl TickScheduler {
    /// `interval_seconds` must be positive; 0 disables the pass and is
    /// rejected so misconfiguration is loud.
    pub fn new(
        name: &'static str,
        interval_seconds: u64,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if interval_seconds == 0 {
            return Err(format!("scheduler '{}' disabled: interval is 0", name).into());
        }

        // Cron format: second minute hour day month weekday
        let cron_expr = if interval_seconds >= 60 {
            let minutes = interval_seconds / 60;
            format!("0 */{} * * * *", minutes)
        } else {
            format!("*/{} * * * * *", interval_seconds)
        };

        let schedule = Schedule::from_str(&cron_expr).map_err(|e| {
            format!("invalid cron expression '{}': {}", cron_expr, e)
        })?;

        info!(
            scheduler = name,
            interval = interval_seconds,
            cron = %cron_expr,
            "tick scheduler created"
        );

        Ok(Self {
            name,
            schedule,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    /// Start firing `tick` on the schedule.
    pub async fn start<F, Fut>(&self, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let schedule = self.schedule.clone();
        let name = self.name;
        let handle_arc = self.handle.clone();

        let handle = tokio::spawn(async move {
            info!(scheduler = name, "tick scheduler started");
            loop {
                let mut upcoming = schedule.upcoming(chrono::Utc);
                if let Some(next_tick) = upcoming.next() {
                    let now = chrono::Utc::now();
                    if next_tick > now {
                        let duration = (next_tick - now).to_std().unwrap_or_default();
                        tokio::time::sleep(duration).await;
                    }
                } else {
                    tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
                    continue;
                }

                debug!(scheduler = name, "tick");
                tick().await;
            }
        });

        let mut h = handle_arc.write().await;
        *h = Some(handle);
    }

    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(h) = handle.take() {
            h.abort();
            info!(scheduler = self.name, "tick scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
