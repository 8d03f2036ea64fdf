//! Engine runtime: ingest workers, tick schedulers, alert delivery

use crate::core::scheduler::TickScheduler;
use crate::delivery::AlertDelivery;
use crate::engine::AnalysisEngine;
use crate::ingress::Ingress;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Cadences for the scheduled passes.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub evaluation_interval_seconds: u64,
    pub correlation_interval_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_seconds: 60,
            correlation_interval_seconds: 300,
        }
    }
}

/// Wires the engine to its ingress queues and schedulers. One drain
/// worker per producer queue keeps per-key updates flowing in parallel
/// while the engine's shards serialize each individual key.
pub struct EngineRuntime {
    config: RuntimeConfig,
    engine: Arc<AnalysisEngine>,
    ingress: Arc<Ingress>,
    delivery: Arc<dyn AlertDelivery>,
    evaluation_scheduler: TickScheduler,
    correlation_scheduler: TickScheduler,
}

impl EngineRuntime {
    pub fn new(
        config: RuntimeConfig,
        engine: Arc<AnalysisEngine>,
        ingress: Arc<Ingress>,
        delivery: Arc<dyn AlertDelivery>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let evaluation_scheduler =
            TickScheduler::new("evaluation", config.evaluation_interval_seconds)?;
        let correlation_scheduler =
            TickScheduler::new("correlation", config.correlation_interval_seconds)?;
        Ok(Self {
            config,
            engine,
            ingress,
            delivery,
            evaluation_scheduler,
            correlation_scheduler,
        })
    }

    /// Start all workers and return handles for graceful shutdown.
    pub async fn start(
        &self,
    ) -> Result<Vec<tokio::task::JoinHandle<()>>, Box<dyn std::error::Error + Send + Sync>> {
        let mut handles = Vec::new();

        // Drain workers: one per producer queue. A failure on one key
        // is logged and never aborts the worker.
        for queue in self.ingress.queues() {
            let engine = self.engine.clone();
            let producer = queue.producer().to_string();
            let handle = tokio::spawn(async move {
                info!(producer = %producer, "ingest worker started");
                loop {
                    let observation = queue.pop().await;
                    let key = observation.key.clone();
                    if let Err(e) = engine.ingest(observation).await {
                        error!(producer = %producer, key = %key, error = %e, "ingest failed");
                    }
                }
            });
            handles.push(handle);
        }

        // Alert delivery worker: forwards published alerts to the
        // configured channel.
        {
            let mut alerts = self.engine.subscribe_alerts();
            let delivery = self.delivery.clone();
            let handle = tokio::spawn(async move {
                info!("alert delivery worker started");
                loop {
                    match alerts.recv().await {
                        Ok(alert) => {
                            if let Err(e) = delivery.deliver(&alert).await {
                                error!(
                                    fingerprint = %alert.fingerprint,
                                    error = %e,
                                    "alert delivery failed"
                                );
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed = missed, "alert delivery lagging, alerts skipped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
            handles.push(handle);
        }

        let engine = self.engine.clone();
        self.evaluation_scheduler
            .start(move || {
                let engine = engine.clone();
                async move {
                    engine.evaluate_tick(chrono::Utc::now()).await;
                }
            })
            .await;

        let engine = self.engine.clone();
        self.correlation_scheduler
            .start(move || {
                let engine = engine.clone();
                async move {
                    engine.correlation_tick(chrono::Utc::now()).await;
                }
            })
            .await;

        info!(
            evaluation_interval = self.config.evaluation_interval_seconds,
            correlation_interval = self.config.correlation_interval_seconds,
            "engine runtime started"
        );
        Ok(handles)
    }

    pub async fn stop(&self) {
        self.evaluation_scheduler.stop().await;
        self.correlation_scheduler.stop().await;
        info!("engine runtime stopped");
    }
}
