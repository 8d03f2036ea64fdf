//! Vigil Analysis Engine Server
//!
//! Runs the full engine: ingress, scheduled evaluation/correlation
//! passes, alert lifecycle, and the read-only HTTP query surface.
//! Ingestion adapters push observations over HTTP or in-process.

use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use vigil::config::EngineConfig;
use vigil::core::http::{start_server, ServerDeps};
use vigil::core::runtime::{EngineRuntime, RuntimeConfig};
use vigil::delivery::LogDelivery;
use vigil::engine::AnalysisEngine;
use vigil::ingress::Ingress;
use vigil::logging;
use vigil::metrics::Metrics;
use vigil::registry::{RegistryConfig, SignalRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();
    logging::init_logging();

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let environment = vigil::config::get_environment();
    info!("Starting Vigil Analysis Engine");
    info!(environment = %environment, "Environment");

    let engine_config = EngineConfig::from_env();
    engine_config.validate()?;

    // Signal definitions are static configuration resolved at startup.
    let registry = match env::var("VIGIL_SIGNALS_PATH") {
        Ok(path) => {
            info!(path = %path, "loading signal registry");
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| format!("failed to read '{}': {}", path, e))?;
            let config: RegistryConfig = serde_json::from_str(&raw)
                .map_err(|e| format!("failed to parse '{}': {}", path, e))?;
            SignalRegistry::from_config(config)?
        }
        Err(_) => {
            warn!("VIGIL_SIGNALS_PATH not set - starting with an empty registry");
            warn!("Every submitted observation will be rejected until signals are configured");
            SignalRegistry::new()
        }
    };
    info!(signals = registry.len(), "signal registry ready");
    let registry = Arc::new(registry);

    let metrics = Arc::new(Metrics::new()?);
    let engine = Arc::new(
        AnalysisEngine::new(engine_config.clone(), registry.clone())?
            .with_metrics(metrics.clone()),
    );

    let ingress = Arc::new(
        Ingress::new(engine_config.ingress.clone(), registry.clone())
            .with_metrics(metrics.clone()),
    );
    // The HTTP push endpoint is one producer; in-process adapters
    // register their own queues.
    let http_producer = ingress.register_producer("http");

    let runtime_config = RuntimeConfig {
        evaluation_interval_seconds: env::var("VIGIL_EVAL_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60),
        correlation_interval_seconds: env::var("VIGIL_CORRELATION_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300),
    };

    let runtime = EngineRuntime::new(
        runtime_config,
        engine.clone(),
        ingress.clone(),
        Arc::new(LogDelivery),
    )
    .map_err(|e| format!("failed to create runtime: {}", e))?;
    let worker_handles = runtime
        .start()
        .await
        .map_err(|e| format!("failed to start runtime: {}", e))?;

    let server_engine = engine.clone();
    let server_metrics = metrics.clone();
    let server_handle = tokio::spawn(async move {
        let deps = ServerDeps {
            engine: server_engine,
            metrics: server_metrics,
            producer: Some(http_producer),
        };
        if let Err(e) = start_server(port, deps).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("Engine started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down engine...");
            runtime.stop().await;
            for handle in worker_handles {
                handle.abort();
            }
            info!("Engine stopped");
        }
        _ = server_handle => {
            error!("HTTP server stopped unexpectedly");
        }
    }

    Ok(())
}
