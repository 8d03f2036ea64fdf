//! Integration tests for the HTTP query surface

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use vigil::config::EngineConfig;
use vigil::core::http::{create_router, AppState};
use vigil::engine::AnalysisEngine;
use vigil::ingress::Ingress;
use vigil::metrics::Metrics;
use vigil::models::signal::{Calibration, Observation, Signal, SignalClass, SignalKey};
use vigil::registry::SignalRegistry;

struct Harness {
    server: TestServer,
    engine: Arc<AnalysisEngine>,
    ingress: Arc<Ingress>,
}

fn harness() -> Harness {
    let key = SignalKey::new("market", "rsi", "BTC");
    let mut registry = SignalRegistry::new();
    registry
        .register(Signal {
            key,
            class: SignalClass::Price,
            calibration: Calibration::Linear {
                min: 0.0,
                max: 100.0,
            },
            unit: "index".to_string(),
            weight: 1.0,
        })
        .unwrap();
    let registry = Arc::new(registry);

    let metrics = Arc::new(Metrics::new().unwrap());
    let config = EngineConfig::default();
    let engine = Arc::new(
        AnalysisEngine::new(config.clone(), registry.clone())
            .unwrap()
            .with_metrics(metrics.clone()),
    );
    let ingress = Arc::new(
        Ingress::new(config.ingress, registry).with_metrics(metrics.clone()),
    );
    let producer = ingress.register_producer("http");

    let state = AppState {
        engine: engine.clone(),
        metrics,
        producer: Some(producer),
        start_time: Arc::new(Instant::now()),
    };
    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        engine,
        ingress,
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness();
    let response = h.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["signals"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint_exports_engine_counters() {
    let h = harness();
    let response = h.server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("vigil_observations_ingested_total"));
}

#[tokio::test]
async fn test_submit_then_query_score() {
    let h = harness();

    let response = h
        .server
        .post("/api/observations")
        .json(&json!({
            "key": "market:rsi:BTC",
            "timestamp": Utc::now(),
            "value": 72.5
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);

    // Drain the producer queue the way a runtime worker would.
    let queue = h.ingress.queues().into_iter().next().unwrap();
    let observation = queue.pop().await;
    h.engine.ingest(observation).await.unwrap();

    let response = h.server.get("/api/scores/market:rsi:BTC").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!((body["score"].as_f64().unwrap() - 72.5).abs() < 1e-9);
    assert_eq!(body["bucket"], "bullish");

    let response = h.server.get("/api/scores").await;
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_unregistered_key_is_rejected() {
    let h = harness();
    let response = h
        .server
        .post("/api/observations")
        .json(&json!({
            "key": "market:rsi:DOGE",
            "timestamp": Utc::now(),
            "value": 10.0
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_malformed_key_is_bad_request() {
    let h = harness();
    let response = h
        .server
        .post("/api/observations")
        .json(&json!({
            "key": "not-a-key",
            "timestamp": Utc::now(),
            "value": 10.0
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_score_key_is_not_found() {
    let h = harness();
    let response = h.server.get("/api/scores/market:rsi:DOGE").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alerts_and_correlations_start_empty() {
    let h = harness();
    let alerts: Value = h.server.get("/api/alerts").await.json();
    assert_eq!(alerts.as_array().unwrap().len(), 0);
    let correlations: Value = h.server.get("/api/correlations").await.json();
    assert_eq!(correlations.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_ensemble_populated_after_tick() {
    let h = harness();
    let before: Value = h.server.get("/api/ensemble").await.json();
    assert!(before.is_null());

    let key = SignalKey::new("market", "rsi", "BTC");
    h.engine
        .ingest(Observation::new(key, Utc::now(), 80.0))
        .await
        .unwrap();
    h.engine
        .evaluate_tick(Utc::now() + Duration::seconds(1))
        .await;

    let after: Value = h.server.get("/api/ensemble").await.json();
    assert!(after["bias"].as_f64().unwrap() > 0.0);
    assert_eq!(after["label"], "bullish");
}

#[tokio::test]
async fn test_signals_listing() {
    let h = harness();
    let body: Value = h.server.get("/api/signals").await.json();
    let signals = body.as_array().unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0]["key"]["indicator"], "rsi");
}
