//! HTTP query surface using Axum
//!
//! Read-only: delivery collaborators poll scores, open alerts, and
//! correlation hypotheses. The engine is the sole writer of its state.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::engine::AnalysisEngine;
use crate::ingress::{IngressError, ProducerHandle};
use crate::metrics::Metrics;
use crate::models::signal::{QualityFlag, SignalKey};

/// Everything the server needs from the composition root.
pub struct ServerDeps {
    pub engine: Arc<AnalysisEngine>,
    pub metrics: Arc<Metrics>,
    /// Producer handle backing the HTTP push endpoint. `None` disables
    /// submission (read-only deployment).
    pub producer: Option<ProducerHandle>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnalysisEngine>,
    pub metrics: Arc<Metrics>,
    pub producer: Option<ProducerHandle>,
    pub start_time: Arc<Instant>,
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": "vigil-analysis-engine",
        "signals": state.engine.registry().len(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    state.metrics.http_requests_in_flight.inc();

    let response = next.run(request).await;

    state.metrics.http_requests_in_flight.dec();
    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Current normalized score per signal key.
async fn list_scores(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.engine.scores().await))
}

/// Score for one key, addressed as `source:indicator:instrument`.
async fn get_score(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let key = SignalKey::from_str(&key).map_err(|_| StatusCode::BAD_REQUEST)?;
    if !state.engine.registry().contains(&key) {
        return Err(StatusCode::NOT_FOUND);
    }
    match state.engine.score(&key).await {
        Some(score) => Ok(Json(json!(score))),
        None => Ok(Json(json!({ "key": key, "score": null }))),
    }
}

/// Open alerts, highest priority first.
async fn list_alerts(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.engine.open_alerts().await))
}

/// Latest correlation hypothesis per configured pair.
async fn list_correlations(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.engine.hypotheses().await))
}

/// Latest ensemble outcome, if a tick has run.
async fn get_ensemble(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.engine.ensemble_outcome().await))
}

/// Registered signals (the engine's watchlist).
async fn list_signals(State(state): State<AppState>) -> Json<Value> {
    let signals: Vec<_> = state.engine.registry().signals().collect();
    Json(json!(signals))
}

#[derive(Debug, Deserialize)]
struct SubmitObservationRequest {
    key: String,
    timestamp: DateTime<Utc>,
    value: f64,
    #[serde(default)]
    quality: Option<QualityFlag>,
}

/// Push endpoint for ingestion adapters: `submit(key, timestamp,
/// value, qualityFlag)`. The engine validates shape and registration;
/// everything else is the adapter's job.
async fn submit_observation(
    State(state): State<AppState>,
    Json(request): Json<SubmitObservationRequest>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let producer = state.producer.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "submission disabled" })),
    ))?;

    let key = SignalKey::from_str(&request.key).map_err(|e| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": e })))
    })?;

    match producer.submit(key, request.timestamp, request.value, request.quality) {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(IngressError::UnregisteredKey(key)) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unregistered signal key '{}'", key) })),
        )),
        Err(e @ IngressError::QueueFull { .. }) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/scores", get(list_scores))
        .route("/api/scores/{key}", get(get_score))
        .route("/api/alerts", get(list_alerts))
        .route("/api/correlations", get(list_correlations))
        .route("/api/ensemble", get(get_ensemble))
        .route("/api/signals", get(list_signals))
        .route("/api/observations", post(submit_observation))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(port: u16, deps: ServerDeps) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState {
        engine: deps.engine,
        metrics: deps.metrics,
        producer: deps.producer,
        start_time: Arc::new(Instant::now()),
    };
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
