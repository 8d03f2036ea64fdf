//! Analysis engine core: sharded per-key state and scheduled passes
//!
//! Observations for a given key are serialized through that key's
//! shard; different keys update in parallel. Cross-key passes
//! (sentiment shift, divergence, ensemble, correlation) run on ticks
//! behind a barrier that locks every shard before reading, so they
//! never observe a partially updated window.

use crate::alerts::{AlertManager, AlertOutcome};
use crate::analysis::anomaly::{detect_divergence, detect_sentiment_shift, KeyDetector};
use crate::analysis::correlation::correlate;
use crate::analysis::ensemble::{aggregate, EnsembleInput, EnsembleOutcome};
use crate::analysis::normalizer::normalize;
use crate::config::EngineConfig;
use crate::metrics::Metrics;
use crate::models::alert::{Alert, Fingerprint};
use crate::models::anomaly::{AnomalyEvent, DetectorStatus};
use crate::models::correlation::{CorrelationHypothesis, InconclusiveReason};
use crate::models::signal::{
    NormalizedScore, Observation, QualityFlag, SignalClass, SignalKey,
};
use crate::registry::{ConfigError, SignalRegistry};
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

const SHARD_COUNT: usize = 16;
const ALERT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct KeyState {
    class: SignalClass,
    detector: KeyDetector,
    latest: Option<NormalizedScore>,
    /// Normalized score as of the previous evaluation tick, for
    /// tick-over-tick deltas.
    last_tick_score: Option<f64>,
}

#[derive(Debug, Default)]
struct Shard {
    keys: HashMap<SignalKey, KeyState>,
}

/// Result of ingesting one observation.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub score: NormalizedScore,
    pub status: DetectorStatus,
}

/// Result of one evaluation tick, for callers that want to inspect it.
#[derive(Debug, Clone)]
pub struct TickSummary {
    pub anomalies: Vec<AnomalyEvent>,
    pub ensemble: EnsembleOutcome,
}

/// The analysis engine. Construct one per process (or per test); no
/// global state is shared between instances.
pub struct AnalysisEngine {
    config: EngineConfig,
    registry: Arc<SignalRegistry>,
    metrics: Option<Arc<Metrics>>,
    shards: Vec<Mutex<Shard>>,
    alerts: Mutex<AlertManager>,
    ensemble: RwLock<Option<EnsembleOutcome>>,
    hypotheses: RwLock<HashMap<(SignalKey, SignalKey), CorrelationHypothesis>>,
    alert_tx: broadcast::Sender<Alert>,
}

impl AnalysisEngine {
    /// Build the engine for a registry. Every registered key gets its
    /// per-key state up front, so an unregistered key mid-run is a
    /// configuration error, never a silent insert.
    pub fn new(config: EngineConfig, registry: Arc<SignalRegistry>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut shards: Vec<Shard> = (0..SHARD_COUNT).map(|_| Shard::default()).collect();
        for signal in registry.signals() {
            let state = KeyState {
                class: signal.class,
                detector: KeyDetector::new(
                    signal.key.clone(),
                    config.window.capacity,
                    config.window.warmup,
                ),
                latest: None,
                last_tick_score: None,
            };
            shards[shard_index(&signal.key)]
                .keys
                .insert(signal.key.clone(), state);
        }

        let (alert_tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        info!(
            signals = registry.len(),
            divergence_pairs = registry.divergence_pairs().len(),
            correlation_pairs = registry.correlation_pairs().len(),
            "analysis engine initialized"
        );

        Ok(Self {
            alerts: Mutex::new(AlertManager::new(config.alerts.clone())),
            config,
            registry,
            metrics: None,
            shards: shards.into_iter().map(Mutex::new).collect(),
            ensemble: RwLock::new(None),
            hypotheses: RwLock::new(HashMap::new()),
            alert_tx,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    /// Subscribe to alert creations and escalations (in-process
    /// delivery collaborators).
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alert_tx.subscribe()
    }

    /// Normalize one observation, update the key's window, and run the
    /// synchronous (O(1)) volume-spike rule.
    ///
    /// Stale observations are normalized but excluded from window
    /// statistics; non-finite values become no-data scores.
    pub async fn ingest(&self, observation: Observation) -> Result<IngestOutcome, ConfigError> {
        let signal = self.registry.require(&observation.key)?;
        let score = normalize(signal, &observation);

        if let Some(ref metrics) = self.metrics {
            metrics.observations_ingested_total.inc();
            if score.is_no_data() {
                metrics.no_data_scores_total.inc();
            }
        }

        let exclude_from_stats =
            score.is_no_data() || observation.quality == Some(QualityFlag::Stale);

        let status = {
            let mut shard = self.shards[shard_index(&observation.key)].lock().await;
            let state = shard
                .keys
                .get_mut(&observation.key)
                .ok_or_else(|| ConfigError::UnregisteredKey(observation.key.clone()))?;

            state.latest = Some(score.clone());
            if exclude_from_stats {
                debug!(key = %observation.key, "observation excluded from window statistics");
                DetectorStatus::NoAnomaly
            } else {
                state.detector.observe(
                    observation.timestamp,
                    observation.value,
                    &self.config.detector,
                )
            }
        };

        if let DetectorStatus::Anomalous(ref events) = status {
            self.record_anomalies(events, observation.timestamp).await;
        }

        Ok(IngestOutcome { score, status })
    }

    async fn record_anomalies(&self, events: &[AnomalyEvent], now: DateTime<Utc>) {
        let mut alerts = self.alerts.lock().await;
        for event in events {
            if let Some(ref metrics) = self.metrics {
                metrics.anomalies_detected_total.inc();
            }
            info!(
                key = %event.key,
                kind = ?event.kind,
                severity = event.severity,
                statistic = event.statistic,
                "anomaly detected"
            );
            let outcome = alerts.observe_anomaly(event.clone(), now);
            self.publish_on_change(&alerts, Fingerprint::for_anomaly(event), outcome);
        }
        if let Some(ref metrics) = self.metrics {
            metrics.alerts_open.set(alerts.open_count() as i64);
        }
    }

    fn publish_on_change(
        &self,
        alerts: &AlertManager,
        fingerprint: Fingerprint,
        outcome: AlertOutcome,
    ) {
        if matches!(outcome, AlertOutcome::Created | AlertOutcome::Escalated) {
            if let Some(alert) = alerts.get(&fingerprint) {
                // No subscribers is fine; delivery is optional.
                let _ = self.alert_tx.send(alert.clone());
            }
        }
    }

    /// The scheduled evaluation tick: sentiment shifts, cross-signal
    /// divergence, ensemble aggregation, and the alert sweep.
    pub async fn evaluate_tick(&self, now: DateTime<Utc>) -> TickSummary {
        let started = Instant::now();

        // Per-tick barrier: hold every shard lock while snapshotting so
        // no single-key update is observed half-applied.
        let mut scores: HashMap<SignalKey, Option<f64>> = HashMap::new();
        let mut deltas: HashMap<SignalKey, f64> = HashMap::new();
        let mut classes: HashMap<SignalKey, SignalClass> = HashMap::new();
        let mut previous: HashMap<SignalKey, f64> = HashMap::new();
        {
            let mut guards = Vec::with_capacity(self.shards.len());
            for shard in &self.shards {
                guards.push(shard.lock().await);
            }
            for guard in guards.iter_mut() {
                for (key, state) in guard.keys.iter_mut() {
                    let current = state.latest.as_ref().and_then(|s| s.score);
                    scores.insert(key.clone(), current);
                    classes.insert(key.clone(), state.class);
                    if let (Some(prev), Some(cur)) = (state.last_tick_score, current) {
                        deltas.insert(key.clone(), cur - prev);
                        previous.insert(key.clone(), prev);
                    }
                    if current.is_some() {
                        state.last_tick_score = current;
                    }
                }
            }
        }

        let mut anomalies = Vec::new();

        // Sentiment shifts: tick-over-tick movement of sentiment-class
        // scores.
        for (key, delta) in &deltas {
            if classes.get(key) != Some(&SignalClass::Sentiment) {
                continue;
            }
            let prev = previous[key];
            if let Some(event) =
                detect_sentiment_shift(key, prev, prev + delta, &self.config.detector, now)
            {
                anomalies.push(event);
            }
        }

        // Divergence: configured pairs moving opposite ways this tick.
        for (a, b) in self.registry.divergence_pairs() {
            let (Some(delta_a), Some(delta_b)) = (deltas.get(a), deltas.get(b)) else {
                continue;
            };
            if let Some(event) =
                detect_divergence(a, b, *delta_a, *delta_b, &self.config.detector, now)
            {
                anomalies.push(event);
            }
        }

        // Ensemble over whatever scores are present.
        let inputs: Vec<EnsembleInput> = self
            .registry
            .signals()
            .map(|signal| EnsembleInput {
                key: signal.key.clone(),
                weight: signal.weight,
                score: scores.get(&signal.key).copied().flatten(),
            })
            .collect();
        let ensemble = aggregate(&inputs, &self.config.ensemble, now);
        debug!(
            bias = ensemble.bias,
            confidence = ensemble.confidence,
            present = ensemble.present,
            expected = ensemble.expected,
            "ensemble aggregated"
        );
        *self.ensemble.write().await = Some(ensemble.clone());

        self.record_anomalies(&anomalies, now).await;

        {
            let mut alerts = self.alerts.lock().await;
            let transitions = alerts.sweep(now);
            if !transitions.is_empty() {
                debug!(count = transitions.len(), "alert sweep transitions");
            }
            if let Some(ref metrics) = self.metrics {
                metrics.alerts_open.set(alerts.open_count() as i64);
            }
        }

        if let Some(ref metrics) = self.metrics {
            metrics
                .tick_duration_seconds
                .observe(started.elapsed().as_secs_f64());
        }

        TickSummary {
            anomalies,
            ensemble,
        }
    }

    /// The scheduled correlation pass over every configured pair.
    /// Time-boxed per pair; a timeout is an inconclusive result and the
    /// pair is retried on the next pass. One pair's failure never
    /// aborts the rest.
    pub async fn correlation_tick(&self, now: DateTime<Utc>) -> Vec<CorrelationHypothesis> {
        let budget = Duration::from_millis(self.config.correlation.time_budget_ms);
        let mut results = Vec::new();

        for (event_key, reaction_key) in self.registry.correlation_pairs() {
            let event_series = self.snapshot_series(event_key).await;
            let reaction_series = self.snapshot_series(reaction_key).await;

            let hypothesis = match tokio::time::timeout(
                budget,
                correlate(
                    event_key.clone(),
                    reaction_key.clone(),
                    &event_series,
                    &reaction_series,
                    &self.config.correlation,
                    now,
                ),
            )
            .await
            {
                Ok(hypothesis) => hypothesis,
                Err(_) => {
                    warn!(
                        event = %event_key,
                        reaction = %reaction_key,
                        budget_ms = self.config.correlation.time_budget_ms,
                        "correlation search exceeded time budget"
                    );
                    if let Some(ref metrics) = self.metrics {
                        metrics.correlation_timeouts_total.inc();
                    }
                    CorrelationHypothesis::inconclusive(
                        event_key.clone(),
                        reaction_key.clone(),
                        InconclusiveReason::TimedOut,
                        now,
                    )
                }
            };

            if let Some(ref metrics) = self.metrics {
                metrics.correlation_runs_total.inc();
            }

            if hypothesis.is_confirmed() {
                info!(
                    event = %event_key,
                    reaction = %reaction_key,
                    lag = hypothesis.best_lag,
                    coefficient = hypothesis.coefficient,
                    significance = hypothesis.significance,
                    "correlation hypothesis confirmed"
                );
                let mut alerts = self.alerts.lock().await;
                let outcome = alerts.observe_correlation(hypothesis.clone(), now);
                self.publish_on_change(
                    &alerts,
                    Fingerprint::for_correlation(&hypothesis),
                    outcome,
                );
            }

            // Supersede any prior hypothesis for the pair.
            self.hypotheses
                .write()
                .await
                .insert((event_key.clone(), reaction_key.clone()), hypothesis.clone());
            results.push(hypothesis);
        }
        results
    }

    async fn snapshot_series(&self, key: &SignalKey) -> Vec<(DateTime<Utc>, f64)> {
        let shard = self.shards[shard_index(key)].lock().await;
        match shard.keys.get(key) {
            Some(state) => state.detector.window().series(),
            None => {
                error!(key = %key, "correlation pair references unknown key");
                Vec::new()
            }
        }
    }

    // --- read surface for delivery collaborators ---

    pub async fn score(&self, key: &SignalKey) -> Option<NormalizedScore> {
        let shard = self.shards[shard_index(key)].lock().await;
        shard.keys.get(key).and_then(|state| state.latest.clone())
    }

    pub async fn scores(&self) -> Vec<NormalizedScore> {
        let mut all = Vec::new();
        for shard in &self.shards {
            let guard = shard.lock().await;
            all.extend(guard.keys.values().filter_map(|s| s.latest.clone()));
        }
        all.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
        all
    }

    pub async fn open_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().await.open_alerts()
    }

    pub async fn hypotheses(&self) -> Vec<CorrelationHypothesis> {
        let mut all: Vec<CorrelationHypothesis> =
            self.hypotheses.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            (a.event_key.to_string(), a.reaction_key.to_string())
                .cmp(&(b.event_key.to_string(), b.reaction_key.to_string()))
        });
        all
    }

    pub async fn ensemble_outcome(&self) -> Option<EnsembleOutcome> {
        self.ensemble.read().await.clone()
    }
}

fn shard_index(key: &SignalKey) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}
