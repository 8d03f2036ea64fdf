//! Alert lifecycle management
//!
//! Sole writer of alert state. Detections deduplicate against open
//! alerts by fingerprint; lifecycle transitions run on the tick sweep.

use crate::config::AlertConfig;
use crate::models::alert::{Alert, AlertState, AlertTrigger, Fingerprint};
use crate::models::anomaly::AnomalyEvent;
use crate::models::correlation::CorrelationHypothesis;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// What an incoming detection did to the alert table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// No open alert with this fingerprint existed; a new one was created.
    Created,
    /// An open alert existed; its severity was updated in place.
    Updated,
    /// The severity update crossed the escalation threshold.
    Escalated,
}

/// Owns every alert for its full lifecycle:
/// `New -> Active -> (Escalated | Resolved) -> Expired`.
#[derive(Debug)]
pub struct AlertManager {
    config: AlertConfig,
    alerts: HashMap<Fingerprint, Alert>,
}

impl AlertManager {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            alerts: HashMap::new(),
        }
    }

    pub fn observe_anomaly(&mut self, event: AnomalyEvent, now: DateTime<Utc>) -> AlertOutcome {
        let fingerprint = Fingerprint::for_anomaly(&event);
        let severity = event.severity;
        self.observe(fingerprint, AlertTrigger::Anomaly(event), severity, now)
    }

    /// Confirmed correlation hypotheses become alerts; severity is the
    /// absolute coefficient.
    pub fn observe_correlation(
        &mut self,
        hypothesis: CorrelationHypothesis,
        now: DateTime<Utc>,
    ) -> AlertOutcome {
        let fingerprint = Fingerprint::for_correlation(&hypothesis);
        let severity = hypothesis.coefficient.abs().min(1.0);
        self.observe(
            fingerprint,
            AlertTrigger::Correlation(hypothesis),
            severity,
            now,
        )
    }

    fn observe(
        &mut self,
        fingerprint: Fingerprint,
        trigger: AlertTrigger,
        severity: f64,
        now: DateTime<Utc>,
    ) -> AlertOutcome {
        let severity = severity.clamp(0.0, 1.0);

        if let Some(alert) = self.alerts.get_mut(&fingerprint) {
            if alert.state.is_open() {
                // Deduplicated: update in place, no second alert.
                alert.severity = severity;
                alert.priority = self.config.priority(severity);
                alert.trigger = trigger;
                alert.last_seen = now;

                if alert.state == AlertState::Active
                    && severity >= self.config.escalation_threshold
                {
                    alert.state = AlertState::Escalated;
                    info!(
                        fingerprint = %fingerprint,
                        severity = severity,
                        "alert escalated"
                    );
                    return AlertOutcome::Escalated;
                }
                debug!(fingerprint = %fingerprint, severity = severity, "alert updated");
                return AlertOutcome::Updated;
            }
        }

        let alert = Alert {
            fingerprint: fingerprint.clone(),
            trigger,
            state: AlertState::New,
            priority: self.config.priority(severity),
            severity,
            created_at: now,
            last_seen: now,
            resolved_at: None,
        };
        info!(
            fingerprint = %fingerprint,
            severity = severity,
            priority = ?alert.priority,
            "alert created"
        );
        self.alerts.insert(fingerprint, alert);
        AlertOutcome::Created
    }

    /// Run lifecycle transitions. Called once per evaluation tick.
    ///
    /// Expired alerts stay observable for one sweep, then are removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<(Fingerprint, AlertState)> {
        let cooldown = Duration::seconds(self.config.cooldown_secs as i64);
        let retention = Duration::seconds(self.config.retention_secs as i64);
        let mut transitions = Vec::new();

        self.alerts.retain(|_, alert| alert.state != AlertState::Expired);

        for (fingerprint, alert) in self.alerts.iter_mut() {
            let next = match alert.state {
                AlertState::New => Some(AlertState::Active),
                AlertState::Active | AlertState::Escalated
                    if now - alert.last_seen >= cooldown =>
                {
                    alert.resolved_at = Some(now);
                    Some(AlertState::Resolved)
                }
                AlertState::Resolved
                    if alert
                        .resolved_at
                        .map(|at| now - at >= retention)
                        .unwrap_or(false) =>
                {
                    Some(AlertState::Expired)
                }
                _ => None,
            };

            if let Some(state) = next {
                debug!(fingerprint = %fingerprint, from = ?alert.state, to = ?state, "alert transition");
                alert.state = state;
                transitions.push((fingerprint.clone(), state));
            }
        }
        transitions
    }

    /// Alerts a delivery collaborator should act on.
    pub fn open_alerts(&self) -> Vec<Alert> {
        let mut open: Vec<Alert> = self
            .alerts
            .values()
            .filter(|a| a.state.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.last_seen.cmp(&a.last_seen)));
        open
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Alert> {
        self.alerts.get(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.alerts.values().filter(|a| a.state.is_open()).count()
    }
}
