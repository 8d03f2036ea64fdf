//! Observation ingress: typed envelope validation and bounded queueing
//!
//! One bounded queue per producer, with an explicit backpressure policy
//! instead of unbounded buffering. The engine only validates shape and
//! registration here; polling, rate limiting, and retry belong to the
//! external adapters.

use crate::config::{BackpressurePolicy, IngressConfig};
use crate::metrics::Metrics;
use crate::models::signal::{Observation, QualityFlag, SignalKey};
use crate::registry::SignalRegistry;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum IngressError {
    UnregisteredKey(SignalKey),
    /// Reject-new policy refused the observation.
    QueueFull { producer: String, capacity: usize },
}

impl fmt::Display for IngressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngressError::UnregisteredKey(key) => {
                write!(f, "observation for unregistered signal key '{}'", key)
            }
            IngressError::QueueFull { producer, capacity } => {
                write!(
                    f,
                    "queue for producer '{}' is full (capacity {})",
                    producer, capacity
                )
            }
        }
    }
}

impl std::error::Error for IngressError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushOutcome {
    Queued,
    /// Drop-oldest policy evicted the head to make room.
    DroppedOldest,
}

/// Bounded FIFO with a configurable full-queue policy. The mutex guards
/// only O(1) deque operations, so it is held briefly.
#[derive(Debug)]
pub struct ObservationQueue {
    producer: String,
    inner: Mutex<VecDeque<Observation>>,
    notify: Notify,
    capacity: usize,
    policy: BackpressurePolicy,
}

impl ObservationQueue {
    fn new(producer: String, capacity: usize, policy: BackpressurePolicy) -> Self {
        Self {
            producer,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            policy,
        }
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    fn push(&self, observation: Observation) -> Result<PushOutcome, IngressError> {
        let outcome = {
            let mut queue = self.inner.lock().expect("ingress queue lock poisoned");
            if queue.len() < self.capacity {
                queue.push_back(observation);
                PushOutcome::Queued
            } else {
                match self.policy {
                    BackpressurePolicy::DropOldest => {
                        queue.pop_front();
                        queue.push_back(observation);
                        PushOutcome::DroppedOldest
                    }
                    BackpressurePolicy::RejectNew => {
                        return Err(IngressError::QueueFull {
                            producer: self.producer.clone(),
                            capacity: self.capacity,
                        });
                    }
                }
            }
        };
        self.notify.notify_one();
        Ok(outcome)
    }

    /// Await the next observation. Used by the runtime's drain workers.
    pub async fn pop(&self) -> Observation {
        loop {
            if let Some(observation) = self
                .inner
                .lock()
                .expect("ingress queue lock poisoned")
                .pop_front()
            {
                return observation;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ingress queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle given to one external adapter. Validates and enqueues.
#[derive(Clone)]
pub struct ProducerHandle {
    queue: Arc<ObservationQueue>,
    registry: Arc<SignalRegistry>,
    metrics: Option<Arc<Metrics>>,
}

impl ProducerHandle {
    /// Submit one observation. Fails fast on an unregistered key rather
    /// than silently dropping data; surfaces queue-full under the
    /// reject-new policy.
    pub fn submit(
        &self,
        key: SignalKey,
        timestamp: DateTime<Utc>,
        value: f64,
        quality: Option<QualityFlag>,
    ) -> Result<(), IngressError> {
        if !self.registry.contains(&key) {
            if let Some(ref metrics) = self.metrics {
                metrics.observations_rejected_total.inc();
            }
            return Err(IngressError::UnregisteredKey(key));
        }

        let observation = Observation {
            key,
            timestamp,
            value,
            quality,
        };

        match self.queue.push(observation) {
            Ok(PushOutcome::Queued) => Ok(()),
            Ok(PushOutcome::DroppedOldest) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.observations_dropped_total.inc();
                }
                warn!(
                    producer = self.queue.producer(),
                    "queue full, dropped oldest observation"
                );
                Ok(())
            }
            Err(e) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.observations_rejected_total.inc();
                }
                Err(e)
            }
        }
    }
}

/// Ingress front door: creates per-producer queues and hands out
/// submission handles.
pub struct Ingress {
    config: IngressConfig,
    registry: Arc<SignalRegistry>,
    metrics: Option<Arc<Metrics>>,
    queues: RwLock<Vec<Arc<ObservationQueue>>>,
}

impl Ingress {
    pub fn new(config: IngressConfig, registry: Arc<SignalRegistry>) -> Self {
        Self {
            config,
            registry,
            metrics: None,
            queues: RwLock::new(Vec::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create the bounded queue for one producer and return its handle.
    pub fn register_producer(&self, name: &str) -> ProducerHandle {
        let queue = Arc::new(ObservationQueue::new(
            name.to_string(),
            self.config.queue_capacity,
            self.config.backpressure,
        ));
        self.queues
            .write()
            .expect("ingress queues lock poisoned")
            .push(queue.clone());
        ProducerHandle {
            queue,
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Queues for the runtime to drain, one worker each.
    pub fn queues(&self) -> Vec<Arc<ObservationQueue>> {
        self.queues
            .read()
            .expect("ingress queues lock poisoned")
            .clone()
    }
}
