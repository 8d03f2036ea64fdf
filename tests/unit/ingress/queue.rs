//! Unit tests for ingress validation and backpressure

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use vigil::config::{BackpressurePolicy, IngressConfig};
use vigil::ingress::{Ingress, IngressError};
use vigil::models::signal::{Calibration, Signal, SignalClass, SignalKey};
use vigil::registry::SignalRegistry;

fn registry_with(keys: &[SignalKey]) -> Arc<SignalRegistry> {
    let mut registry = SignalRegistry::new();
    for key in keys {
        registry
            .register(Signal {
                key: key.clone(),
                class: SignalClass::Price,
                calibration: Calibration::Linear {
                    min: 0.0,
                    max: 100.0,
                },
                unit: "usd".to_string(),
                weight: 1.0,
            })
            .unwrap();
    }
    Arc::new(registry)
}

fn config(capacity: usize, policy: BackpressurePolicy) -> IngressConfig {
    IngressConfig {
        queue_capacity: capacity,
        backpressure: policy,
    }
}

#[test]
fn test_unregistered_key_rejected() {
    let key = SignalKey::new("market", "price", "BTC");
    let ingress = Ingress::new(
        config(8, BackpressurePolicy::RejectNew),
        registry_with(&[key]),
    );
    let producer = ingress.register_producer("test");

    let unknown = SignalKey::new("market", "price", "DOGE");
    let result = producer.submit(unknown.clone(), Utc::now(), 1.0, None);
    assert_eq!(result, Err(IngressError::UnregisteredKey(unknown)));
}

#[test]
fn test_reject_new_surfaces_queue_full() {
    let key = SignalKey::new("market", "price", "BTC");
    let ingress = Ingress::new(
        config(3, BackpressurePolicy::RejectNew),
        registry_with(&[key.clone()]),
    );
    let producer = ingress.register_producer("test");

    for i in 0..3 {
        producer.submit(key.clone(), Utc::now(), i as f64, None).unwrap();
    }
    let result = producer.submit(key.clone(), Utc::now(), 99.0, None);
    assert!(matches!(result, Err(IngressError::QueueFull { .. })));
}

#[tokio::test]
async fn test_drop_oldest_keeps_newest_observations() {
    let key = SignalKey::new("market", "price", "BTC");
    let ingress = Ingress::new(
        config(3, BackpressurePolicy::DropOldest),
        registry_with(&[key.clone()]),
    );
    let producer = ingress.register_producer("test");

    for value in [1.0, 2.0, 3.0, 4.0] {
        producer.submit(key.clone(), Utc::now(), value, None).unwrap();
    }

    let queue = ingress.queues().into_iter().next().unwrap();
    assert_eq!(queue.len(), 3);
    let mut drained = Vec::new();
    for _ in 0..3 {
        drained.push(queue.pop().await.value);
    }
    assert_eq!(drained, vec![2.0, 3.0, 4.0]);
}

#[tokio::test]
async fn test_pop_wakes_on_submit() {
    let key = SignalKey::new("market", "price", "BTC");
    let ingress = Ingress::new(
        config(8, BackpressurePolicy::RejectNew),
        registry_with(&[key.clone()]),
    );
    let producer = ingress.register_producer("test");
    let queue = ingress.queues().into_iter().next().unwrap();

    let waiter = tokio::spawn(async move { queue.pop().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    producer.submit(key.clone(), Utc::now(), 7.0, None).unwrap();

    let observation = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("pop should wake")
        .unwrap();
    assert_eq!(observation.value, 7.0);
    assert_eq!(observation.key, key);
}

#[test]
fn test_producers_have_independent_queues() {
    let key = SignalKey::new("market", "price", "BTC");
    let ingress = Ingress::new(
        config(2, BackpressurePolicy::RejectNew),
        registry_with(&[key.clone()]),
    );
    let a = ingress.register_producer("adapter-a");
    let b = ingress.register_producer("adapter-b");

    a.submit(key.clone(), Utc::now(), 1.0, None).unwrap();
    a.submit(key.clone(), Utc::now(), 2.0, None).unwrap();
    // Producer A's queue is full; producer B is unaffected.
    assert!(a.submit(key.clone(), Utc::now(), 3.0, None).is_err());
    assert!(b.submit(key.clone(), Utc::now(), 4.0, None).is_ok());
}
