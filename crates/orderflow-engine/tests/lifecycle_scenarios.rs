//! Lifecycle scenarios through the engine facade.
//!
//! Covers:
//! - Happy path, rejected input and stale actions
//! - Monotonic movement under a random mix of operations
//! - Snapshot delivery to subscribers

use std::collections::HashMap;
use std::sync::Arc;

use orderflow_core::{OrderId, OrderStatus};
use orderflow_engine::{EngineConfig, EngineSnapshot, SimulationEngine};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal_macros::dec;

fn engine() -> SimulationEngine {
    let config = EngineConfig {
        seed: Some(42),
        ..Default::default()
    };
    SimulationEngine::new(config).unwrap()
}

fn stage(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Escrowed => 1,
        OrderStatus::Completed => 2,
    }
}

/// Place, accept and send fiat; the order shows up in exactly one buffer
/// at each step.
#[tokio::test]
async fn test_happy_path() {
    let engine = engine();

    let id = engine.place(dec!(5000), dec!(3.67)).expect("order placed");
    let snap = engine.snapshot();
    let order = snap.lifecycle.pending.get(&id).expect("pending");
    assert_eq!(order.amount.inner(), dec!(5000));
    assert_eq!(order.rate.inner(), dec!(3.67));

    assert!(engine.accept(&id));
    let snap = engine.snapshot();
    assert!(!snap.lifecycle.pending.contains(&id));
    assert!(snap.lifecycle.escrowed.contains(&id));

    assert!(engine.send_fiat(&id));
    let snap = engine.snapshot();
    assert!(!snap.lifecycle.escrowed.contains(&id));
    assert!(snap.lifecycle.completed.contains(&id));
}

#[tokio::test]
async fn test_rejected_input() {
    let engine = engine();
    let before = engine.snapshot().lifecycle.pending.len();
    assert!(engine.place(dec!(0), dec!(3.67)).is_none());
    assert_eq!(engine.snapshot().lifecycle.pending.len(), before);
}

#[tokio::test]
async fn test_stale_action() {
    let engine = engine();
    engine.place(dec!(10), dec!(3.67)).unwrap();
    let before = engine.snapshot();
    assert!(!engine.accept(&OrderId::from("nonexistent-id")));
    let after = engine.snapshot();
    assert_eq!(after.version, before.version);
    assert_eq!(after.lifecycle, before.lifecycle);
}

/// Random operations never duplicate an order or move it backwards.
#[tokio::test]
async fn test_monotonic_under_random_operations() {
    let engine = engine();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut placed: Vec<OrderId> = Vec::new();
    let mut last_stage: HashMap<OrderId, u8> = HashMap::new();

    for _ in 0..400 {
        match rng.gen_range(0..4) {
            0 => {
                let amount = rust_decimal::Decimal::new(rng.gen_range(-100..100_000), 2);
                if let Some(id) = engine.place(amount, dec!(3.67)) {
                    placed.push(id);
                }
            }
            1 if !placed.is_empty() => {
                let id = &placed[rng.gen_range(0..placed.len())];
                engine.accept(id);
            }
            2 if !placed.is_empty() => {
                let id = &placed[rng.gen_range(0..placed.len())];
                engine.send_fiat(id);
            }
            _ => {}
        }

        let snap = engine.snapshot();
        let lc = &snap.lifecycle;
        for id in &placed {
            let holders = [
                lc.pending.contains(id),
                lc.escrowed.contains(id),
                lc.completed.contains(id),
            ]
            .iter()
            .filter(|held| **held)
            .count();
            assert!(holders <= 1, "order {id} held by {holders} buffers");

            if let Some(status) = lc.status_of(id) {
                let now = stage(status);
                let prev = last_stage.insert(id.clone(), now).unwrap_or(0);
                assert!(now >= prev, "order {id} moved backwards");
            }
        }
        assert!(lc.pending.len() <= lc.pending.capacity());
        assert!(lc.escrowed.len() <= lc.escrowed.capacity());
        assert!(lc.completed.len() <= lc.completed.capacity());
    }
}

#[tokio::test]
async fn test_subscriber_sees_every_change_in_order() {
    let engine = engine();
    let versions: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&versions);
    let sub = engine.subscribe(move |snap: &EngineSnapshot| sink.lock().push(snap.version));

    let id = engine.place(dec!(100), dec!(3.67)).unwrap();
    engine.accept(&id);
    engine.send_fiat(&id);

    sub.unsubscribe();
    sub.unsubscribe();
    engine.place(dec!(100), dec!(3.67)).unwrap();

    let seen = versions.lock().clone();
    assert_eq!(seen.len(), 4);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_watch_receiver_tracks_latest() {
    let engine = engine();
    let mut rx = engine.watch();
    let id = engine.place(dec!(100), dec!(3.67)).unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().lifecycle.pending.contains(&id));
}
