//! Auto-demo and teardown integration tests.
//!
//! Runs on paused tokio time so every refresh and demo timer fires
//! deterministically as the test sleeps.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use orderflow_core::OrderOrigin;
use orderflow_engine::{DemoScreen, EngineConfig, SimulationEngine};
use rust_decimal_macros::dec;
use tokio::time;

fn auto_demo() -> SimulationEngine {
    let config = EngineConfig {
        auto_demo: true,
        seed: Some(7),
        ..Default::default()
    };
    SimulationEngine::new(config).unwrap()
}

/// One full Buy → Accept → SendFiat rotation completes a demo order.
#[tokio::test(start_paused = true)]
async fn test_demo_cycle_completes_an_order() {
    let engine = auto_demo();
    engine.start().unwrap();

    time::sleep(Duration::from_secs(3)).await;
    let snap = engine.snapshot();
    assert_eq!(snap.lifecycle.pending.len(), 1);
    let order = snap.lifecycle.pending.first().unwrap().clone();
    assert_eq!(order.origin, OrderOrigin::User);
    assert_eq!(order.amount.inner(), dec!(5000));
    assert_eq!(engine.demo_ui().last_order, Some(order.id.clone()));

    time::sleep(Duration::from_secs(12)).await;
    let snap = engine.snapshot();
    assert!(snap.lifecycle.pending.is_empty());
    assert!(snap.lifecycle.escrowed.is_empty());
    assert!(snap.lifecycle.completed.contains(&order.id));

    engine.teardown();
}

/// The demo acts on the newest pending order, and a user acting first
/// turns the demo step into a no-op.
#[tokio::test(start_paused = true)]
async fn test_user_beats_demo_to_the_order() {
    let engine = auto_demo();
    engine.start().unwrap();

    time::sleep(Duration::from_secs(3)).await;
    let demo_order = engine.snapshot().lifecycle.pending.first().unwrap().id.clone();
    assert!(engine.accept(&demo_order));
    assert!(engine.send_fiat(&demo_order));

    // Accept screen runs at 6s and finds nothing pending.
    time::sleep(Duration::from_secs(5)).await;
    let snap = engine.snapshot();
    assert!(snap.lifecycle.escrowed.is_empty());
    assert_eq!(snap.lifecycle.completed.len(), 1);
    assert_eq!(
        engine.choreographer().ui_state().screen,
        Some(DemoScreen::Accept)
    );
}

/// The market keeps moving while the engine runs.
#[tokio::test(start_paused = true)]
async fn test_market_refresh_runs_with_auto_demo() {
    let engine = auto_demo();
    let start = engine.snapshot().market.version;
    engine.start().unwrap();
    engine.start().unwrap();

    time::sleep(Duration::from_secs(30)).await;
    let market = engine.snapshot().market.clone();
    assert!(market.version > start);
    assert!(market.demo_orders.len() <= 8);
    assert!(market.activity.len() <= 5);
    for pair in market.leaderboard.windows(2) {
        assert!(pair[0].volume >= pair[1].volume);
        assert_eq!(pair[0].rank + 1, pair[1].rank);
    }
}

/// Without auto-demo nothing changes on its own.
#[tokio::test(start_paused = true)]
async fn test_manual_mode_is_quiet() {
    let engine = SimulationEngine::new(EngineConfig {
        seed: Some(1),
        ..Default::default()
    })
    .unwrap();
    engine.start().unwrap();
    let before = engine.snapshot();

    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(engine.snapshot().version, before.version);
    assert!(!engine.choreographer().is_cycling());
}

/// After teardown no buffer changes even though timers were pending.
#[tokio::test(start_paused = true)]
async fn test_teardown_stops_all_mutation() {
    let engine = auto_demo();
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let _sub = engine.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    engine.start().unwrap();

    time::sleep(Duration::from_millis(2_500)).await;
    engine.teardown();
    let frozen = engine.snapshot();
    let calls = notified.load(Ordering::SeqCst);

    time::sleep(Duration::from_secs(120)).await;
    let after = engine.snapshot();
    assert_eq!(after.version, frozen.version);
    assert_eq!(after.lifecycle, frozen.lifecycle);
    assert_eq!(after.market, frozen.market);
    assert_eq!(notified.load(Ordering::SeqCst), calls);

    assert!(engine.place(dec!(10), dec!(3.67)).is_none());
    assert!(engine.choreographer().is_torn_down());
}

/// Dropping the engine tears it down.
#[tokio::test(start_paused = true)]
async fn test_drop_tears_down() {
    let notified = Arc::new(AtomicUsize::new(0));
    let engine = auto_demo();
    let counter = Arc::clone(&notified);
    let sub = engine.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    engine.start().unwrap();
    drop(engine);

    let calls = notified.load(Ordering::SeqCst);
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(notified.load(Ordering::SeqCst), calls);
    // Closing the hub deactivates every subscription.
    assert!(!sub.is_active());
    sub.unsubscribe();
}
