//! WebSocket tests against a real listener.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use orderflow_dashboard::{serve_on, DashboardConfig, DashboardState};
use orderflow_engine::{EngineConfig, SimulationEngine};

async fn start() -> (String, DashboardState, CancellationToken, tokio::task::JoinHandle<()>) {
    let engine = SimulationEngine::new(EngineConfig {
        seed: Some(5),
        ..Default::default()
    })
    .unwrap();
    let state = DashboardState::new(Arc::new(engine));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();

    let server = tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move {
            tokio_test::assert_ok!(
                serve_on(listener, state, DashboardConfig::default(), shutdown).await
            );
        }
    });
    (url, state, shutdown, server)
}

async fn next_json<S>(stream: &mut S, kind: &str) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    if value["type"] == kind {
                        return value;
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("stream ended: {other:?}"),
            }
        }
    })
    .await
    .expect("message within timeout")
}

#[tokio::test]
async fn test_ws_snapshot_then_update() {
    let (url, state, shutdown, server) = start().await;

    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
    let initial = next_json(&mut ws, "snapshot").await;
    assert!(initial["pending"].as_array().unwrap().is_empty());

    let id = state.engine().place(dec!(750.50), dec!(3.67)).unwrap();
    let update = next_json(&mut ws, "update").await;
    assert_eq!(update["pending"][0]["id"], id.to_string());
    assert_eq!(update["pending"][0]["amount_display"], "750.50");

    shutdown.cancel();
    timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops after shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_ws_connection_limit() {
    let engine = SimulationEngine::new(EngineConfig::default()).unwrap();
    let state = DashboardState::new(Arc::new(engine));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();
    let config = DashboardConfig {
        max_connections: 1,
        ..Default::default()
    };
    let server = tokio::spawn(serve_on(listener, state, config, shutdown.clone()));

    let (mut first, _) = connect_async(url.as_str()).await.unwrap();
    next_json(&mut first, "snapshot").await;

    // Second upgrade is refused while the first is open.
    assert!(connect_async(url.as_str()).await.is_err());

    shutdown.cancel();
    let result = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
    assert!(result.is_ok());
}
