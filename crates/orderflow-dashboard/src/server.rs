//! HTTP server implementation using axum.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use orderflow_core::{CurrencyPair, OpaqueId, OrderId};
use orderflow_telemetry::Metrics;

use crate::broadcast::Broadcaster;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::state::DashboardState;
use crate::types::{
    DashboardMessage, DashboardSnapshot, ErrorResponse, OkResponse, PairView, PlaceOrderRequest,
    PlaceOrderResponse, RateView, SetPairRequest, UpdatedResponse,
};

/// Broadcast buffer per client. Rate frames dominate: 50ms frames plus
/// updates give roughly 3 seconds of slack for a slow client.
const BROADCAST_CAPACITY: usize = 64;

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    dashboard_state: DashboardState,
    broadcast_tx: broadcast::Sender<String>,
    connection_limiter: Arc<Semaphore>,
    config: DashboardConfig,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        dashboard_state: DashboardState,
        broadcast_tx: broadcast::Sender<String>,
        config: DashboardConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dashboard_state,
            broadcast_tx,
            connection_limiter: Arc::new(Semaphore::new(config.max_connections)),
            config,
            shutdown,
        }
    }

    fn open_connections(&self) -> usize {
        self.config
            .max_connections
            .saturating_sub(self.connection_limiter.available_permits())
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/pairs", get(list_pairs))
        .route("/api/pair", post(set_pair))
        .route("/api/orders", post(place_order))
        .route("/api/orders/{id}/accept", post(accept_order))
        .route("/api/orders/{id}/send-fiat", post(send_fiat))
        .route("/api/notifications/read-all", post(read_all_notifications))
        .route("/api/notifications/{id}/read", post(read_notification))
        .route("/api/messages/{id}/read", post(read_message))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the index HTML page.
async fn serve_index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// Get current state snapshot as JSON.
async fn get_snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.dashboard_state.collect_snapshot())
}

async fn list_pairs() -> Json<Vec<PairView>> {
    Json(CurrencyPair::ALL.into_iter().map(PairView::from).collect())
}

async fn set_pair(State(state): State<AppState>, Json(req): Json<SetPairRequest>) -> Response {
    let pair: CurrencyPair = match req.pair.parse() {
        Ok(pair) => pair,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    match state.dashboard_state.engine().set_active_pair(pair) {
        Some(rate) => Json(RateView::from(&rate)).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "engine stopped"),
    }
}

async fn place_order(
    State(state): State<AppState>,
    Json(req): Json<PlaceOrderRequest>,
) -> Response {
    match state.dashboard_state.engine().place(req.amount, req.rate) {
        Some(id) => (
            StatusCode::CREATED,
            Json(PlaceOrderResponse {
                order_id: id.to_string(),
            }),
        )
            .into_response(),
        None => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "amount and rate must be positive",
        ),
    }
}

async fn accept_order(State(state): State<AppState>, Path(id): Path<String>) -> Json<OkResponse> {
    let ok = state.dashboard_state.engine().accept(&OrderId::from(id));
    Json(OkResponse { ok })
}

async fn send_fiat(State(state): State<AppState>, Path(id): Path<String>) -> Json<OkResponse> {
    let ok = state.dashboard_state.engine().send_fiat(&OrderId::from(id));
    Json(OkResponse { ok })
}

async fn read_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<OkResponse> {
    let ok = state
        .dashboard_state
        .engine()
        .mark_notification_read(&OpaqueId::from(id));
    Json(OkResponse { ok })
}

async fn read_all_notifications(State(state): State<AppState>) -> Json<UpdatedResponse> {
    let updated = state.dashboard_state.engine().mark_all_notifications_read();
    Json(UpdatedResponse { updated })
}

async fn read_message(State(state): State<AppState>, Path(id): Path<String>) -> Json<OkResponse> {
    let ok = state
        .dashboard_state
        .engine()
        .mark_message_read(&OpaqueId::from(id));
    Json(OkResponse { ok })
}

/// Prometheus text exposition.
async fn metrics() -> Response {
    match Metrics::gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let permit = match Arc::clone(&state.connection_limiter).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            warn!(
                max = state.config.max_connections,
                "WebSocket connection limit reached"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    info!(
        connections = state.open_connections(),
        "New WebSocket connection"
    );

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, permit))
}

/// Handle a WebSocket connection. The permit is released when it returns.
async fn handle_ws_connection(socket: WebSocket, state: AppState, permit: OwnedSemaphorePermit) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing between them is lost
    let mut broadcast_rx = state.broadcast_tx.subscribe();

    let initial_snapshot = state.dashboard_state.collect_snapshot();
    let initial_msg = DashboardMessage::Snapshot(Box::new(initial_snapshot));
    if let Ok(json) = serde_json::to_string(&initial_msg) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            debug!("Failed to send initial snapshot, client disconnected");
            return;
        }
    }

    // Incoming frames only matter for close; pong is handled by axum
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            debug!("Failed to send message, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "WebSocket client lagged, catching up");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!("Incoming task completed, closing connection");
                break;
            }
        }
    }

    incoming_task.abort();
    drop(permit);
    info!(
        connections = state.open_connections(),
        "WebSocket connection closed"
    );
}

/// Serve the dashboard on an already bound listener until `shutdown` fires.
pub async fn serve_on(
    listener: TcpListener,
    dashboard_state: DashboardState,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let (broadcast_tx, _) = broadcast::channel::<String>(BROADCAST_CAPACITY);

    // Built before spawning so its engine receivers see every later change
    let broadcaster = Broadcaster::new(
        dashboard_state.clone(),
        broadcast_tx.clone(),
        config.clone(),
    );
    let broadcaster_task = tokio::spawn(broadcaster.run(shutdown.child_token()));

    let state = AppState::new(dashboard_state, broadcast_tx, config, shutdown.clone());
    let app = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Dashboard listening");
    }

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    broadcaster_task.abort();
    result.map_err(DashboardError::from)
}

/// Run the dashboard HTTP server.
pub async fn run_server(
    dashboard_state: DashboardState,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let addr = config.bind_addr();
    info!(%addr, "Starting dashboard server");

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| DashboardError::Bind {
            addr: addr.clone(),
            source,
        })?;

    serve_on(listener, dashboard_state, config, shutdown).await
}
