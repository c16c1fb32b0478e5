//! UI WebSocket server
//!
//! Browser and GM clients connect here. Each connection gets a bounded
//! send queue drained by a writer task; the full-state broadcast loop
//! fans one serialized state message out to every queue and drops it for
//! clients whose queue is full rather than blocking the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::net::protocol::{ClientMsg, InputMsg, ServerMsg, StateUpdate};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::{unix_millis, uptime_secs};

/// Reads idle longer than this close the connection
const READ_DEADLINE: Duration = Duration::from_secs(60);
/// Writes slower than this close the connection
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
/// Heartbeats older than this mark the client dead
const HEARTBEAT_TIMEOUT_MS: u64 = 30_000;
/// Full-state broadcast period
const BROADCAST_PERIOD: Duration = Duration::from_millis(50);
/// Heartbeat sweep period
const HEARTBEAT_SWEEP: Duration = Duration::from_secs(10);
/// Per-client send queue depth
const SEND_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Default, Clone)]
pub struct ClientInfo {
    pub client_type: String,
    pub station_role: Option<String>,
}

pub struct UiClient {
    tx: mpsc::Sender<String>,
    info: Mutex<ClientInfo>,
    last_heartbeat: AtomicU64,
    close: tokio::sync::Notify,
}

impl UiClient {
    fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx,
            info: Mutex::new(ClientInfo::default()),
            last_heartbeat: AtomicU64::new(unix_millis()),
            close: tokio::sync::Notify::new(),
        }
    }

    fn touch(&self) {
        self.last_heartbeat.store(unix_millis(), Ordering::Relaxed);
    }

    /// Queue a message; full queues drop it rather than block
    fn send(&self, text: String) {
        if self.tx.try_send(text).is_err() {
            debug!("client send queue full, dropping message");
        }
    }
}

#[derive(Default)]
pub struct UiClientRegistry {
    clients: DashMap<Uuid, Arc<UiClient>>,
}

impl UiClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn handles(&self) -> Vec<Arc<UiClient>> {
        self.clients.iter().map(|c| c.value().clone()).collect()
    }
}

/// Build the HTTP router: WebSocket upgrade plus a health endpoint
pub fn build_router(state: AppState) -> Router {
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime_secs(),
        "tick_rate": state.config.tick_rate,
        "clients": state.ui_clients.client_count(),
        "panels": state.panels.connection_count(),
        "world": state.gm.summary(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    info!(client_id = %client_id, "new UI client connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(SEND_QUEUE_DEPTH);
    let client = Arc::new(UiClient::new(tx));
    state.ui_clients.clients.insert(client_id, client.clone());

    // Writer task: send queue -> WebSocket, with a write deadline
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            match tokio::time::timeout(WRITE_DEADLINE, ws_sink.send(Message::Text(text))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(error = %e, "WebSocket send failed");
                    break;
                }
                Err(_) => {
                    warn!("WebSocket write deadline exceeded");
                    break;
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    // Serve the initial full state without waiting for the broadcast tick
    send_state_update(&state, &client);

    let rate_limiter = ConnectionRateLimiter::ui();

    loop {
        tokio::select! {
            _ = client.close.notified() => {
                info!(client_id = %client_id, "closing client (heartbeat timeout)");
                break;
            }
            next = tokio::time::timeout(READ_DEADLINE, ws_stream.next()) => {
                match next {
                    Err(_) => {
                        warn!(client_id = %client_id, "read deadline exceeded");
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        debug!(client_id = %client_id, error = %e, "WebSocket error");
                        break;
                    }
                    Ok(Some(Ok(Message::Close(_)))) => {
                        info!(client_id = %client_id, "client initiated close");
                        break;
                    }
                    Ok(Some(Ok(Message::Text(text)))) => {
                        if !rate_limiter.check() {
                            warn!(client_id = %client_id, "rate limited message");
                            continue;
                        }
                        handle_message(&state, &client, &text);
                    }
                    Ok(Some(Ok(_))) => {
                        // Binary/ping/pong frames carry no intents
                    }
                }
            }
        }
    }

    state.ui_clients.clients.remove(&client_id);
    writer.abort();
    info!(client_id = %client_id, "UI client disconnected");
}

fn handle_message(state: &AppState, client: &Arc<UiClient>, text: &str) {
    let msg: ClientMsg = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "failed to parse client message");
            send_error(client, "bad_message", &e.to_string());
            return;
        }
    };

    match msg {
        ClientMsg::Register { client_type, station_role } => {
            info!(client_type = %client_type, station_role = ?station_role, "client registered");
            let mut info = client.info.lock().unwrap_or_else(|e| e.into_inner());
            info.client_type = client_type;
            info.station_role = station_role;
        }
        ClientMsg::Input(input) => handle_input(state, client, input),
        ClientMsg::GmCommand(command) => {
            if let Err(e) = state.gm.handle(command) {
                error!(error = %e, "GM command failed");
                send_error(client, e.code(), &e.to_string());
            }
        }
        ClientMsg::RequestState => send_state_update(state, client),
        ClientMsg::Heartbeat => client.touch(),
    }
}

fn handle_input(state: &AppState, client: &Arc<UiClient>, input: InputMsg) {
    match input {
        InputMsg::Hotas { ship_id, pitch, yaw, roll, thrust } => {
            match state.simulator.get_ship(&ship_id) {
                Some(ship) => {
                    ship.apply_rotation(pitch, yaw, roll);
                    ship.set_throttle(thrust);
                }
                None => send_error(client, "not_found", &format!("ship {ship_id}")),
            }
        }
        InputMsg::UiAction { action, value } => {
            debug!(action = %action, ?value, "UI action");
        }
    }
}

fn send_state_update(state: &AppState, client: &Arc<UiClient>) {
    let ships = state.simulator.ships();
    let update = StateUpdate::from_ships(state.simulator.current_time(), &ships);
    if let Ok(text) = serde_json::to_string(&ServerMsg::StateUpdate(update)) {
        client.send(text);
    }
}

fn send_error(client: &Arc<UiClient>, code: &str, message: &str) {
    let msg = ServerMsg::Error {
        code: code.to_string(),
        message: message.to_string(),
    };
    if let Ok(text) = serde_json::to_string(&msg) {
        client.send(text);
    }
}

/// Serialize the world once per period and fan it out to every client
pub async fn run_broadcast_loop(state: AppState, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(BROADCAST_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.changed() => {
                info!("state broadcast loop stopped");
                return;
            }
            _ = interval.tick() => {
                let clients = state.ui_clients.handles();
                if clients.is_empty() {
                    continue;
                }

                let ships = state.simulator.ships();
                let update = StateUpdate::from_ships(state.simulator.current_time(), &ships);
                let Ok(text) = serde_json::to_string(&ServerMsg::StateUpdate(update)) else {
                    continue;
                };

                for client in clients {
                    client.send(text.clone());
                }
            }
        }
    }
}

/// Close clients whose heartbeat has gone stale
pub async fn run_heartbeat_loop(state: AppState, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(HEARTBEAT_SWEEP);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.changed() => {
                info!("heartbeat loop stopped");
                return;
            }
            _ = interval.tick() => {
                let now = unix_millis();
                let stale: Vec<Uuid> = state
                    .ui_clients
                    .clients
                    .iter()
                    .filter(|entry| {
                        now.saturating_sub(entry.value().last_heartbeat.load(Ordering::Relaxed))
                            > HEARTBEAT_TIMEOUT_MS
                    })
                    .map(|entry| *entry.key())
                    .collect();

                for client_id in stale {
                    if let Some((_, client)) = state.ui_clients.clients.remove(&client_id) {
                        warn!(client_id = %client_id, "client heartbeat timeout");
                        client.close.notify_waiters();
                    }
                }
            }
        }
    }
}
