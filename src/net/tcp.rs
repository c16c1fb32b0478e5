//! Panel TCP server - line-delimited JSON for physical station panels
//!
//! A panel sends `{panel_id, action, value}` lines; the first line with a
//! non-empty panel id binds the connection to that panel. Actions are
//! resolved through the panel mapping into station intents and answered
//! with a feedback line. Bound panels receive their projected state every
//! broadcast period.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{tcp::OwnedWriteHalf, TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::input::Action;
use crate::util::rate_limit::ConnectionRateLimiter;

const READ_DEADLINE: Duration = Duration::from_secs(60);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const BROADCAST_PERIOD: Duration = Duration::from_millis(50);
const SEND_QUEUE_DEPTH: usize = 64;

/// One panel message per line
#[derive(Debug, Deserialize)]
struct PanelMessage {
    #[serde(default)]
    panel_id: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    value: Value,
}

struct PanelConn {
    panel_id: Mutex<Option<String>>,
    tx: mpsc::Sender<String>,
}

impl PanelConn {
    fn send(&self, line: String) {
        if self.tx.try_send(line).is_err() {
            debug!("panel send queue full, dropping message");
        }
    }

    fn bound_panel(&self) -> Option<String> {
        self.panel_id.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[derive(Default)]
pub struct PanelRegistry {
    connections: DashMap<Uuid, Arc<PanelConn>>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// Accept panel connections until the stop channel fires. The listener is
/// bound by the caller so a busy port fails startup.
pub async fn run_panel_server(
    listener: TcpListener,
    state: AppState,
    mut stop: watch::Receiver<bool>,
) {
    info!("panel TCP server accepting connections");

    loop {
        tokio::select! {
            _ = stop.changed() => {
                info!("panel TCP server stopped");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!(%addr, "new panel connection");
                        let state = state.clone();
                        tokio::spawn(handle_connection(stream, state));
                    }
                    Err(e) => {
                        warn!(error = %e, "error accepting panel connection");
                    }
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, state: AppState) {
    let conn_id = Uuid::new_v4();
    let (read_half, write_half) = stream.into_split();

    let (tx, rx) = mpsc::channel::<String>(SEND_QUEUE_DEPTH);
    let conn = Arc::new(PanelConn {
        panel_id: Mutex::new(None),
        tx,
    });
    state.panels.connections.insert(conn_id, conn.clone());

    let writer = tokio::spawn(write_lines(write_half, rx));

    let rate_limiter = ConnectionRateLimiter::panel();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        match tokio::time::timeout(READ_DEADLINE, lines.next_line()).await {
            Err(_) => {
                warn!(conn_id = %conn_id, "panel read deadline exceeded");
                break;
            }
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                debug!(conn_id = %conn_id, error = %e, "panel connection error");
                break;
            }
            Ok(Ok(Some(line))) => {
                if line.trim().is_empty() {
                    continue;
                }
                if !rate_limiter.check() {
                    warn!(conn_id = %conn_id, "rate limited panel action");
                    continue;
                }
                handle_line(&state, &conn, &line);
            }
        }
    }

    state.panels.connections.remove(&conn_id);
    writer.abort();
    info!(conn_id = %conn_id, "panel connection closed");
}

async fn write_lines(mut write_half: OwnedWriteHalf, mut rx: mpsc::Receiver<String>) {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        match tokio::time::timeout(WRITE_DEADLINE, write_half.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "panel write failed");
                break;
            }
            Err(_) => {
                warn!("panel write deadline exceeded");
                break;
            }
        }
    }
    let _ = write_half.shutdown().await;
}

fn handle_line(state: &AppState, conn: &Arc<PanelConn>, line: &str) {
    let msg: PanelMessage = match serde_json::from_str(line) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "failed to parse panel message");
            return;
        }
    };

    // First non-empty panel id binds the connection
    if !msg.panel_id.is_empty() {
        let mut bound = conn.panel_id.lock().unwrap_or_else(|e| e.into_inner());
        if bound.is_none() {
            info!(panel_id = %msg.panel_id, "panel registered");
            *bound = Some(msg.panel_id.clone());
        }
    }

    if msg.action == "register" {
        send_feedback(conn, &msg.panel_id, "registered", "");
        return;
    }

    let Some(panel_config) = state.panel_mappings.panels.get(&msg.panel_id) else {
        warn!(panel_id = %msg.panel_id, "unknown panel id");
        send_feedback(conn, &msg.panel_id, "error", "unknown panel");
        return;
    };

    let Some(action_def) = panel_config.actions.get(&msg.action) else {
        warn!(panel_id = %msg.panel_id, action = %msg.action, "unknown panel action");
        send_feedback(conn, &msg.panel_id, "error", "unknown action");
        return;
    };

    let action = Action {
        role: panel_config.role.clone(),
        system: action_def.system.clone(),
        action: action_def.action.clone(),
        value: msg.value,
    };

    match state.router.route(&action) {
        Ok(()) => send_feedback(conn, &msg.panel_id, "success", ""),
        Err(e) => {
            warn!(error = %e, "error routing panel action");
            send_feedback(conn, &msg.panel_id, "error", &e.to_string());
        }
    }
}

fn send_feedback(conn: &Arc<PanelConn>, panel_id: &str, status: &str, message: &str) {
    let feedback = json!({
        "type": "feedback",
        "panel_id": panel_id,
        "status": status,
        "message": message,
    });
    conn.send(feedback.to_string());
}

/// Push each bound panel its projection of the player ship every period
pub async fn run_panel_broadcast(state: AppState, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(BROADCAST_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.changed() => {
                info!("panel broadcast loop stopped");
                return;
            }
            _ = interval.tick() => {
                let time = state.simulator.current_time();
                for ship in state.simulator.ships() {
                    if !ship.is_player {
                        continue;
                    }

                    for entry in state.panels.connections.iter() {
                        let Some(panel_id) = entry.value().bound_panel() else {
                            continue;
                        };

                        let panel_state =
                            state.panel_states.update_from_ship(&panel_id, &ship, time);
                        let Ok(text) = serde_json::to_string(&json!({
                            "type": "state_update",
                            "state": panel_state,
                        })) else {
                            continue;
                        };
                        entry.value().send(text);
                    }
                }
            }
        }
    }
}
