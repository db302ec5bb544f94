use crate::state::AppState;
use airsync_shared::{ClientMsg, Reading, ServerMsg};
use axum::{
    Json, Router,
    extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tower_http::compression::CompressionLayer;

/// Public router constructor
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sensor-data", axum::routing::post(ingest))
        .route("/api/sensor-data/{node_id}", get(get_sensor_data))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .with_state(state)
}

#[derive(Serialize)]
pub struct IngestAck {
    pub stored: usize,
}

async fn get_sensor_data(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> impl IntoResponse {
    Json(state.recent(&node_id))
}

/// A sensor node (or the simulator) pushes a batch.
async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<Vec<Reading>>,
) -> impl IntoResponse {
    let stored = state.ingest(batch);
    tracing::debug!("[API] ingested {stored} readings");
    (StatusCode::ACCEPTED, Json(IngestAck { stored }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let mut updates_rx = state.updates_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMsg>();

    tracing::debug!("[WS] client connected");

    // Task: server -> client (query replies first, then broadcasts)
    let send_task = async move {
        loop {
            let msg = tokio::select! {
                biased;

                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },

                recv = updates_rx.recv() => match recv {
                    Ok(batch) => ServerMsg::SensorDataUpdate(batch),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("[WS] client lagging, skipped {n} batches");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("[WS] failed to encode frame: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(Utf8Bytes::from(text))).await.is_err() {
                break;
            }
        }
    };

    // Task: client -> server (date queries)
    let recv_task = async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMsg>(text.as_str()) {
                    Ok(ClientMsg::GetDataByDate(query)) => {
                        let reply = state.by_date(&query);
                        if reply_tx.send(ServerMsg::SensorDataByDate(reply)).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!("[WS] invalid client frame {text:?}: {e}"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    // Run both directions until the client goes away
    tokio::join!(send_task, recv_task);
    tracing::debug!("[WS] client disconnected");
}
