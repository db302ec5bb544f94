// frontend/src/sync/transport.rs

use crate::error::{SyncError, SyncResult};
use airsync_shared::{ClientMsg, ServerMsg};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// One established push-channel connection, as a pair of queues.
///
/// Dropping the link tears the connection down: the writer sees `outgoing` closed and sends a
/// close frame, the reader sees `incoming` dropped and stops reading.
pub struct PushLink {
    pub outgoing: mpsc::UnboundedSender<ClientMsg>,
    pub incoming: mpsc::UnboundedReceiver<ServerMsg>,
}

pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = SyncResult<PushLink>> + Send;
}

/// WebSocket push channel carrying JSON event envelopes.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WsConnector {
    async fn connect(&self) -> SyncResult<PushLink> {
        tracing::debug!("[WS] connecting to {}", self.url);

        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|source| SyncError::Connect {
                url: self.url.clone(),
                source,
            })?;

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMsg>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerMsg>();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("[WS] dropping unserializable frame: {e}");
                        continue;
                    }
                };
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    biased;
                    _ = in_tx.closed() => break,
                    item = read.next() => item,
                };
                let Some(item) = item else { break };

                match item {
                    Ok(Message::Text(s)) => match serde_json::from_str::<ServerMsg>(s.as_str()) {
                        Ok(msg) => {
                            if in_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::debug!("[WS] skipping frame: {}", SyncError::from(e)),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("[WS] read error: {e}");
                        break;
                    }
                }
            }
        });

        Ok(PushLink {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
