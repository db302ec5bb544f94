// frontend/src/sync/session.rs

use crate::sync::state::Filter;
use crate::sync::transport::{Connector, PushLink};
use airsync_shared::{ClientMsg, DateQuery, DateResponse, Reading, ServerMsg};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Epoch of one push-channel session. Strictly increasing per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventKind {
    Connected,
    Disconnected,
    LiveBatch(Vec<Reading>),
    DateReply(DateResponse),
}

/// Everything a session reports is tagged with the session it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub kind: SessionEventKind,
}

/// Open/close counters, shared by the manager and every handle it issued.
#[derive(Debug, Default)]
pub struct SessionStats {
    opened: AtomicU64,
    closed: AtomicU64,
}

impl SessionStats {
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn open_now(&self) -> u64 {
        self.opened().saturating_sub(self.closed())
    }
}

/// Owner of one running session. Dropping the handle closes the session.
pub struct SessionHandle {
    id: SessionId,
    filter: Filter,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    stats: Arc<SessionStats>,
    closed: bool,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel.cancel();
        // The task exits on its own once it observes the token.
        self.task.take();
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[WS] session {} closed ({})", self.id, self.filter);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("closed", &self.closed)
            .finish()
    }
}

pub struct SessionManager<C: Connector> {
    connector: Arc<C>,
    events: mpsc::UnboundedSender<SessionEvent>,
    reconnect_delay: Duration,
    next_id: u64,
    stats: Arc<SessionStats>,
}

impl<C: Connector> SessionManager<C> {
    pub fn new(
        connector: Arc<C>,
        events: mpsc::UnboundedSender<SessionEvent>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            connector,
            events,
            reconnect_delay,
            next_id: 0,
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }

    /// Spawns the session task. Must be called inside a tokio runtime.
    pub fn open_session(&mut self, filter: Filter) -> SessionHandle {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let cancel = CancellationToken::new();

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[WS] session {id} opening ({filter})");

        let task = tokio::spawn(run_session(
            id,
            filter.clone(),
            self.connector.clone(),
            self.events.clone(),
            cancel.clone(),
            self.reconnect_delay,
        ));

        SessionHandle {
            id,
            filter,
            cancel,
            task: Some(task),
            stats: self.stats.clone(),
            closed: false,
        }
    }

    pub fn close_session(&self, mut handle: SessionHandle) {
        handle.close();
    }

    /// Close-then-open. The old session is cancelled before the new one exists.
    pub fn reconcile(&mut self, old: Option<SessionHandle>, filter: Filter) -> SessionHandle {
        if let Some(old) = old {
            self.close_session(old);
        }
        self.open_session(filter)
    }
}

enum LinkExit {
    Cancelled,
    Dropped,
}

/// Connection supervisor for one session: reconnects after `reconnect_delay` until cancelled.
async fn run_session<C: Connector>(
    id: SessionId,
    filter: Filter,
    connector: Arc<C>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    reconnect_delay: Duration,
) {
    // One-shot per session, re-sent after a reconnect until it is answered. A live session
    // asks with an empty date for the node's recent readings.
    let mut query_pending = true;

    loop {
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = connector.connect() => res,
        };

        match res {
            Ok(link) => {
                tracing::info!("[WS] session {id} connected ({filter})");
                if !emit(&events, id, SessionEventKind::Connected) {
                    break;
                }
                match drive_link(id, &filter, link, &events, &cancel, &mut query_pending).await {
                    LinkExit::Cancelled => break,
                    LinkExit::Dropped => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::warn!("[WS] session {id} lost its connection");
                        if !emit(&events, id, SessionEventKind::Disconnected) {
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::warn!("[WS] session {id} connect error: {e}");
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    tracing::debug!("[WS] session {id} task finished");
}

async fn drive_link(
    id: SessionId,
    filter: &Filter,
    mut link: PushLink,
    events: &mpsc::UnboundedSender<SessionEvent>,
    cancel: &CancellationToken,
    query_pending: &mut bool,
) -> LinkExit {
    if *query_pending {
        let query = DateQuery::new(filter.date, filter.node_id.clone());
        if link.outgoing.send(ClientMsg::GetDataByDate(query)).is_err() {
            return LinkExit::Dropped;
        }
    }

    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LinkExit::Cancelled,
            msg = link.incoming.recv() => msg,
        };
        let Some(msg) = msg else {
            return LinkExit::Dropped;
        };

        let kind = match msg {
            ServerMsg::SensorDataUpdate(batch) if filter.is_live() => {
                SessionEventKind::LiveBatch(batch)
            }
            ServerMsg::SensorDataUpdate(_) => continue,
            ServerMsg::SensorDataByDate(reply) if *query_pending => {
                *query_pending = false;
                SessionEventKind::DateReply(reply)
            }
            ServerMsg::SensorDataByDate(_) => {
                tracing::debug!("[WS] session {id} ignoring unsolicited date reply");
                continue;
            }
        };

        if !emit(events, id, kind) {
            return LinkExit::Cancelled;
        }
    }
}

fn emit(events: &mpsc::UnboundedSender<SessionEvent>, session: SessionId, kind: SessionEventKind) -> bool {
    events.send(SessionEvent { session, kind }).is_ok()
}
