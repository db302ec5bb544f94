// frontend/src/sync/view.rs

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::sync::session::{
    SessionEvent, SessionEventKind, SessionHandle, SessionManager, SessionStats,
};
use crate::sync::state::{Filter, ViewState};
use crate::sync::transport::Connector;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// User intents. Each one is a single edit of the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    SelectNode(String),
    SelectDate(Option<NaiveDate>),
    Reset,
    Shutdown,
}

/// Owns the view record and the one session that feeds it.
///
/// Every filter edit runs `reconcile` (close the current session, open one for the new
/// filter). Session events are applied only when they carry the id of the current session.
pub struct ViewController<C: Connector> {
    state: ViewState,
    sessions: SessionManager<C>,
    current: Option<SessionHandle>,
    nodes: Vec<String>,
    default_node: String,
    published: watch::Sender<ViewState>,
}

impl<C: Connector> ViewController<C> {
    pub fn new(
        config: &ClientConfig,
        initial: Filter,
        connector: Arc<C>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> SyncResult<(Self, watch::Receiver<ViewState>)> {
        if !config.is_known_node(&initial.node_id) {
            return Err(SyncError::UnknownNode(initial.node_id));
        }

        let state = ViewState::new(initial);
        let (published, rx) = watch::channel(state.clone());
        let controller = Self {
            state,
            sessions: SessionManager::new(connector, events, config.reconnect_delay()),
            current: None,
            nodes: config.nodes.clone(),
            default_node: config.default_node.clone(),
            published,
        };
        Ok((controller, rx))
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn session_stats(&self) -> Arc<SessionStats> {
        self.sessions.stats()
    }

    /// Opens the first session for the initial filter.
    pub fn start(&mut self) {
        if self.current.is_none() {
            self.transition(self.state.filter.clone());
        }
    }

    pub fn apply_command(&mut self, cmd: ViewCommand) -> SyncResult<()> {
        match cmd {
            ViewCommand::SelectNode(node) => self.select_node(node),
            ViewCommand::SelectDate(date) => {
                self.select_date(date);
                Ok(())
            }
            ViewCommand::Reset => {
                self.reset();
                Ok(())
            }
            ViewCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
        }
    }

    pub fn select_node(&mut self, node_id: String) -> SyncResult<()> {
        if !self.nodes.iter().any(|n| *n == node_id) {
            return Err(SyncError::UnknownNode(node_id));
        }
        let filter = Filter {
            node_id,
            date: self.state.filter.date,
        };
        self.transition(filter);
        Ok(())
    }

    pub fn select_date(&mut self, date: Option<NaiveDate>) {
        let filter = Filter {
            node_id: self.state.filter.node_id.clone(),
            date,
        };
        self.transition(filter);
    }

    /// Back to live mode on the default node, as one transition.
    pub fn reset(&mut self) {
        self.transition(Filter::live(self.default_node.clone()));
    }

    /// Returns whether the view changed.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        let current = self.current.as_ref().map(SessionHandle::id);
        if current != Some(event.session) {
            tracing::debug!(
                "[VIEW] dropping event from superseded session {}",
                event.session
            );
            return false;
        }

        let changed = match event.kind {
            SessionEventKind::LiveBatch(batch) => self.state.apply_live_batch(&batch),
            SessionEventKind::DateReply(reply) => self.state.apply_date_reply(reply),
            SessionEventKind::Connected => false,
            SessionEventKind::Disconnected => {
                tracing::info!("[VIEW] waiting for push channel ({})", self.state.filter);
                false
            }
        };

        if changed {
            self.publish();
        }
        changed
    }

    pub fn shutdown(&mut self) {
        if let Some(handle) = self.current.take() {
            self.sessions.close_session(handle);
            self.state.session = None;
            self.publish();
        }
    }

    fn transition(&mut self, filter: Filter) {
        let old = self.current.take();
        let handle = self.sessions.reconcile(old, filter.clone());
        tracing::info!("[VIEW] {} -> session {}", filter, handle.id());
        self.state.enter(filter, handle.id());
        self.current = Some(handle);
        self.publish();
    }

    fn publish(&self) {
        self.published.send_replace(self.state.clone());
    }
}

impl<C: Connector> Drop for ViewController<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
