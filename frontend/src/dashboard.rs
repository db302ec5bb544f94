// frontend/src/dashboard.rs

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::sync::poller::{HttpSummarySource, PollerStats, SummaryBoard, SummaryPoller, SummarySource};
use crate::sync::session::{SessionEvent, SessionStats};
use crate::sync::state::{Filter, ViewState};
use crate::sync::transport::{Connector, WsConnector};
use crate::sync::view::{ViewCommand, ViewController};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const COMMAND_QUEUE: usize = 32;

/// One overview view: the view controller and the summary poller, driven by a single task.
pub struct Dashboard<C: Connector, S: SummarySource> {
    config: ClientConfig,
    connector: Arc<C>,
    source: Arc<S>,
}

impl Dashboard<WsConnector, HttpSummarySource> {
    pub fn from_config(config: ClientConfig) -> Self {
        let connector = Arc::new(WsConnector::new(config.ws_url()));
        let source = Arc::new(HttpSummarySource::new(&config));
        Self::new(config, connector, source)
    }
}

impl<C: Connector, S: SummarySource> Dashboard<C, S> {
    pub fn new(config: ClientConfig, connector: Arc<C>, source: Arc<S>) -> Self {
        Self {
            config,
            connector,
            source,
        }
    }

    /// Starts the view on `initial` and returns the handle that owns its lifetime.
    pub fn spawn(self, initial: Filter) -> SyncResult<DashboardHandle> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view, view_rx) =
            ViewController::new(&self.config, initial.clone(), self.connector, events_tx)?;
        let (poller, summary_rx) = SummaryPoller::new(
            self.source,
            self.config.poll_interval(),
            &initial.node_id,
        );

        let sessions = view.session_stats();
        let pollers = poller.stats();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let task = tokio::spawn(run(view, poller, cmd_rx, events_rx));

        Ok(DashboardHandle {
            commands: cmd_tx,
            nodes: self.config.nodes.clone(),
            view: view_rx,
            summary: summary_rx,
            sessions,
            pollers,
            task,
        })
    }
}

pub struct DashboardHandle {
    commands: mpsc::Sender<ViewCommand>,
    nodes: Vec<String>,
    pub view: watch::Receiver<ViewState>,
    pub summary: watch::Receiver<SummaryBoard>,
    pub sessions: Arc<SessionStats>,
    pub pollers: Arc<PollerStats>,
    task: JoinHandle<()>,
}

impl DashboardHandle {
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub async fn select_node(&self, node_id: &str) -> SyncResult<()> {
        if !self.nodes.iter().any(|n| n == node_id) {
            return Err(SyncError::UnknownNode(node_id.to_string()));
        }
        self.send(ViewCommand::SelectNode(node_id.to_string())).await
    }

    pub async fn select_date(&self, date: Option<NaiveDate>) -> SyncResult<()> {
        self.send(ViewCommand::SelectDate(date)).await
    }

    pub async fn reset(&self) -> SyncResult<()> {
        self.send(ViewCommand::Reset).await
    }

    /// Closes the session and stops the poller before returning.
    pub async fn shutdown(self) {
        let _ = self.commands.send(ViewCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!("[VIEW] dashboard task ended abnormally: {e}");
        }
    }

    async fn send(&self, cmd: ViewCommand) -> SyncResult<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }
}

async fn run<C: Connector, S: SummarySource>(
    mut view: ViewController<C>,
    mut poller: SummaryPoller<S>,
    mut commands: mpsc::Receiver<ViewCommand>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    view.start();
    poller.follow(&view.state().filter.node_id);

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                if cmd == ViewCommand::Shutdown {
                    break;
                }
                if let Err(e) = view.apply_command(cmd) {
                    tracing::warn!("[VIEW] {e}");
                }
                poller.follow(&view.state().filter.node_id);
            }
            Some(event) = events.recv() => {
                view.handle_event(event);
            }
        }
    }

    view.shutdown();
    poller.shutdown();
    tracing::info!("[VIEW] dashboard stopped");
}
