// frontend/src/sync/poller.rs

use crate::config::ClientConfig;
use crate::error::SyncResult;
use airsync_shared::Reading;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const LOADING: &str = "Loading...";

/// Latest values for the stat displays.
#[derive(Debug, Clone, PartialEq)]
pub enum LatestSummary {
    Loading,
    Ready {
        node_id: String,
        timestamp: DateTime<Utc>,
        temperature: f64,
        humidity: f64,
        co2: f64,
    },
}

impl LatestSummary {
    /// The service sorts newest first, so the head of the list is the latest reading.
    pub fn from_latest(readings: &[Reading]) -> Option<Self> {
        readings.first().map(|r| LatestSummary::Ready {
            node_id: r.node_id.clone(),
            timestamp: r.timestamp,
            temperature: r.temperature,
            humidity: r.humidity,
            co2: r.co2,
        })
    }

    pub fn temperature_label(&self) -> String {
        match self {
            LatestSummary::Loading => LOADING.to_string(),
            LatestSummary::Ready { temperature, .. } => format!("{temperature}°C"),
        }
    }

    pub fn humidity_label(&self) -> String {
        match self {
            LatestSummary::Loading => LOADING.to_string(),
            LatestSummary::Ready { humidity, .. } => format!("{humidity}%"),
        }
    }

    pub fn co2_label(&self) -> String {
        match self {
            LatestSummary::Loading => LOADING.to_string(),
            LatestSummary::Ready { co2, .. } => format!("{co2} ppm"),
        }
    }
}

/// What stat consumers watch. `generation` identifies the poller allowed to write.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryBoard {
    pub node_id: String,
    pub latest: LatestSummary,
    generation: u64,
}

impl SummaryBoard {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            latest: LatestSummary::Loading,
            generation: 0,
        }
    }

    /// Takes the node and bumps the generation; older pollers lose write access.
    fn retarget(&mut self, node_id: &str) -> u64 {
        self.generation += 1;
        self.node_id = node_id.to_string();
        self.generation
    }

    /// Accepts a summary only from the current generation.
    fn offer(&mut self, generation: u64, latest: LatestSummary) -> bool {
        if generation != self.generation || self.latest == latest {
            return false;
        }
        self.latest = latest;
        true
    }

    /// What the stat displays show: values of another node read as still loading.
    pub fn shown(&self) -> LatestSummary {
        match &self.latest {
            LatestSummary::Ready { node_id, .. } if *node_id != self.node_id => {
                LatestSummary::Loading
            }
            latest => latest.clone(),
        }
    }
}

pub trait SummarySource: Send + Sync + 'static {
    fn fetch(&self, node_id: &str) -> impl Future<Output = SyncResult<Vec<Reading>>> + Send;
}

/// `GET {base}/api/sensor-data/{nodeId}`, newest first.
#[derive(Debug, Clone)]
pub struct HttpSummarySource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSummarySource {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.abs_http("/api/sensor-data"),
        }
    }

    fn url(&self, node_id: &str) -> String {
        format!("{}/{node_id}", self.endpoint)
    }
}

impl SummarySource for HttpSummarySource {
    async fn fetch(&self, node_id: &str) -> SyncResult<Vec<Reading>> {
        let readings = self
            .client
            .get(self.url(node_id))
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Reading>>()
            .await?;
        Ok(readings)
    }
}

#[derive(Debug, Default)]
pub struct PollerStats {
    started: AtomicU64,
    stopped: AtomicU64,
}

impl PollerStats {
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> u64 {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> u64 {
        self.started().saturating_sub(self.stopped())
    }
}

/// One running poll timer. Dropping it stops the timer.
pub struct PollerHandle {
    node_id: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    stats: Arc<PollerStats>,
}

impl PollerHandle {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    fn stop(&mut self) {
        if self.task.take().is_none() {
            return;
        }
        self.cancel.cancel();
        self.stats.stopped.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[POLL] stopped for {}", self.node_id);
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct SummaryPoller<S: SummarySource> {
    source: Arc<S>,
    period: Duration,
    board: Arc<watch::Sender<SummaryBoard>>,
    current: Option<PollerHandle>,
    stats: Arc<PollerStats>,
}

impl<S: SummarySource> SummaryPoller<S> {
    pub fn new(
        source: Arc<S>,
        period: Duration,
        node_id: &str,
    ) -> (Self, watch::Receiver<SummaryBoard>) {
        let (tx, rx) = watch::channel(SummaryBoard::new(node_id));
        let poller = Self {
            source,
            period,
            board: Arc::new(tx),
            current: None,
            stats: Arc::new(PollerStats::default()),
        };
        (poller, rx)
    }

    pub fn stats(&self) -> Arc<PollerStats> {
        self.stats.clone()
    }

    pub fn current_node(&self) -> Option<&str> {
        self.current.as_ref().map(PollerHandle::node_id)
    }

    /// Starts a timer for `node_id`: one fetch now, then one per period.
    pub fn start(&self, node_id: &str) -> PollerHandle {
        let mut generation = 0;
        self.board.send_modify(|board| generation = board.retarget(node_id));

        let cancel = CancellationToken::new();
        self.stats.started.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[POLL] started for {node_id} every {:?}", self.period);

        let task = tokio::spawn(poll_loop(
            node_id.to_string(),
            generation,
            self.period,
            self.source.clone(),
            self.board.clone(),
            cancel.clone(),
        ));

        PollerHandle {
            node_id: node_id.to_string(),
            cancel,
            task: Some(task),
            stats: self.stats.clone(),
        }
    }

    pub fn stop(&self, mut handle: PollerHandle) {
        handle.stop();
    }

    /// Keeps exactly one timer running, for `node_id`. No-op when it already is.
    pub fn follow(&mut self, node_id: &str) {
        if self.current_node() == Some(node_id) {
            return;
        }
        if let Some(old) = self.current.take() {
            self.stop(old);
        }
        self.current = Some(self.start(node_id));
    }

    pub fn shutdown(&mut self) {
        if let Some(handle) = self.current.take() {
            self.stop(handle);
        }
    }
}

impl<S: SummarySource> Drop for SummaryPoller<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn poll_loop<S: SummarySource>(
    node_id: String,
    generation: u64,
    period: Duration,
    source: Arc<S>,
    board: Arc<watch::Sender<SummaryBoard>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = source.fetch(&node_id) => res,
        };

        match res {
            Ok(readings) => match LatestSummary::from_latest(&readings) {
                Some(latest) => {
                    board.send_if_modified(|b| b.offer(generation, latest));
                }
                None => tracing::debug!("[POLL] no readings yet for {node_id}"),
            },
            Err(e) => tracing::warn!("[POLL] fetch for {node_id} failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::sync::state::tests::reading;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted per-node replies; a node with no script fails.
    #[derive(Default)]
    struct ScriptedSource {
        replies: Mutex<HashMap<String, Vec<Reading>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn set(&self, node: &str, readings: Vec<Reading>) {
            self.replies
                .lock()
                .unwrap()
                .insert(node.to_string(), readings);
        }

        fn calls_for(&self, node: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|n| *n == node).count()
        }
    }

    impl SummarySource for ScriptedSource {
        async fn fetch(&self, node_id: &str) -> SyncResult<Vec<Reading>> {
            self.calls.lock().unwrap().push(node_id.to_string());
            self.replies
                .lock()
                .unwrap()
                .get(node_id)
                .cloned()
                .ok_or(SyncError::ChannelClosed)
        }
    }

    const PERIOD: Duration = Duration::from_secs(5);

    #[test]
    fn http_source_joins_the_sensor_data_path() {
        let mut config = ClientConfig::default();
        config.set_base_url("http://localhost:3000/".into());
        let source = HttpSummarySource::new(&config);
        assert_eq!(
            source.url("ESP32-2"),
            "http://localhost:3000/api/sensor-data/ESP32-2"
        );
    }

    #[test]
    fn stale_node_values_show_as_loading() {
        let mut board = SummaryBoard::new("ESP32-1");
        let generation = board.retarget("ESP32-1");
        let latest = LatestSummary::from_latest(&[reading("ESP32-1", 1, 20.0)]).unwrap();
        assert!(board.offer(generation, latest.clone()));
        assert_eq!(board.shown(), latest);

        board.retarget("ESP32-2");
        assert_eq!(board.latest, latest);
        assert_eq!(board.shown(), LatestSummary::Loading);
        assert_eq!(board.shown().temperature_label(), "Loading...");
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_is_immediate_and_uses_newest_reading() {
        let source = Arc::new(ScriptedSource::default());
        source.set(
            "ESP32-1",
            vec![reading("ESP32-1", 9, 23.5), reading("ESP32-1", 8, 22.0)],
        );
        let (mut poller, board) = SummaryPoller::new(source.clone(), PERIOD, "ESP32-1");
        assert_eq!(board.borrow().latest, LatestSummary::Loading);

        poller.follow("ESP32-1");
        settle().await;

        let latest = board.borrow().latest.clone();
        assert_eq!(latest.temperature_label(), "23.5°C");
        assert_eq!(latest.humidity_label(), "40%");
        assert_eq!(latest.co2_label(), "420 ppm");
        assert_eq!(source.calls_for("ESP32-1"), 1);

        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(source.calls_for("ESP32-1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_keep_previous_summary() {
        let source = Arc::new(ScriptedSource::default());
        let (mut poller, board) = SummaryPoller::new(source.clone(), PERIOD, "ESP32-1");

        poller.follow("ESP32-1");
        settle().await;
        assert_eq!(board.borrow().latest, LatestSummary::Loading);

        source.set("ESP32-1", vec![reading("ESP32-1", 1, 20.0)]);
        tokio::time::advance(PERIOD).await;
        settle().await;
        let good = board.borrow().latest.clone();
        assert_eq!(good.temperature_label(), "20°C");

        source.replies.lock().unwrap().clear();
        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(board.borrow().latest, good);

        source.set("ESP32-1", vec![]);
        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(board.borrow().latest, good);
    }

    #[tokio::test(start_paused = true)]
    async fn node_change_swaps_exactly_one_timer() {
        let source = Arc::new(ScriptedSource::default());
        source.set("ESP32-1", vec![reading("ESP32-1", 1, 20.0)]);
        source.set("ESP32-2", vec![reading("ESP32-2", 1, 30.0)]);
        let (mut poller, board) = SummaryPoller::new(source.clone(), PERIOD, "ESP32-1");
        let stats = poller.stats();

        poller.follow("ESP32-1");
        settle().await;
        poller.follow("ESP32-1");
        assert_eq!(stats.started(), 1);

        poller.follow("ESP32-2");
        assert_eq!(stats.started(), 2);
        assert_eq!(stats.stopped(), 1);
        assert_eq!(stats.running(), 1);
        settle().await;

        let calls_old = source.calls_for("ESP32-1");
        tokio::time::advance(PERIOD * 3).await;
        settle().await;
        assert_eq!(source.calls_for("ESP32-1"), calls_old);
        assert!(source.calls_for("ESP32-2") >= 2);

        let b = board.borrow().clone();
        assert_eq!(b.node_id, "ESP32-2");
        assert_eq!(b.latest.temperature_label(), "30°C");

        poller.shutdown();
        assert_eq!(stats.running(), 0);
    }

    #[test]
    fn board_rejects_superseded_generation() {
        let mut board = SummaryBoard::new("ESP32-1");
        let old = board.retarget("ESP32-1");
        let new = board.retarget("ESP32-2");

        let stale = LatestSummary::from_latest(&[reading("ESP32-1", 1, 20.0)]).unwrap();
        assert!(!board.offer(old, stale));
        assert_eq!(board.latest, LatestSummary::Loading);

        let fresh = LatestSummary::from_latest(&[reading("ESP32-2", 1, 30.0)]).unwrap();
        assert!(board.offer(new, fresh.clone()));
        assert!(!board.offer(new, fresh));
    }

    #[test]
    fn loading_sentinel_labels() {
        let s = LatestSummary::Loading;
        assert_eq!(s.temperature_label(), "Loading...");
        assert_eq!(s.humidity_label(), "Loading...");
        assert_eq!(s.co2_label(), "Loading...");
    }
}
