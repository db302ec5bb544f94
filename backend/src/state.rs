use crate::store::ReadingStore;
use airsync_shared::{DateQuery, DateResponse, Reading};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    /// In-memory readings, bounded; nothing survives a restart
    pub store: Arc<Mutex<ReadingStore>>,

    /// Ingested batches → every connected push channel
    pub updates_tx: broadcast::Sender<Vec<Reading>>,

    /// Cap for `/api/sensor-data/{nodeId}` and empty-date queries
    pub recent_limit: usize,
}

impl AppState {
    pub fn new(capacity: usize, recent_limit: usize) -> Self {
        Self {
            store: Arc::new(Mutex::new(ReadingStore::new(capacity))),
            updates_tx: broadcast::channel(256).0,
            recent_limit,
        }
    }

    fn store(&self) -> MutexGuard<'_, ReadingStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores the batch and broadcasts it as one `sensorDataUpdate`.
    pub fn ingest(&self, batch: Vec<Reading>) -> usize {
        let n = batch.len();
        if n == 0 {
            return 0;
        }
        self.store().extend(batch.iter().cloned());
        // No subscribers is fine.
        let _ = self.updates_tx.send(batch);
        n
    }

    pub fn recent(&self, node_id: &str) -> Vec<Reading> {
        self.store().recent_for_node(node_id, self.recent_limit)
    }

    /// Answer for `getDataByDate`, oldest first. The empty date asks for the recent window.
    pub fn by_date(&self, query: &DateQuery) -> DateResponse {
        match query.parsed_date() {
            Ok(Some(date)) => DateResponse::Readings(self.store().for_node_on(&query.node_id, date)),
            Ok(None) => {
                let mut recent = self.recent(&query.node_id);
                recent.reverse();
                DateResponse::Readings(recent)
            }
            Err(e) => DateResponse::error(format!("invalid date '{}': {e}", query.date)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(node: &str, hour: u32) -> Reading {
        Reading {
            node_id: node.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            temperature: 21.0,
            humidity: 45.0,
            co2: 500.0,
        }
    }

    #[tokio::test]
    async fn ingest_stores_and_broadcasts() {
        let state = AppState::new(100, 10);
        let mut rx = state.updates_tx.subscribe();

        let batch = vec![reading("ESP32-1", 1), reading("ESP32-2", 1)];
        assert_eq!(state.ingest(batch.clone()), 2);
        assert_eq!(rx.recv().await.unwrap(), batch);
        assert_eq!(state.recent("ESP32-2"), vec![reading("ESP32-2", 1)]);
    }

    #[test]
    fn by_date_answers_and_reports_bad_dates() {
        let state = AppState::new(100, 10);
        state.ingest(vec![reading("ESP32-1", 3), reading("ESP32-1", 2)]);

        let q = DateQuery {
            date: "2024-01-01".into(),
            node_id: "ESP32-1".into(),
        };
        assert_eq!(
            state.by_date(&q),
            DateResponse::Readings(vec![reading("ESP32-1", 2), reading("ESP32-1", 3)])
        );

        let recent = DateQuery::new(None, "ESP32-1");
        assert_eq!(
            state.by_date(&recent),
            DateResponse::Readings(vec![reading("ESP32-1", 2), reading("ESP32-1", 3)])
        );

        let bad = DateQuery {
            date: "yesterday".into(),
            node_id: "ESP32-1".into(),
        };
        assert!(matches!(state.by_date(&bad), DateResponse::Error(e) if e.error));
    }
}
