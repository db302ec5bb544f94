use crate::state::AppState;
use airsync_shared::Reading;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// A plausible indoor reading: 18–30 °C, 30–70 %RH, 400–1200 ppm CO2.
pub fn dummy_reading(node_id: &str, timestamp: DateTime<Utc>) -> Reading {
    let mut rng = rand::rng();
    Reading {
        node_id: node_id.to_string(),
        timestamp,
        temperature: round1(rng.random_range(18.0..30.0)),
        humidity: round1(rng.random_range(30.0..70.0)),
        co2: rng.random_range(400.0_f64..1200.0).round(),
    }
}

/// Ingests one reading per node every `period`, as if the nodes were pushing.
pub async fn simulate(state: Arc<AppState>, nodes: Vec<String>, period: Duration) {
    let mut ticker = interval(period);
    tracing::info!("[SIM] producing readings for {nodes:?} every {period:?}");

    loop {
        ticker.tick().await;
        let now = Utc::now();
        let batch: Vec<Reading> = nodes.iter().map(|n| dummy_reading(n, now)).collect();
        state.ingest(batch);
    }
}
