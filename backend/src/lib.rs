// backend/src/lib.rs
//
// In-memory development instance of the telemetry service: push channel on /ws,
// pull resource on /api/sensor-data/{nodeId}, ingest on POST /api/sensor-data.

pub mod simulator;
pub mod state;
pub mod store;
pub mod web;

pub use state::AppState;
