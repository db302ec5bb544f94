// frontend/src/lib.rs

pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod sync;

pub use config::ClientConfig;
pub use dashboard::{Dashboard, DashboardHandle};
pub use error::SyncError;
