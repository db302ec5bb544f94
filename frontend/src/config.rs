// frontend/src/config.rs

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "airsync.toml";

/// Client settings, read from `airsync.toml` when present.
///
/// ```toml
/// base_url = "http://localhost:3000"
/// nodes = ["ESP32-1", "ESP32-2"]
/// default_node = "ESP32-1"
/// poll_interval_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub ws_path: String,
    pub nodes: Vec<String>,
    pub default_node: String,
    pub poll_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            ws_path: "/ws".to_string(),
            nodes: vec!["ESP32-1".to_string(), "ESP32-2".to_string()],
            default_node: "ESP32-1".to_string(),
            poll_interval_ms: 5_000,
            reconnect_delay_ms: 800,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("failed to read {}: {e}", path.display())))?;
        let mut config: ClientConfig = toml::from_str(&raw)
            .map_err(|e| SyncError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.base_url = normalize_base_url(config.base_url);
        config.validate()?;
        Ok(config)
    }

    /// Explicit path must load; the default path falls back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> SyncResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let path = config_path();
        if path.exists() {
            let config = Self::load(&path)?;
            tracing::info!("[CONFIG] loaded from {}", path.display());
            return Ok(config);
        }

        tracing::info!("[CONFIG] no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.nodes.is_empty() || self.nodes.iter().any(|n| n.trim().is_empty()) {
            return Err(SyncError::Config("node list must be non-empty".into()));
        }
        if !self.is_known_node(&self.default_node) {
            return Err(SyncError::Config(format!(
                "default node '{}' is not in the node list",
                self.default_node
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(SyncError::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn is_known_node(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n == node_id)
    }

    pub fn set_base_url(&mut self, url: String) {
        self.base_url = normalize_base_url(url);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn abs_http(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Returns ws/wss scheme + host[:port] (no path).
    pub fn base_ws(&self) -> String {
        let base_http = self.base_url.trim_end_matches('/').to_string();

        if base_http.starts_with("https://") {
            base_http.replacen("https://", "wss://", 1)
        } else if base_http.starts_with("http://") {
            base_http.replacen("http://", "ws://", 1)
        } else if base_http.starts_with("wss://") || base_http.starts_with("ws://") {
            base_http
        } else {
            format!("ws://{base_http}")
        }
    }

    pub fn ws_url(&self) -> String {
        let path = if self.ws_path.starts_with('/') {
            self.ws_path.clone()
        } else {
            format!("/{}", self.ws_path)
        };
        format!("{}{path}", self.base_ws())
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("AIRSYNC_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Strips fragments and any path so only scheme + authority remain.
pub fn normalize_base_url(mut url: String) -> String {
    if let Some(idx) = url.find('#') {
        url.truncate(idx);
    }
    if let Some(scheme_end) = url.find("://") {
        let rest = &url[scheme_end + 3..];
        if let Some(slash) = rest.find('/') {
            url.truncate(scheme_end + 3 + slash);
        }
    }
    url.trim().trim_end_matches('/').to_string()
}
