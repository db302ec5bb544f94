use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Calendar date format used on the wire (`getDataByDate.date`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One sample from a sensor node. Fields the service adds (ids, versions) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub co2: f64,
}

/// Payload of `getDataByDate`. An empty `date` asks for the node's recent data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateQuery {
    pub date: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
}

impl DateQuery {
    pub fn new(date: Option<NaiveDate>, node_id: impl Into<String>) -> Self {
        Self {
            date: date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            node_id: node_id.into(),
        }
    }

    /// `Ok(None)` for the empty date.
    pub fn parsed_date(&self) -> Result<Option<NaiveDate>, chrono::ParseError> {
        let raw = self.date.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(raw, DATE_FORMAT).map(Some)
    }
}

/// Error body of a failed `sensorDataByDate` reply: `{ "error": true, ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryError {
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateResponse {
    Readings(Vec<Reading>),
    Error(QueryError),
}

impl DateResponse {
    pub fn error(message: impl Into<String>) -> Self {
        DateResponse::Error(QueryError {
            error: true,
            message: Some(message.into()),
        })
    }
}

/// Push channel frames, client -> service:
///   { "event": "getDataByDate", "data": { "date": "2024-01-01", "nodeId": "ESP32-1" } }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMsg {
    #[serde(rename = "getDataByDate")]
    GetDataByDate(DateQuery),
}

/// Push channel frames, service -> client:
///   { "event": "sensorDataUpdate", "data": [ ...Reading... ] }
///   { "event": "sensorDataByDate", "data": [ ...Reading... ] | { "error": true } }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMsg {
    #[serde(rename = "sensorDataUpdate")]
    SensorDataUpdate(Vec<Reading>),
    #[serde(rename = "sensorDataByDate")]
    SensorDataByDate(DateResponse),
}
