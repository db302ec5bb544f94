// frontend/src/sync/state.rs

use crate::sync::session::SessionId;
use airsync_shared::{DATE_FORMAT, DateResponse, Reading};
use chrono::NaiveDate;
use std::fmt;

/// What the view is currently asking for. No date means live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    pub node_id: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Historical(NaiveDate),
}

impl Filter {
    pub fn live(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            date: None,
        }
    }

    pub fn historical(node_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            node_id: node_id.into(),
            date: Some(date),
        }
    }

    pub fn mode(&self) -> Mode {
        match self.date {
            Some(date) => Mode::Historical(date),
            None => Mode::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.date.is_none()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode() {
            Mode::Historical(date) => write!(f, "{} @ {}", self.node_id, date.format(DATE_FORMAT)),
            Mode::Live => write!(f, "{} @ live", self.node_id),
        }
    }
}

/// Keeps the readings of one node, in batch order.
pub fn filter_for_node(batch: &[Reading], node_id: &str) -> Vec<Reading> {
    batch
        .iter()
        .filter(|r| r.node_id == node_id)
        .cloned()
        .collect()
}

/// The single view record. Every mutation goes through `enter` or one of the `apply_*`
/// transitions; consumers get clones of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub filter: Filter,
    pub loading: bool,
    pub readings: Vec<Reading>,
    /// Filter that produced `readings`; lags `filter` until the new session delivers.
    pub readings_source: Option<Filter>,
    pub session: Option<SessionId>,
}

impl ViewState {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            loading: false,
            readings: Vec::new(),
            readings_source: None,
            session: None,
        }
    }

    /// Live entry starts empty. Historical entry keeps the old readings behind the loading
    /// flag, since a failed query leaves them on screen.
    pub fn enter(&mut self, filter: Filter, session: SessionId) {
        self.loading = !filter.is_live();
        if filter.is_live() {
            self.readings.clear();
            self.readings_source = None;
        }
        self.filter = filter;
        self.session = Some(session);
    }

    /// Readings a consumer may show for the current filter.
    pub fn visible_readings(&self) -> &[Reading] {
        let current = self.readings_source.as_ref() == Some(&self.filter);
        let failed_query = !self.filter.is_live() && !self.loading;
        if current || failed_query {
            self.readings.as_slice()
        } else {
            &[]
        }
    }

    pub fn apply_live_batch(&mut self, batch: &[Reading]) -> bool {
        if !self.filter.is_live() {
            return false;
        }
        self.readings = filter_for_node(batch, &self.filter.node_id);
        self.readings_source = Some(self.filter.clone());
        true
    }

    pub fn apply_date_reply(&mut self, reply: DateResponse) -> bool {
        if self.filter.is_live() {
            return self.seed_live(reply);
        }
        match reply {
            DateResponse::Readings(readings) => {
                self.readings = readings;
                self.readings_source = Some(self.filter.clone());
            }
            DateResponse::Error(e) => {
                tracing::debug!(
                    "[VIEW] query for {} failed: {}",
                    self.filter,
                    e.message.as_deref().unwrap_or("no details")
                );
            }
        }
        self.loading = false;
        true
    }

    /// Recent readings for a live view that has not seen a batch yet.
    fn seed_live(&mut self, reply: DateResponse) -> bool {
        if self.readings_source.as_ref() == Some(&self.filter) {
            return false;
        }
        match reply {
            DateResponse::Readings(readings) => {
                self.readings = filter_for_node(&readings, &self.filter.node_id);
                self.readings_source = Some(self.filter.clone());
                true
            }
            DateResponse::Error(e) => {
                tracing::debug!(
                    "[VIEW] recent data for {} unavailable: {}",
                    self.filter,
                    e.message.as_deref().unwrap_or("no details")
                );
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    pub(crate) fn reading(node: &str, minute: u32, temperature: f64) -> Reading {
        Reading {
            node_id: node.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap(),
            temperature,
            humidity: 40.0,
            co2: 420.0,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn live_filter_keeps_matching_subset_in_order() {
        let batch = vec![
            reading("ESP32-1", 1, 20.0),
            reading("ESP32-2", 2, 30.0),
            reading("ESP32-1", 3, 21.0),
            reading("ESP32-2", 4, 31.0),
        ];
        let kept = filter_for_node(&batch, "ESP32-1");
        assert_eq!(kept, vec![batch[0].clone(), batch[2].clone()]);
    }

    #[test]
    fn live_filter_is_idempotent() {
        let batch = vec![
            reading("ESP32-2", 1, 30.0),
            reading("ESP32-1", 2, 20.0),
        ];
        let once = filter_for_node(&batch, "ESP32-1");
        let twice = filter_for_node(&once, "ESP32-1");
        assert_eq!(once, twice);
    }

    #[test]
    fn live_batch_replaces_instead_of_appending() {
        let mut state = ViewState::new(Filter::live("ESP32-1"));
        state.enter(Filter::live("ESP32-1"), SessionId::new(1));
        assert!(!state.loading);

        state.apply_live_batch(&[reading("ESP32-1", 1, 20.0)]);
        state.apply_live_batch(&[reading("ESP32-1", 2, 21.0), reading("ESP32-2", 2, 9.0)]);
        assert_eq!(state.readings, vec![reading("ESP32-1", 2, 21.0)]);
    }

    #[test]
    fn historical_success_replaces_and_clears_loading() {
        let filter = Filter::historical("ESP32-1", day());
        let mut state = ViewState::new(filter.clone());
        state.enter(filter.clone(), SessionId::new(1));
        assert!(state.loading);

        let payload = vec![reading("ESP32-1", 5, 22.0)];
        assert!(state.apply_date_reply(DateResponse::Readings(payload.clone())));
        assert!(!state.loading);
        assert_eq!(state.readings, payload);
        assert_eq!(state.readings_source, Some(filter));
    }

    #[test]
    fn historical_error_keeps_prior_readings() {
        let mut state = ViewState::new(Filter::live("ESP32-1"));
        state.enter(Filter::live("ESP32-1"), SessionId::new(1));
        state.apply_live_batch(&[reading("ESP32-1", 1, 20.0)]);
        let before = state.readings.clone();

        state.enter(Filter::historical("ESP32-1", day()), SessionId::new(2));
        assert!(state.loading);
        assert!(state.apply_date_reply(DateResponse::error("no data")));
        assert!(!state.loading);
        assert_eq!(state.readings, before);
        assert_eq!(state.readings_source, Some(Filter::live("ESP32-1")));
    }

    #[test]
    fn live_batches_are_ignored_in_historical_mode() {
        let filter = Filter::historical("ESP32-1", day());
        let mut state = ViewState::new(filter.clone());
        state.enter(filter, SessionId::new(1));
        assert!(!state.apply_live_batch(&[reading("ESP32-1", 1, 20.0)]));
        assert!(state.readings.is_empty());
        assert!(state.loading);
    }

    #[test]
    fn live_node_switch_drops_previous_node_readings() {
        let mut state = ViewState::new(Filter::live("ESP32-1"));
        state.enter(Filter::live("ESP32-1"), SessionId::new(1));
        state.apply_live_batch(&[reading("ESP32-1", 1, 20.0)]);
        assert_eq!(state.visible_readings().len(), 1);

        state.enter(Filter::live("ESP32-2"), SessionId::new(2));
        assert!(!state.loading);
        assert!(state.readings.is_empty());
        assert!(state.visible_readings().is_empty());
        assert_eq!(state.readings_source, None);
    }

    #[test]
    fn visible_readings_hide_another_filters_data_while_loading() {
        let mut state = ViewState::new(Filter::live("ESP32-1"));
        state.enter(Filter::live("ESP32-1"), SessionId::new(1));
        state.apply_live_batch(&[reading("ESP32-1", 1, 20.0)]);

        state.enter(Filter::historical("ESP32-2", day()), SessionId::new(2));
        assert!(state.visible_readings().is_empty());

        state.apply_date_reply(DateResponse::error("no data"));
        assert_eq!(state.visible_readings(), &[reading("ESP32-1", 1, 20.0)][..]);
    }

    #[test]
    fn live_seed_fills_an_empty_view_without_loading() {
        let mut state = ViewState::new(Filter::live("ESP32-2"));
        state.enter(Filter::live("ESP32-2"), SessionId::new(1));

        let recent = vec![reading("ESP32-2", 1, 30.0), reading("ESP32-2", 2, 31.0)];
        assert!(state.apply_date_reply(DateResponse::Readings(recent.clone())));
        assert!(!state.loading);
        assert_eq!(state.visible_readings(), &recent[..]);
    }

    #[test]
    fn live_seed_never_overwrites_a_batch() {
        let mut state = ViewState::new(Filter::live("ESP32-1"));
        state.enter(Filter::live("ESP32-1"), SessionId::new(1));
        state.apply_live_batch(&[reading("ESP32-1", 9, 25.0)]);

        let stale = DateResponse::Readings(vec![reading("ESP32-1", 1, 20.0)]);
        assert!(!state.apply_date_reply(stale));
        assert!(!state.apply_date_reply(DateResponse::error("down")));
        assert_eq!(state.readings, vec![reading("ESP32-1", 9, 25.0)]);
        assert!(!state.loading);
    }

    #[test]
    fn filter_display() {
        assert_eq!(Filter::live("ESP32-2").to_string(), "ESP32-2 @ live");
        assert_eq!(
            Filter::historical("ESP32-1", day()).to_string(),
            "ESP32-1 @ 2024-01-01"
        );
    }
}
