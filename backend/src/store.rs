use airsync_shared::Reading;
use chrono::NaiveDate;
use std::collections::VecDeque;

/// Bounded, arrival-ordered reading buffer. The oldest readings fall off first.
pub struct ReadingStore {
    max: usize,
    buf: VecDeque<Reading>,
}

impl ReadingStore {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            max,
            buf: VecDeque::with_capacity(max),
        }
    }

    pub fn push(&mut self, reading: Reading) {
        if self.buf.len() == self.max {
            self.buf.pop_front();
        }
        self.buf.push_back(reading);
    }

    pub fn extend(&mut self, batch: impl IntoIterator<Item = Reading>) {
        for reading in batch {
            self.push(reading);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Newest first, at most `limit`.
    pub fn recent_for_node(&self, node_id: &str, limit: usize) -> Vec<Reading> {
        let mut out: Vec<Reading> = self
            .buf
            .iter()
            .filter(|r| r.node_id == node_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit);
        out
    }

    /// One UTC calendar day, oldest first.
    pub fn for_node_on(&self, node_id: &str, date: NaiveDate) -> Vec<Reading> {
        let mut out: Vec<Reading> = self
            .buf
            .iter()
            .filter(|r| r.node_id == node_id && r.timestamp.date_naive() == date)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.timestamp);
        out
    }
}
