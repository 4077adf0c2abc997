//! User-visible status message history.
//!
//! Every action boundary (dialog open, save, dispatch) converts its outcome
//! into a status entry here. The UI renders `latest()`; older entries are kept
//! in a fixed-capacity circular buffer for inspection.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Error,
}

/// A single status message shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub id: u64,
    pub timestamp_ms: i64,
    pub level: StatusLevel,
    pub message: String,
}

impl StatusEntry {
    pub fn is_error(&self) -> bool {
        self.level == StatusLevel::Error
    }
}

// ---------------------------------------------------------------------------
// Ring buffer
// ---------------------------------------------------------------------------

pub const STATUS_LOG_CAPACITY: usize = 100;

/// Fixed-capacity circular buffer of status entries.
#[derive(Debug)]
pub struct StatusLog {
    entries: Vec<Option<StatusEntry>>,
    capacity: usize,
    /// Write position (wraps around)
    write_pos: usize,
    /// Number of entries currently stored (≤ capacity)
    count: usize,
    next_id: u64,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new(STATUS_LOG_CAPACITY)
    }
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self {
            entries,
            capacity,
            write_pos: 0,
            count: 0,
            next_id: 1,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.push(StatusLevel::Info, message.into())
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.push(StatusLevel::Error, message.into())
    }

    /// Push a new entry. Returns the assigned entry ID.
    pub fn push(&mut self, level: StatusLevel, message: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        match level {
            StatusLevel::Info => tracing::info!(status_id = id, "{message}"),
            StatusLevel::Error => tracing::warn!(status_id = id, "{message}"),
        }

        self.entries[self.write_pos] = Some(StatusEntry {
            id,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            level,
            message,
        });
        self.write_pos = (self.write_pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }

        id
    }

    /// The message currently on display.
    pub fn latest(&self) -> Option<&StatusEntry> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.write_pos + self.capacity - 1) % self.capacity;
        self.entries[idx].as_ref()
    }

    /// Return entries oldest first, limited to the `limit` most recent (0 = all).
    pub fn entries(&self, limit: usize) -> Vec<StatusEntry> {
        if self.count == 0 {
            return Vec::new();
        }

        let effective_limit = if limit == 0 { self.count } else { limit.min(self.count) };
        let start = if self.count < self.capacity { 0 } else { self.write_pos };

        let skip = self.count - effective_limit;
        (skip..self.count)
            .filter_map(|i| self.entries[(start + i) % self.capacity].clone())
            .collect()
    }

    /// Remove all entries. IDs stay monotonic.
    pub fn clear(&mut self) {
        for slot in self.entries.iter_mut() {
            *slot = None;
        }
        self.write_pos = 0;
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
