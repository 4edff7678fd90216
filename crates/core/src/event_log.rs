//! Bounded, newest-first log of human-readable stream lines.
//!
//! The log is display state only. Clearing it never affects the job
//! snapshot.

use std::collections::VecDeque;

use chrono::Utc;
use serde::Serialize;

use crate::types::Timestamp;

/// Default number of lines kept.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// One rendered log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub message: String,
}

/// Ring buffer of [`LogEntry`] values, newest at index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LiveEventLog {
    /// Create a log holding at most `capacity` lines (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line stamped with the current time.
    pub fn push(&mut self, message: impl Into<String>) {
        self.push_at(Utc::now(), message);
    }

    /// Append a line with an explicit timestamp. The oldest line is
    /// dropped once the log is full.
    pub fn push_at(&mut self, timestamp: Timestamp, message: impl Into<String>) {
        self.entries.push_front(LogEntry {
            timestamp,
            message: message.into(),
        });
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copy the entries out, newest first.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for LiveEventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_fifty() {
        let mut log = LiveEventLog::default();
        for i in 0..75 {
            log.push(format!("event {i}"));
        }
        assert_eq!(log.len(), 50);
        assert_eq!(log.latest().unwrap().message, "event 74");
        assert_eq!(log.entries().last().unwrap().message, "event 25");
    }

    #[test]
    fn newest_first_ordering() {
        let mut log = LiveEventLog::new(3);
        log.push("a");
        log.push("b");
        let messages: Vec<_> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "a"]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut log = LiveEventLog::new(0);
        log.push("a");
        log.push("b");
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest().unwrap().message, "b");
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = LiveEventLog::default();
        log.push("x");
        log.clear();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
    }
}
