//! Bounded log of configuration change attempts.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

/// The log keeps the most recent attempts only; older entries are evicted.
const EVENT_LOG_CAPACITY: usize = 100;

/// Record of one reload attempt or rollback commit.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// When the attempt happened.
    pub timestamp: SystemTime,

    /// Version produced by the attempt; for failures, the version the
    /// attempt would have produced.
    pub version: u64,

    /// Field paths that changed, in schema order. Empty on failure.
    pub changed_fields: Vec<String>,

    /// Whether the attempt committed.
    pub success: bool,

    /// Loader or validation message when the attempt failed.
    pub error_message: Option<String>,
}

impl ChangeEvent {
    pub(crate) fn success(version: u64, changed_fields: Vec<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            version,
            changed_fields,
            success: true,
            error_message: None,
        }
    }

    pub(crate) fn failure(version: u64, message: String) -> Self {
        Self {
            timestamp: SystemTime::now(),
            version,
            changed_fields: Vec::new(),
            success: false,
            error_message: Some(message),
        }
    }
}

/// Append-only, capacity-bounded event log.
pub(crate) struct EventLog {
    entries: Mutex<VecDeque<ChangeEvent>>,
}

impl EventLog {
    pub(crate) fn new() -> Self {
        Self { entries: Mutex::new(VecDeque::new()) }
    }

    pub(crate) fn record(&self, event: ChangeEvent) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(event);
        while entries.len() > EVENT_LOG_CAPACITY {
            entries.pop_front();
        }
    }

    /// Most recent events first; `count == 0` returns everything retained.
    pub(crate) fn recent(&self, count: usize) -> Vec<ChangeEvent> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let iter = entries.iter().rev().cloned();
        if count == 0 {
            iter.collect()
        } else {
            iter.take(count).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_is_newest_first() {
        let log = EventLog::new();
        log.record(ChangeEvent::success(1, vec![]));
        log.record(ChangeEvent::failure(2, "nope".to_string()));
        log.record(ChangeEvent::success(2, vec!["logger.level".to_string()]));

        let events = log.recent(0);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].version, 2);
        assert!(events[0].success);
        assert_eq!(events[1].error_message.as_deref(), Some("nope"));
        assert_eq!(events[2].version, 1);
    }

    #[test]
    fn count_limits_the_result() {
        let log = EventLog::new();
        for version in 1..=10 {
            log.record(ChangeEvent::success(version, vec![]));
        }
        let events = log.recent(3);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].version, 10);
        assert_eq!(events[2].version, 8);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let log = EventLog::new();
        for version in 1..=150 {
            log.record(ChangeEvent::success(version, vec![]));
        }

        let events = log.recent(0);
        assert_eq!(events.len(), EVENT_LOG_CAPACITY);
        assert_eq!(events[0].version, 150);
        assert_eq!(events[events.len() - 1].version, 51);
    }
}
