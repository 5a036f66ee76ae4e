//! Pure snapshot transforms
//!
//! Nothing here touches the store; the engine loads a [`Snapshot`], applies
//! one of these and persists the result.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{DomainEvent, LogEntry, LogType, Logs, Stats, StatsOutcome, Unseen};

pub const LOGS_KEY: &str = "logs";
pub const STATS_KEY: &str = "stats";
pub const UNSEEN_KEY: &str = "unseen";

/// Everything the control surface displays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub stats: Stats,
    pub logs: Logs,
    pub unseen: Unseen,
}

impl Snapshot {
    pub fn record_event(&mut self, time: String, event: &DomainEvent) -> StatsOutcome {
        let outcome = self.stats.apply(event);
        if let StatsOutcome::Skipped(why) = outcome {
            warn!(event_type = %event.event_type, %why, "stats not updated");
        }
        self.logs.push(LogEntry::event(time, event));
        self.unseen.increment(LogType::Event);
        outcome
    }

    pub fn record_warn(&mut self, time: String, message: &str) {
        self.logs.push(LogEntry::warn(time, message));
        self.unseen.increment(LogType::Warn);
    }

    pub fn record_error(&mut self, time: String, message: &str, is_critical: bool) {
        self.logs.push(LogEntry::error(time, message, is_critical));
        self.unseen.increment(LogType::Error);
    }

    pub fn clear_unseen(&mut self, log_type: LogType) {
        self.unseen.clear(log_type);
    }

    /// Evict the oldest entries beyond `max` and clamp unseen to what is left
    pub fn retain(&mut self, max: Option<usize>) -> usize {
        let Some(max) = max else {
            return 0;
        };
        let mut evicted = 0;
        for log_type in LogType::ALL {
            evicted += self.logs.evict_oldest(log_type, max);
            self.unseen.clamp(log_type, self.logs.entries(log_type).len());
        }
        if evicted > 0 {
            debug!(evicted, max, "retain: evicted old log entries");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_counts_even_when_stats_skip() {
        let mut snapshot = Snapshot::default();
        let event = DomainEvent::new(crate::domain::EventKind::Claim, serde_json::json!({"character": "Ram"}));
        assert!(matches!(
            snapshot.record_event("t".to_string(), &event),
            StatsOutcome::Skipped(_)
        ));
        assert_eq!(snapshot.logs.event.len(), 1);
        assert_eq!(snapshot.unseen.event, 1);
        assert!(snapshot.stats.characters.is_empty());
    }

    #[test]
    fn test_retain_clamps_unseen() {
        let mut snapshot = Snapshot::default();
        for i in 0..4 {
            snapshot.record_warn("t".to_string(), &format!("w{}", i));
        }
        assert_eq!(snapshot.retain(Some(2)), 2);
        assert_eq!(snapshot.logs.warn.len(), 2);
        assert_eq!(snapshot.unseen.warn, 2);
    }

    #[test]
    fn test_retain_none_keeps_all() {
        let mut snapshot = Snapshot::default();
        for _ in 0..3 {
            snapshot.record_error("t".to_string(), "e", false);
        }
        assert_eq!(snapshot.retain(None), 0);
        assert_eq!(snapshot.logs.error.len(), 3);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let mut snapshot = Snapshot::default();
        snapshot.record_warn("2026-01-01 00:00:00".to_string(), "careful");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["unseen"]["warn"], 1);
        assert_eq!(json["logs"]["warn"][0]["type"], "warn");
        assert!(json["stats"]["characters"].as_object().unwrap().is_empty());
    }
}
