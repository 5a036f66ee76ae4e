//! Log entries, domain events and unseen counters

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;

/// Format of the `time` field on every log entry
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time formatted for a log entry
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

/// The three log collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Event,
    Warn,
    Error,
}

impl LogType {
    pub const ALL: [LogType; 3] = [LogType::Event, LogType::Warn, LogType::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown log type: {}", s))
    }
}

/// Kinds of occurrences the page reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Claim,
    Steal,
    Kakera,
    Soulmate,
    CharacterFound,
    Bonus,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Claim,
        EventKind::Steal,
        EventKind::Kakera,
        EventKind::Soulmate,
        EventKind::CharacterFound,
        EventKind::Bonus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Steal => "steal",
            Self::Kakera => "kakera",
            Self::Soulmate => "soulmate",
            Self::CharacterFound => "character_found",
            Self::Bonus => "bonus",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {}", s))
    }
}

/// A domain event as reported by the page
///
/// `event_data` is kept as the page sent it. Unknown fields are carried along
/// and missing fields read as `None`, so a malformed payload never fails the
/// writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub event_type: EventKind,
    #[serde(default)]
    pub event_data: Value,
}

impl DomainEvent {
    pub fn new(event_type: EventKind, event_data: Value) -> Self {
        Self { event_type, event_data }
    }

    pub fn claim(user: &str, character: &str) -> Self {
        Self::new(EventKind::Claim, json!({ "user": user, "character": character }))
    }

    pub fn steal(user: Option<&str>, character: Option<&str>) -> Self {
        Self::new(EventKind::Steal, json!({ "user": user, "character": character }))
    }

    pub fn kakera(user: &str, amount: u64, kakera_type: &str) -> Self {
        Self::new(
            EventKind::Kakera,
            json!({ "user": user, "amount": amount, "kakeraType": kakera_type }),
        )
    }

    pub fn soulmate(user: &str, character: &str) -> Self {
        Self::new(EventKind::Soulmate, json!({ "user": user, "character": character }))
    }

    fn text(&self, field: &str) -> Option<String> {
        self.event_data.get(field).and_then(Value::as_str).map(str::to_string)
    }

    pub fn user(&self) -> Option<String> {
        self.text("user")
    }

    pub fn character(&self) -> Option<String> {
        self.text("character")
    }

    pub fn kakera_type(&self) -> Option<String> {
        self.text("kakeraType")
    }

    /// Kakera quantity; accepts numbers and numeric strings
    pub fn amount(&self) -> Option<u64> {
        match self.event_data.get("amount")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// One entry in a log collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    Event {
        time: String,
        #[serde(rename = "eventType")]
        event_type: EventKind,
        #[serde(rename = "eventData", default)]
        event_data: Value,
    },
    Warn {
        time: String,
        message: String,
    },
    Error {
        time: String,
        message: String,
        #[serde(rename = "isCritical", default)]
        is_critical: bool,
    },
}

impl LogEntry {
    pub fn event(time: impl Into<String>, event: &DomainEvent) -> Self {
        Self::Event {
            time: time.into(),
            event_type: event.event_type,
            event_data: event.event_data.clone(),
        }
    }

    pub fn warn(time: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Warn {
            time: time.into(),
            message: message.into(),
        }
    }

    pub fn error(time: impl Into<String>, message: impl Into<String>, is_critical: bool) -> Self {
        Self::Error {
            time: time.into(),
            message: message.into(),
            is_critical,
        }
    }

    pub fn log_type(&self) -> LogType {
        match self {
            Self::Event { .. } => LogType::Event,
            Self::Warn { .. } => LogType::Warn,
            Self::Error { .. } => LogType::Error,
        }
    }

    pub fn time(&self) -> &str {
        match self {
            Self::Event { time, .. } | Self::Warn { time, .. } | Self::Error { time, .. } => time,
        }
    }
}

/// Log history, one chronological collection per type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logs {
    pub event: Vec<LogEntry>,
    pub warn: Vec<LogEntry>,
    pub error: Vec<LogEntry>,
}

impl Logs {
    pub fn entries(&self, log_type: LogType) -> &[LogEntry] {
        match log_type {
            LogType::Event => &self.event,
            LogType::Warn => &self.warn,
            LogType::Error => &self.error,
        }
    }

    fn entries_mut(&mut self, log_type: LogType) -> &mut Vec<LogEntry> {
        match log_type {
            LogType::Event => &mut self.event,
            LogType::Warn => &mut self.warn,
            LogType::Error => &mut self.error,
        }
    }

    /// Append to the collection matching the entry's type
    pub fn push(&mut self, entry: LogEntry) {
        self.entries_mut(entry.log_type()).push(entry);
    }

    /// Drop the oldest entries so at most `max` remain; returns how many were dropped
    pub fn evict_oldest(&mut self, log_type: LogType, max: usize) -> usize {
        let entries = self.entries_mut(log_type);
        let excess = entries.len().saturating_sub(max);
        entries.drain(..excess);
        excess
    }
}

/// Per-type count of entries the control surface has not acknowledged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Unseen {
    pub event: u32,
    pub warn: u32,
    pub error: u32,
}

impl Unseen {
    pub fn get(&self, log_type: LogType) -> u32 {
        match log_type {
            LogType::Event => self.event,
            LogType::Warn => self.warn,
            LogType::Error => self.error,
        }
    }

    fn slot(&mut self, log_type: LogType) -> &mut u32 {
        match log_type {
            LogType::Event => &mut self.event,
            LogType::Warn => &mut self.warn,
            LogType::Error => &mut self.error,
        }
    }

    pub fn increment(&mut self, log_type: LogType) {
        let slot = self.slot(log_type);
        *slot = slot.saturating_add(1);
    }

    pub fn clear(&mut self, log_type: LogType) {
        *self.slot(log_type) = 0;
    }

    /// Keep the count within the number of retained entries
    pub fn clamp(&mut self, log_type: LogType, len: usize) {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        let slot = self.slot(log_type);
        *slot = (*slot).min(len);
    }

    pub fn total(&self) -> u32 {
        LogType::ALL.iter().map(|t| self.get(*t)).sum()
    }
}
