//! Toolbar badge derived from unseen counters

use serde::{Deserialize, Serialize};

use crate::domain::{LogType, Unseen};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeColor {
    Event,
    Warn,
    Error,
}

impl BadgeColor {
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Event => "#4caf50",
            Self::Warn => "#ff9800",
            Self::Error => "#f44336",
        }
    }
}

impl From<LogType> for BadgeColor {
    fn from(log_type: LogType) -> Self {
        match log_type {
            LogType::Event => Self::Event,
            LogType::Warn => Self::Warn,
            LogType::Error => Self::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// Count as text; empty when nothing is unseen
    pub text: String,
    pub count: u32,
    pub color: BadgeColor,
}

impl Badge {
    /// Badge after a write to `changed`
    ///
    /// An outstanding error always wins. A new event does not hide an
    /// outstanding warning. Otherwise the color follows the changed type.
    pub fn compute(unseen: &Unseen, changed: LogType) -> Self {
        let count = unseen.total();
        let color = if unseen.error > 0 {
            BadgeColor::Error
        } else if changed == LogType::Event && unseen.warn > 0 {
            BadgeColor::Warn
        } else {
            changed.into()
        };
        Self {
            text: if count == 0 { String::new() } else { count.to_string() },
            count,
            color,
        }
    }
}
