//! RunState domain type
//!
//! The lifecycle phase of the page automation, as seen by every context.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Run state of the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No answer from the page yet
    #[default]
    Unknown,
    /// Page is open but the automation script is not injected
    WaitingInjection,
    /// Injection requested, waiting for acknowledgement
    Setup,
    /// Automation is active
    Running,
    /// Injected but paused
    Idle,
    /// The page refused or failed the injection
    InjectionError,
    /// Terminal for the session; recoverable only by toggling again
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown run state: {0}")]
pub struct UnknownRunState(pub String);

impl RunState {
    pub const ALL: [RunState; 7] = [
        RunState::Unknown,
        RunState::WaitingInjection,
        RunState::Setup,
        RunState::Running,
        RunState::Idle,
        RunState::InjectionError,
        RunState::Error,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::WaitingInjection => "waiting_injection",
            Self::Setup => "setup",
            Self::Running => "running",
            Self::Idle => "idle",
            Self::InjectionError => "injection_error",
            Self::Error => "error",
        }
    }

    /// Display label for the control surface
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::WaitingInjection => "Waiting",
            Self::Setup => "Setting up",
            Self::Running => "Running",
            Self::Idle => "Idle",
            Self::InjectionError => "Injection error",
            Self::Error => "Error",
        }
    }

    /// Static "cannot run" explanation, used when no dynamic reason is set
    pub fn static_reason(&self) -> Option<&'static str> {
        match self {
            Self::Unknown => Some("Bot state is unknown. Open or reload the page."),
            Self::WaitingInjection => Some("Waiting for the page to accept the bot."),
            Self::Setup => Some("Bot is being set up."),
            Self::Running | Self::Idle => None,
            Self::InjectionError => Some("The page could not inject the bot."),
            Self::Error => Some("The bot stopped after an error."),
        }
    }

    /// Whether the reason comes from the transition that produced this state
    pub fn has_dynamic_reason(&self) -> bool {
        matches!(
            self,
            Self::WaitingInjection | Self::Running | Self::Idle | Self::InjectionError | Self::Error
        )
    }

    /// States a toggle reply may settle in
    pub fn is_toggleable(&self) -> bool {
        matches!(self, Self::Running | Self::Idle)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunState {
    type Err = UnknownRunState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownRunState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for state in RunState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
            assert_eq!(state.as_str().parse::<RunState>().unwrap(), state);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_name() {
        let err = "paused".parse::<RunState>().unwrap_err();
        assert_eq!(err, UnknownRunState("paused".to_string()));
    }

    #[test]
    fn test_dynamic_reason_states() {
        assert!(!RunState::Unknown.has_dynamic_reason());
        assert!(!RunState::Setup.has_dynamic_reason());
        assert!(RunState::InjectionError.has_dynamic_reason());
        assert!(RunState::Running.static_reason().is_none());
    }
}
