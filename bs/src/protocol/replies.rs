//! Replies a page sends back to coordinator requests
//!
//! Pages are a separate context and may answer with anything. Each reply
//! type is a closed set of variants plus a `Malformed` fallback that keeps
//! the raw value for the error message.

use serde_json::Value;

use crate::domain::RunState;

/// Answer to `bot.status_query`
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReply {
    Report {
        run_state: RunState,
        last_error: Option<String>,
        user_status: Option<Value>,
    },
    /// `runState` was a string outside the enumeration
    Unrecognized(String),
    Malformed(Value),
}

impl StatusReply {
    pub fn parse(value: &Value) -> Self {
        let Some(raw) = value.get("runState").and_then(Value::as_str) else {
            return Self::Malformed(value.clone());
        };
        match raw.parse::<RunState>() {
            Ok(run_state) => Self::Report {
                run_state,
                last_error: value.get("lastError").and_then(Value::as_str).map(str::to_string),
                user_status: value.get("serializedUserStatus").filter(|v| !v.is_null()).cloned(),
            },
            Err(_) => Self::Unrecognized(raw.to_string()),
        }
    }
}

/// Answer to `bot.toggle`
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleReply {
    State(RunState),
    /// Explicit failure object `{ message }`
    Failure(String),
    Malformed(Value),
}

impl ToggleReply {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::String(s) => match s.parse::<RunState>() {
                Ok(state) => Self::State(state),
                Err(_) => Self::Malformed(value.clone()),
            },
            Value::Object(fields) => match fields.get("message").and_then(Value::as_str) {
                Some(message) => Self::Failure(message.to_string()),
                None => Self::Malformed(value.clone()),
            },
            _ => Self::Malformed(value.clone()),
        }
    }
}

/// Answer to `bot.inject`: nothing on success, an error string on failure
#[derive(Debug, Clone, PartialEq)]
pub enum InjectReply {
    Injected,
    Failed(String),
    Malformed(Value),
}

impl InjectReply {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Null => Self::Injected,
            Value::String(reason) => Self::Failed(reason.clone()),
            other => Self::Malformed(other.clone()),
        }
    }
}
