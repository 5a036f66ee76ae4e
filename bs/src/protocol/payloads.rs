//! Typed payloads carried in envelope `data`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::PageId;
use crate::domain::{LogType, RunState};

/// Run state as mirrored by the control surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStateView {
    pub state: RunState,
    pub label: String,
    /// "Cannot run" explanation, when the state carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Per-user status reported by the page, still in tagged wire form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_status: Option<Value>,
}

/// Plain acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearUnseenRequest {
    #[serde(rename = "type")]
    pub log_type: LogType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageHello {
    #[serde(default)]
    pub page_id: Option<PageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarnReport {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    #[serde(default)]
    pub is_critical: bool,
}

/// One page that a broadcast relay could not reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayFailure {
    pub page_id: PageId,
    pub error: String,
}

/// Outcome of sending one payload to every connected page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayReport {
    pub delivered: Vec<PageId>,
    pub failures: Vec<RelayFailure>,
}

impl RelayReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_state_view_omits_empty_fields() {
        let view = RunStateView {
            state: RunState::Idle,
            label: "Idle".to_string(),
            reason: None,
            user_status: None,
        };
        assert_eq!(serde_json::to_value(&view).unwrap(), json!({"state": "idle", "label": "Idle"}));
    }

    #[test]
    fn test_clear_unseen_request_shape() {
        let req: ClearUnseenRequest = serde_json::from_value(json!({"type": "warn"})).unwrap();
        assert_eq!(req.log_type, LogType::Warn);
        assert!(serde_json::from_value::<ClearUnseenRequest>(json!({"type": "debug"})).is_err());
    }

    #[test]
    fn test_error_report_defaults_to_non_critical() {
        let report: ErrorReport = serde_json::from_value(json!({"message": "oops"})).unwrap();
        assert!(!report.is_critical);
    }

    #[test]
    fn test_page_hello_optional_id() {
        let hello: PageHello = serde_json::from_value(json!({})).unwrap();
        assert!(hello.page_id.is_none());
        let hello: PageHello = serde_json::from_value(json!({"pageId": "tab-2"})).unwrap();
        assert_eq!(hello.page_id, Some(PageId::new("tab-2")));
    }
}
