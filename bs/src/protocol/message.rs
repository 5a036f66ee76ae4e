//! Envelope, registry and sender identity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors from reading an inbound payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("message id is not a string")]
    InvalidId,

    #[error("unknown message id: {0}")]
    UnknownId(String),

    #[error("{id} not accepted from {sender}")]
    WrongDirection { id: MessageId, sender: String },

    #[error("malformed data for {id}: {reason}")]
    MalformedData { id: MessageId, reason: String },
}

/// Identifier of a page context
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a page that did not name itself
    pub fn generate() -> Self {
        Self(format!("page-{}", uuid::Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who sent an inbound message, as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sender {
    /// The control surface
    Surface,
    /// An injected page script
    Page {
        #[serde(rename = "pageId")]
        page_id: PageId,
    },
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Surface => write!(f, "surface"),
            Self::Page { page_id } => write!(f, "page {}", page_id),
        }
    }
}

/// Which way a message travels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Control surface -> coordinator
    SurfaceRequest,
    /// Page script -> coordinator
    PageRequest,
    /// Coordinator -> page or control surface
    CoordinatorPush,
}

impl Direction {
    /// Whether the coordinator accepts this direction from `sender`
    pub fn accepts(&self, sender: &Sender) -> bool {
        matches!(
            (self, sender),
            (Direction::SurfaceRequest, Sender::Surface) | (Direction::PageRequest, Sender::Page { .. })
        )
    }
}

/// The closed registry of message ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageId {
    #[serde(rename = "surface.get_run_state")]
    SurfaceGetRunState,
    #[serde(rename = "surface.refresh_state")]
    SurfaceRefreshState,
    #[serde(rename = "surface.run")]
    SurfaceRun,
    #[serde(rename = "surface.toggle")]
    SurfaceToggle,
    #[serde(rename = "surface.get_everything")]
    SurfaceGetEverything,
    #[serde(rename = "surface.clear_unseen")]
    SurfaceClearUnseen,
    #[serde(rename = "surface.reset_session")]
    SurfaceResetSession,
    #[serde(rename = "surface.sync_preferences")]
    SurfaceSyncPreferences,
    #[serde(rename = "surface.watch")]
    SurfaceWatch,

    #[serde(rename = "page.hello")]
    PageHello,
    #[serde(rename = "page.event")]
    PageEvent,
    #[serde(rename = "page.warn")]
    PageWarn,
    #[serde(rename = "page.error")]
    PageError,

    #[serde(rename = "bot.status_query")]
    BotStatusQuery,
    #[serde(rename = "bot.inject")]
    BotInject,
    #[serde(rename = "bot.toggle")]
    BotToggle,
    #[serde(rename = "bot.sync_preferences")]
    BotSyncPreferences,
    #[serde(rename = "bot.run_state")]
    BotRunState,
    #[serde(rename = "bot.badge")]
    BotBadge,
}

impl MessageId {
    pub const ALL: [MessageId; 19] = [
        MessageId::SurfaceGetRunState,
        MessageId::SurfaceRefreshState,
        MessageId::SurfaceRun,
        MessageId::SurfaceToggle,
        MessageId::SurfaceGetEverything,
        MessageId::SurfaceClearUnseen,
        MessageId::SurfaceResetSession,
        MessageId::SurfaceSyncPreferences,
        MessageId::SurfaceWatch,
        MessageId::PageHello,
        MessageId::PageEvent,
        MessageId::PageWarn,
        MessageId::PageError,
        MessageId::BotStatusQuery,
        MessageId::BotInject,
        MessageId::BotToggle,
        MessageId::BotSyncPreferences,
        MessageId::BotRunState,
        MessageId::BotBadge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SurfaceGetRunState => "surface.get_run_state",
            Self::SurfaceRefreshState => "surface.refresh_state",
            Self::SurfaceRun => "surface.run",
            Self::SurfaceToggle => "surface.toggle",
            Self::SurfaceGetEverything => "surface.get_everything",
            Self::SurfaceClearUnseen => "surface.clear_unseen",
            Self::SurfaceResetSession => "surface.reset_session",
            Self::SurfaceSyncPreferences => "surface.sync_preferences",
            Self::SurfaceWatch => "surface.watch",
            Self::PageHello => "page.hello",
            Self::PageEvent => "page.event",
            Self::PageWarn => "page.warn",
            Self::PageError => "page.error",
            Self::BotStatusQuery => "bot.status_query",
            Self::BotInject => "bot.inject",
            Self::BotToggle => "bot.toggle",
            Self::BotSyncPreferences => "bot.sync_preferences",
            Self::BotRunState => "bot.run_state",
            Self::BotBadge => "bot.badge",
        }
    }

    /// The single direction this id travels in
    pub fn direction(&self) -> Direction {
        match self {
            Self::SurfaceGetRunState
            | Self::SurfaceRefreshState
            | Self::SurfaceRun
            | Self::SurfaceToggle
            | Self::SurfaceGetEverything
            | Self::SurfaceClearUnseen
            | Self::SurfaceResetSession
            | Self::SurfaceSyncPreferences
            | Self::SurfaceWatch => Direction::SurfaceRequest,
            Self::PageHello | Self::PageEvent | Self::PageWarn | Self::PageError => Direction::PageRequest,
            Self::BotStatusQuery
            | Self::BotInject
            | Self::BotToggle
            | Self::BotSyncPreferences
            | Self::BotRunState
            | Self::BotBadge => Direction::CoordinatorPush,
        }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownId(s.to_string()))
    }
}

/// A protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn new(id: MessageId) -> Self {
        Self { id, data: None }
    }

    pub fn with_data(id: MessageId, data: Value) -> Self {
        Self { id, data: Some(data) }
    }

    /// Read an inbound payload
    ///
    /// `Ok(None)` means the payload has no `id` and is not addressed to this
    /// protocol.
    pub fn parse(payload: &Value) -> Result<Option<Self>, ProtocolError> {
        let Some(raw_id) = payload.get("id") else {
            debug!("Envelope::parse: payload without id");
            return Ok(None);
        };
        let id = raw_id.as_str().ok_or(ProtocolError::InvalidId)?.parse::<MessageId>()?;
        let data = match payload.get("data") {
            None | Some(Value::Null) => None,
            Some(data) => Some(data.clone()),
        };
        Ok(Some(Self { id, data }))
    }

    /// Deserialize the data payload into a typed request
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.data.clone().unwrap_or(Value::Object(Map::new()))).map_err(|e| {
            ProtocolError::MalformedData {
                id: self.id,
                reason: e.to_string(),
            }
        })
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("id".to_string(), Value::String(self.id.as_str().to_string()));
        if let Some(data) = &self.data {
            object.insert("data".to_string(), data.clone());
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_names_match_serde() {
        for id in MessageId::ALL {
            let json = serde_json::to_value(id).unwrap();
            assert_eq!(json, json!(id.as_str()));
            assert_eq!(id.as_str().parse::<MessageId>().unwrap(), id);
        }
    }

    #[test]
    fn test_every_id_has_one_namespace_direction() {
        for id in MessageId::ALL {
            let expected = match id.as_str().split('.').next().unwrap() {
                "surface" => Direction::SurfaceRequest,
                "page" => Direction::PageRequest,
                "bot" => Direction::CoordinatorPush,
                other => panic!("unexpected namespace {}", other),
            };
            assert_eq!(id.direction(), expected);
        }
    }

    #[test]
    fn test_parse_without_id_is_not_for_us() {
        assert_eq!(Envelope::parse(&json!({"data": 1})), Ok(None));
        assert_eq!(Envelope::parse(&json!("hello")), Ok(None));
        assert_eq!(Envelope::parse(&json!(null)), Ok(None));
    }

    #[test]
    fn test_parse_unknown_id() {
        assert_eq!(
            Envelope::parse(&json!({"id": "surface.dance"})),
            Err(ProtocolError::UnknownId("surface.dance".to_string()))
        );
        assert_eq!(Envelope::parse(&json!({"id": 7})), Err(ProtocolError::InvalidId));
    }

    #[test]
    fn test_parse_and_serialize() {
        let env = Envelope::parse(&json!({"id": "page.warn", "data": {"message": "slow"}}))
            .unwrap()
            .unwrap();
        assert_eq!(env.id, MessageId::PageWarn);
        assert_eq!(env.to_value(), json!({"id": "page.warn", "data": {"message": "slow"}}));
        assert_eq!(serde_json::to_value(&env).unwrap(), env.to_value());
    }

    #[test]
    fn test_null_data_reads_as_absent() {
        let env = Envelope::parse(&json!({"id": "surface.toggle", "data": null}))
            .unwrap()
            .unwrap();
        assert!(env.data.is_none());
        assert_eq!(env.to_value(), json!({"id": "surface.toggle"}));
    }

    #[test]
    fn test_direction_accepts() {
        let page = Sender::Page {
            page_id: PageId::new("tab-1"),
        };
        assert!(Direction::SurfaceRequest.accepts(&Sender::Surface));
        assert!(!Direction::SurfaceRequest.accepts(&page));
        assert!(Direction::PageRequest.accepts(&page));
        assert!(!Direction::CoordinatorPush.accepts(&Sender::Surface));
        assert!(!Direction::CoordinatorPush.accepts(&page));
    }

    #[test]
    fn test_sender_wire_shape() {
        let page = Sender::Page {
            page_id: PageId::new("tab-9"),
        };
        assert_eq!(serde_json::to_value(&page).unwrap(), json!({"kind": "page", "pageId": "tab-9"}));
        assert_eq!(serde_json::to_value(Sender::Surface).unwrap(), json!({"kind": "surface"}));
    }

    #[test]
    fn test_data_as_reports_malformed() {
        let env = Envelope::with_data(MessageId::PageError, json!({"isCritical": true}));
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct NeedsMessage {
            message: String,
        }
        let err = env.data_as::<NeedsMessage>().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedData { id: MessageId::PageError, .. }));
    }
}
