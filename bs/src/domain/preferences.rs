//! User preferences consumed by the coordinator
//!
//! Preferences hold two sets and a map of sets, so they always travel in
//! the tagged wire form produced by [`crate::codec`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::codec::{self, CodecError, Structured};

const USER_SOURCE_KEY: &str = "useUsers";
const TOKEN_LIST_KEY: &str = "tokenList";
const SNIPE_LIST_KEY: &str = "snipeList";
const KAKERA_PER_TOKEN_KEY: &str = "kakeraPerToken";

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid preferences: {0}")]
    Shape(String),
}

/// Where the bot takes its user identities from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSource {
    /// The user logged into the page
    #[default]
    Session,
    /// An explicit credential list
    Tokens,
}

impl UserSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Tokens => "tokens",
        }
    }
}

/// Bot preferences
///
/// The serde derive is the plain form used by YAML files on disk; the wire
/// form is [`Preferences::to_wire`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub use_users: UserSource,
    pub token_list: BTreeSet<String>,
    pub snipe_list: BTreeSet<String>,
    pub kakera_per_token: BTreeMap<String, BTreeSet<String>>,
}

fn string_set(items: &BTreeSet<String>) -> Structured {
    Structured::set(items.iter().map(|s| Structured::from(s.as_str())))
}

impl Preferences {
    pub fn to_structured(&self) -> Structured {
        Structured::object([
            (USER_SOURCE_KEY.to_string(), Structured::from(self.use_users.as_str())),
            (TOKEN_LIST_KEY.to_string(), string_set(&self.token_list)),
            (SNIPE_LIST_KEY.to_string(), string_set(&self.snipe_list)),
            (
                KAKERA_PER_TOKEN_KEY.to_string(),
                Structured::map(
                    self.kakera_per_token
                        .iter()
                        .map(|(token, kinds)| (Structured::from(token.as_str()), string_set(kinds))),
                ),
            ),
        ])
    }

    /// Tagged JSON ready for the transport
    pub fn to_wire(&self) -> Value {
        codec::encode(&self.to_structured())
    }

    pub fn from_wire(value: &Value) -> Result<Self, PreferencesError> {
        Self::from_structured(&codec::decode(value)?)
    }

    /// Rebuild from a decoded tree; absent fields take defaults
    pub fn from_structured(value: &Structured) -> Result<Self, PreferencesError> {
        if !matches!(value, Structured::Object(_)) {
            return Err(PreferencesError::Shape("expected an object".to_string()));
        }

        let use_users = match value.get(USER_SOURCE_KEY) {
            None | Some(Structured::Null) => UserSource::default(),
            Some(Structured::String(s)) if s == "session" => UserSource::Session,
            Some(Structured::String(s)) if s == "tokens" => UserSource::Tokens,
            Some(other) => return Err(PreferencesError::Shape(format!("{}: {:?}", USER_SOURCE_KEY, other))),
        };

        let mut kakera_per_token = BTreeMap::new();
        match value.get(KAKERA_PER_TOKEN_KEY) {
            None | Some(Structured::Null) => {}
            Some(Structured::Map(entries)) => {
                for (token, kinds) in entries {
                    let token = token
                        .as_str()
                        .ok_or_else(|| PreferencesError::Shape(format!("{} key must be a string", KAKERA_PER_TOKEN_KEY)))?;
                    kakera_per_token.insert(token.to_string(), strings(KAKERA_PER_TOKEN_KEY, Some(kinds))?);
                }
            }
            Some(_) => {
                return Err(PreferencesError::Shape(format!("{} must be a Map", KAKERA_PER_TOKEN_KEY)));
            }
        }

        Ok(Self {
            use_users,
            token_list: strings(TOKEN_LIST_KEY, value.get(TOKEN_LIST_KEY))?,
            snipe_list: strings(SNIPE_LIST_KEY, value.get(SNIPE_LIST_KEY))?,
            kakera_per_token,
        })
    }
}

/// Collect a Set (or a plain array) of strings
fn strings(field: &str, value: Option<&Structured>) -> Result<BTreeSet<String>, PreferencesError> {
    let members = match value {
        None | Some(Structured::Null) => return Ok(BTreeSet::new()),
        Some(Structured::Set(members)) | Some(Structured::Array(members)) => members,
        Some(_) => return Err(PreferencesError::Shape(format!("{} must be a Set", field))),
    };
    members
        .iter()
        .map(|m| {
            m.as_str()
                .map(str::to_string)
                .ok_or_else(|| PreferencesError::Shape(format!("{} members must be strings", field)))
        })
        .collect()
}
