//! Structured-value codec
//!
//! The transport between contexts only carries plain JSON: objects, arrays
//! and scalars. Maps with arbitrary keys and sets are therefore tagged on the
//! wire:
//!
//! ```text
//! Map  -> { "dataType": "Map", "version": 1, "value": [[key, value], ...] }
//! Set  -> { "dataType": "Set", "version": 1, "value": [element, ...] }
//! ```
//!
//! Every tagged object is stamped with [`WIRE_VERSION`]. A tagged object
//! without a `version` is read as version 1; any other version is refused.
//!
//! Values are tagged where they are built ([`Structured::map`],
//! [`Structured::set`]); nothing is inferred from the shape of a plain value
//! on the way out. On the way in, [`decode`] rebuilds every tagged object it
//! finds, at any depth.
//!
//! A plain object must not carry a `dataType` key whose value is `"Map"` or
//! `"Set"`; such an object decodes as the tagged collection.

use serde_json::{Map as JsonMap, Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Version of the tagged wire layout
pub const WIRE_VERSION: u32 = 1;

pub const DATA_TYPE_KEY: &str = "dataType";
pub const VALUE_KEY: &str = "value";
pub const VERSION_KEY: &str = "version";
pub const MAP_TAG: &str = "Map";
pub const SET_TAG: &str = "Set";

/// Errors from decoding a tagged value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{tag} wrapper has a non-array value")]
    NotAnArray { tag: &'static str },

    #[error("Map entry {index} is not a [key, value] pair")]
    MalformedEntry { index: usize },

    #[error("{tag} wrapper has unsupported wire version {found}")]
    UnsupportedVersion { tag: &'static str, found: String },
}

/// A value tree that may contain ordered-unique-key maps and sets
///
/// `Map` keeps insertion order and unique keys; `Set` keeps insertion order
/// and unique members. Build them through [`Structured::map`] and
/// [`Structured::set`] so uniqueness holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Structured>),
    Object(BTreeMap<String, Structured>),
    Map(Vec<(Structured, Structured)>),
    Set(Vec<Structured>),
}

impl Structured {
    /// Build a map; a repeated key keeps its first position and takes the last value
    pub fn map(entries: impl IntoIterator<Item = (Structured, Structured)>) -> Self {
        let mut out: Vec<(Structured, Structured)> = Vec::new();
        for (key, value) in entries {
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key, value)),
            }
        }
        Self::Map(out)
    }

    /// Build a set; repeated members are dropped
    pub fn set(members: impl IntoIterator<Item = Structured>) -> Self {
        let mut out: Vec<Structured> = Vec::new();
        for member in members {
            if !out.contains(&member) {
                out.push(member);
            }
        }
        Self::Set(out)
    }

    pub fn object(fields: impl IntoIterator<Item = (String, Structured)>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    /// Lift a plain JSON value without interpreting any tags
    pub fn plain(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::plain).collect()),
            Value::Object(fields) => Self::Object(fields.iter().map(|(k, v)| (k.clone(), Self::plain(v))).collect()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[Structured]> {
        match self {
            Self::Set(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Structured, Structured)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Field of an object
    pub fn get(&self, key: &str) -> Option<&Structured> {
        match self {
            Self::Object(fields) => fields.get(key),
            _ => None,
        }
    }
}

impl From<&str> for Structured {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Structured {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Encode a structured value into transport-safe JSON
pub fn encode(value: &Structured) -> Value {
    match value {
        Structured::Null => Value::Null,
        Structured::Bool(b) => Value::Bool(*b),
        Structured::Number(n) => Value::Number(n.clone()),
        Structured::String(s) => Value::String(s.clone()),
        Structured::Array(items) => Value::Array(items.iter().map(encode).collect()),
        Structured::Object(fields) => Value::Object(fields.iter().map(|(k, v)| (k.clone(), encode(v))).collect()),
        Structured::Map(entries) => tagged(
            MAP_TAG,
            entries
                .iter()
                .map(|(k, v)| Value::Array(vec![encode(k), encode(v)]))
                .collect(),
        ),
        Structured::Set(members) => tagged(SET_TAG, members.iter().map(encode).collect()),
    }
}

fn tagged(tag: &str, items: Vec<Value>) -> Value {
    let mut object = JsonMap::new();
    object.insert(DATA_TYPE_KEY.to_string(), Value::String(tag.to_string()));
    object.insert(VERSION_KEY.to_string(), Value::from(WIRE_VERSION));
    object.insert(VALUE_KEY.to_string(), Value::Array(items));
    Value::Object(object)
}

/// Decode transport JSON, rebuilding every tagged map and set
pub fn decode(value: &Value) -> Result<Structured, CodecError> {
    match value {
        Value::Null => Ok(Structured::Null),
        Value::Bool(b) => Ok(Structured::Bool(*b)),
        Value::Number(n) => Ok(Structured::Number(n.clone())),
        Value::String(s) => Ok(Structured::String(s.clone())),
        Value::Array(items) => Ok(Structured::Array(items.iter().map(decode).collect::<Result<_, _>>()?)),
        Value::Object(fields) => match fields.get(DATA_TYPE_KEY).and_then(Value::as_str) {
            Some(MAP_TAG) => {
                check_version(MAP_TAG, fields.get(VERSION_KEY))?;
                decode_map(fields.get(VALUE_KEY))
            }
            Some(SET_TAG) => {
                check_version(SET_TAG, fields.get(VERSION_KEY))?;
                decode_set(fields.get(VALUE_KEY))
            }
            _ => Ok(Structured::Object(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), decode(v)?)))
                    .collect::<Result<_, CodecError>>()?,
            )),
        },
    }
}

fn check_version(tag: &'static str, version: Option<&Value>) -> Result<(), CodecError> {
    match version {
        None => Ok(()),
        Some(v) if v.as_u64() == Some(u64::from(WIRE_VERSION)) => Ok(()),
        Some(other) => Err(CodecError::UnsupportedVersion {
            tag,
            found: other.to_string(),
        }),
    }
}

fn decode_map(value: Option<&Value>) -> Result<Structured, CodecError> {
    let Some(Value::Array(entries)) = value else {
        return Err(CodecError::NotAnArray { tag: MAP_TAG });
    };
    let pairs = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Array(pair) if pair.len() == 2 => Ok((decode(&pair[0])?, decode(&pair[1])?)),
            _ => Err(CodecError::MalformedEntry { index }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Structured::map(pairs))
}

fn decode_set(value: Option<&Value>) -> Result<Structured, CodecError> {
    let Some(Value::Array(members)) = value else {
        return Err(CodecError::NotAnArray { tag: SET_TAG });
    };
    let members = members.iter().map(decode).collect::<Result<Vec<_>, _>>()?;
    Ok(Structured::set(members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_encode_set_and_map_shapes() {
        let value = Structured::object([
            ("tokens".to_string(), Structured::set(["a".into(), "b".into()])),
            (
                "perToken".to_string(),
                Structured::map([("a".into(), Structured::set(["P".into()]))]),
            ),
        ]);

        assert_eq!(
            encode(&value),
            json!({
                "tokens": {"dataType": "Set", "version": 1, "value": ["a", "b"]},
                "perToken": {
                    "dataType": "Map",
                    "version": 1,
                    "value": [["a", {"dataType": "Set", "version": 1, "value": ["P"]}]]
                }
            })
        );
    }

    #[test]
    fn test_decode_nested_set_of_maps() {
        let wire = json!({
            "dataType": "Set",
            "version": 1,
            "value": [{"dataType": "Map", "version": 1, "value": [[1, "one"], [2, "two"]]}]
        });
        let decoded = decode(&wire).unwrap();
        let members = decoded.as_set().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].as_map().unwrap().len(), 2);
        assert_eq!(encode(&decoded), wire);
    }

    #[test]
    fn test_decode_rejects_non_array_value() {
        let wire = json!({"dataType": "Map", "value": {"a": 1}});
        assert_eq!(decode(&wire), Err(CodecError::NotAnArray { tag: MAP_TAG }));

        let wire = json!({"outer": {"dataType": "Set"}});
        assert_eq!(decode(&wire), Err(CodecError::NotAnArray { tag: SET_TAG }));
    }

    #[test]
    fn test_version_checked_on_decode() {
        let unstamped = json!({"dataType": "Set", "value": ["a"]});
        assert_eq!(decode(&unstamped).unwrap(), Structured::set(["a".into()]));

        let future = json!({"dataType": "Set", "version": 2, "value": ["a"]});
        assert_eq!(
            decode(&future),
            Err(CodecError::UnsupportedVersion {
                tag: SET_TAG,
                found: "2".to_string()
            })
        );

        let nested = json!({"outer": {"dataType": "Map", "version": "1", "value": []}});
        assert!(matches!(decode(&nested), Err(CodecError::UnsupportedVersion { tag: MAP_TAG, .. })));
    }

    #[test]
    fn test_decode_rejects_bad_map_entry() {
        let wire = json!({"dataType": "Map", "value": [["k", 1], ["lonely"]]});
        assert_eq!(decode(&wire), Err(CodecError::MalformedEntry { index: 1 }));
    }

    #[test]
    fn test_other_data_type_is_plain_object() {
        let wire = json!({"dataType": "Date", "value": 12});
        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded.get("dataType").and_then(Structured::as_str), Some("Date"));
        assert_eq!(encode(&decoded), wire);
    }

    #[test]
    fn test_duplicate_members_collapse() {
        let wire = json!({"dataType": "Map", "value": [["k", 1], ["j", 2], ["k", 3]]});
        let decoded = decode(&wire).unwrap();
        assert_eq!(
            decoded,
            Structured::Map(vec![
                ("k".into(), Structured::Number(3.into())),
                ("j".into(), Structured::Number(2.into())),
            ])
        );

        let set = decode(&json!({"dataType": "Set", "value": ["x", "x", "y"]})).unwrap();
        assert_eq!(set.as_set().unwrap().len(), 2);
    }

    #[test]
    fn test_scalars_and_arrays_pass_through() {
        let wire = json!([1, "two", null, true, [3.5]]);
        assert_eq!(encode(&decode(&wire).unwrap()), wire);
        assert_eq!(decode(&wire).unwrap(), Structured::plain(&wire));
    }

    fn leaf() -> impl Strategy<Value = Structured> {
        prop_oneof![
            Just(Structured::Null),
            any::<bool>().prop_map(Structured::Bool),
            any::<i64>().prop_map(|n| Structured::Number(n.into())),
            "[a-zA-Z0-9 ]{0,8}".prop_map(Structured::String),
        ]
    }

    fn structured() -> impl Strategy<Value = Structured> {
        leaf().prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Structured::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner.clone(), 0..6).prop_map(Structured::Object),
                prop::collection::vec((inner.clone(), inner.clone()), 0..6).prop_map(Structured::map),
                prop::collection::vec(inner, 0..6).prop_map(Structured::set),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(value in structured()) {
            let wire = encode(&value);
            prop_assert_eq!(decode(&wire).unwrap(), value);
        }

        #[test]
        fn prop_encoded_form_survives_json_text(value in structured()) {
            let text = serde_json::to_string(&encode(&value)).unwrap();
            let wire: Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(decode(&wire).unwrap(), value);
        }
    }
}
