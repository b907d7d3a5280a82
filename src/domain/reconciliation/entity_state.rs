//! Entity snapshots and the shallow merge that maintains them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};

/// Identifies one tracked entity: its kind (event type) and id within that kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: String,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Shallow-merges `update` into `current`.
///
/// Every top-level key in `update` replaces the same key in `current`; keys
/// absent from `update` are kept. Nested objects are replaced wholesale, so
/// two sources touching different nested fields of one key can lose a change.
pub fn shallow_merge(
    current: &Map<String, JsonValue>,
    update: &Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    let mut next = current.clone();
    for (key, value) in update {
        next.insert(key.clone(), value.clone());
    }
    next
}

/// Last known authoritative snapshot of one entity.
///
/// Only the reconciler produces new snapshots; consumers receive clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub key: EntityKey,
    pub fields: Map<String, JsonValue>,
    /// Number of merges applied since the entity was first seen.
    pub version: u64,
    pub updated_at: Timestamp,
}

impl EntityState {
    /// An entity that has not received any update yet.
    pub fn empty(key: EntityKey) -> Self {
        Self {
            key,
            fields: Map::new(),
            version: 0,
            updated_at: Timestamp::now(),
        }
    }

    /// Returns the next snapshot after applying `delta`.
    pub fn merged(&self, delta: &Map<String, JsonValue>, at: Timestamp) -> Self {
        Self {
            key: self.key.clone(),
            fields: shallow_merge(&self.fields, delta),
            version: self.version + 1,
            updated_at: at,
        }
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    /// Snapshot fields as one JSON object.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.fields.clone())
    }

    /// Deserializes the snapshot into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        serde_json::from_value(self.to_json()).map_err(|e| {
            DomainError::new(
                ErrorCode::MalformedMessage,
                format!("cannot decode {} snapshot: {}", self.key, e),
            )
        })
    }
}
