//! Event identity used for duplicate suppression.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::domain::foundation::Timestamp;

const SYNTHESIZED_PREFIX: &str = "syn:";

/// Stable identifier of one logical event.
///
/// Either carried on the wire (`id` field) or synthesized from a content
/// hash plus a timestamp when the producer did not supply one. Synthesized
/// identities only catch byte-identical redelivery at the same instant, so
/// they dedupe far less than embedded ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventIdentity(String);

impl EventIdentity {
    /// Wraps an identity supplied by the producer.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derives an identity from the payload content and an instant.
    pub fn synthesize(payload: &JsonValue, at: Timestamp) -> Self {
        let mut hasher = Sha256::new();
        // serde_json maps are ordered, so equal payloads serialize equally.
        hasher.update(payload.to_string().as_bytes());
        hasher.update(at.as_unix_millis().to_be_bytes());
        let digest = hasher.finalize();

        let mut out = String::with_capacity(SYNTHESIZED_PREFIX.len() + digest.len() * 2);
        out.push_str(SYNTHESIZED_PREFIX);
        for byte in digest.iter() {
            out.push_str(&format!("{:02x}", byte));
        }
        Self(out)
    }

    /// True when this identity was derived rather than carried on the wire.
    pub fn is_synthesized(&self) -> bool {
        self.0.starts_with(SYNTHESIZED_PREFIX)
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
