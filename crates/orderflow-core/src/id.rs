//! Opaque identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for orders and feed events.
///
/// Callers must treat the contents as meaningless; equality is the only
/// supported operation. Fresh ids come from `orderflow_feed::generate_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueId(String);

/// Orders are identified by the same opaque id type as every other record.
pub type OrderId = OpaqueId;

impl OpaqueId {
    /// Wrap an existing string (ids received from the presentation layer).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OpaqueId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl From<&str> for OpaqueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OpaqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
