//! Identifiers used throughout the dashboard model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a catalog or metadata object (insight, display form, date dataset...)
///
/// Two refs are equal only when they use the same addressing scheme. A uri ref and
/// an identifier ref pointing at the same object are different values; callers that
/// need cross-scheme matching must normalize through the catalog first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjRef {
    Uri(String),
    Identifier(String),
}

impl ObjRef {
    pub fn uri(uri: impl Into<String>) -> Self {
        ObjRef::Uri(uri.into())
    }

    pub fn id(identifier: impl Into<String>) -> Self {
        ObjRef::Identifier(identifier.into())
    }

    /// The raw uri or identifier string
    pub fn as_str(&self) -> &str {
        match self {
            ObjRef::Uri(s) | ObjRef::Identifier(s) => s,
        }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjRef::Uri(uri) => write!(f, "uri:{}", uri),
            ObjRef::Identifier(id) => write!(f, "id:{}", id),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Widget `localIdentifier`, unique across the whole dashboard
    LocalId
);

string_id!(
    /// Key under which detached layout nodes are stashed
    StashKey
);

string_id!(
    /// Dashboard tab identifier
    TabId
);

impl LocalId {
    /// Fresh random identifier, used when regenerating conflicting ids
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

string_id!(
    /// Attribute filter `localIdentifier` within a filter context
    FilterId
);

string_id!(
    /// Correlates a command with the events it produced
    CorrelationId
);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}
