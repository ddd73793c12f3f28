//! # Pod Identity
//!
//! A pod timeline is keyed by the pod's cluster-unique UID. Namespace and
//! name travel alongside the UID for display, but they are not part of the
//! identity: two `PodIdentity` values with the same UID are equal even if
//! the pod was observed under a different name.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Cluster-unique pod identifier (`metadata.uid`).
///
/// Always non-empty. Kubernetes issues UUIDs here, but the value is treated
/// as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PodUid(String);

impl PodUid {
    /// Create a UID, rejecting empty or whitespace-only input.
    pub fn new(uid: impl Into<String>) -> Result<Self, CoreError> {
        let uid = uid.into();
        if uid.trim().is_empty() {
            return Err(CoreError::EmptyUid);
        }
        Ok(Self(uid))
    }

    /// Access the UID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PodUid {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PodUid> for String {
    fn from(uid: PodUid) -> Self {
        uid.0
    }
}

impl AsRef<str> for PodUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PodUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pod's identity plus its informational coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodIdentity {
    /// The identity key.
    pub uid: PodUid,
    /// Namespace the pod was last observed in.
    pub namespace: String,
    /// Name the pod was last observed under.
    pub name: String,
}

impl PodIdentity {
    /// Build an identity from a validated UID and display coordinates.
    pub fn new(uid: PodUid, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl PartialEq for PodIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for PodIdentity {}

impl Hash for PodIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

impl std::fmt::Display for PodIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pod:{}/{}({})", self.namespace, self.name, self.uid)
    }
}
