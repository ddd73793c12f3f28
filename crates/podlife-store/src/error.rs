//! Storage errors.

use podlife_core::PodUid;
use podlife_state::StateError;
use thiserror::Error;

use crate::backend::Revision;

/// Errors from the storage layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend could not be reached or timed out.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A save lost a race with another writer.
    #[error("concurrent update of pod {uid}: expected revision {expected}")]
    Conflict { uid: PodUid, expected: Revision },

    /// Conflicts persisted beyond the retry budget.
    #[error("gave up merging pod {uid} after {attempts} conflicting attempts")]
    RetriesExhausted { uid: PodUid, attempts: u32 },

    /// A persisted row could not be turned back into a record.
    #[error("stored record {uid:?} is corrupt: {reason}")]
    Corrupt { uid: String, reason: String },

    /// The record rejected the observation.
    #[error(transparent)]
    State(#[from] StateError),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether the caller may expect a later retry of the same merge to
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Conflict { .. } | Self::RetriesExhausted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid() -> PodUid {
        PodUid::new("42").unwrap()
    }

    #[test]
    fn retryable_classification() {
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(StoreError::Conflict {
            uid: uid(),
            expected: Revision::ABSENT
        }
        .is_retryable());
        assert!(StoreError::RetriesExhausted {
            uid: uid(),
            attempts: 5
        }
        .is_retryable());
        assert!(!StoreError::Database("syntax error".into()).is_retryable());
        assert!(!StoreError::Corrupt {
            uid: "42".into(),
            reason: "negative revision".into()
        }
        .is_retryable());
    }

    #[test]
    fn display_includes_pod() {
        let err = StoreError::RetriesExhausted {
            uid: uid(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "gave up merging pod 42 after 3 conflicting attempts"
        );
    }
}
