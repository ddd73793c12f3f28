//! # Error Types
//!
//! Errors raised while constructing core values from untrusted input.
//! Classification itself never fails: malformed events are reported as a
//! [`Classification`](crate::Classification) variant, not as an error.

use thiserror::Error;

/// Error constructing a core value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The pod UID was empty or whitespace.
    #[error("pod uid must not be empty")]
    EmptyUid,

    /// A timestamp string could not be parsed.
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp {
        /// The offending input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A Unix epoch value is outside the representable range.
    #[error("unix timestamp out of range: {0}")]
    EpochOutOfRange(i64),
}
