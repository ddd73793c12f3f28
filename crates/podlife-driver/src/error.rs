//! Event source errors.

use thiserror::Error;

/// Failure to obtain the next event from a source.
///
/// Decode failures affect one notification and the source keeps going.
/// Stream failures end the source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The input could not be opened or read.
    #[error("event input I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not a well-formed JSON stream. The source ends.
    #[error("invalid JSON in event stream: {0}")]
    Syntax(String),

    /// One JSON value was not a usable event object.
    #[error("undecodable event: {0}")]
    Decode(String),

    /// The watch reported an error envelope.
    #[error("watch error: {0}")]
    Watch(String),
}
