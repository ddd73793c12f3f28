//! # Event Sources
//!
//! An [`EventSource`] is a pull-based stream of raw event notifications.
//! The driver asks for the next event only when it is ready for it, and
//! stops asking on shutdown. `None` means the source is exhausted.
//!
//! Two implementations:
//!
//! - [`ChannelSource`]: events pushed by in-process code (tests, embedders
//!   running their own watch).
//! - [`JsonStreamSource`]: Kubernetes Event JSON read from a file or stdin.
//!   Accepts, in any mix:
//!   - a `List`/`EventList` object with `items` (`kubectl get events -o json`),
//!   - bare Event objects back to back (`kubectl get events -w -o json`),
//!   - watch envelopes `{"type": "ADDED", "object": {...}}` from the API.
//!     `DELETED` and `BOOKMARK` envelopes carry no new observation and are
//!     skipped; `ERROR` envelopes surface as [`SourceError::Watch`].

use std::future::Future;
use std::io::{BufReader, Read};
use std::path::Path;

use podlife_core::RawEvent;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::SourceError;

/// Events buffered between the reader thread and the driver.
const READ_AHEAD: usize = 64;

/// A pull-based stream of raw events.
pub trait EventSource: Send {
    /// The next notification, or `None` once the source is exhausted.
    ///
    /// Must be cancel-safe: dropping the returned future before it
    /// completes loses no event.
    fn next_event(&mut self) -> impl Future<Output = Option<Result<RawEvent, SourceError>>> + Send;
}

/// Source fed through a tokio channel.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<RawEvent>,
}

impl ChannelSource {
    /// A source and the sender that feeds it. The source ends once every
    /// sender is dropped and the buffer is drained.
    pub fn channel(capacity: usize) -> (mpsc::Sender<RawEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }

    /// A finite source that yields `events` in order.
    pub fn from_events(events: impl IntoIterator<Item = RawEvent>) -> Self {
        let events: Vec<_> = events.into_iter().collect();
        let (tx, source) = Self::channel(events.len());
        for event in events {
            // Capacity equals the event count and the receiver is alive.
            let _ = tx.try_send(event);
        }
        source
    }
}

impl EventSource for ChannelSource {
    async fn next_event(&mut self) -> Option<Result<RawEvent, SourceError>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Source decoding Kubernetes Event JSON from a byte stream.
///
/// Parsing runs on a dedicated OS thread so a blocked read (an idle
/// `stdin` pipe, say) never stalls the async runtime or keeps it alive at
/// shutdown.
#[derive(Debug)]
pub struct JsonStreamSource {
    rx: mpsc::Receiver<Result<RawEvent, SourceError>>,
}

impl JsonStreamSource {
    /// Start decoding `reader` in the background.
    pub fn new<R: Read + Send + 'static>(reader: R) -> Result<Self, SourceError> {
        let (tx, rx) = mpsc::channel(READ_AHEAD);
        std::thread::Builder::new()
            .name("podlife-reader".into())
            .spawn(move || read_stream(reader, &tx))?;
        Ok(Self { rx })
    }

    /// Decode events from the file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::new(file)
    }

    /// Decode events from standard input.
    pub fn stdin() -> Result<Self, SourceError> {
        Self::new(std::io::stdin())
    }
}

impl EventSource for JsonStreamSource {
    async fn next_event(&mut self) -> Option<Result<RawEvent, SourceError>> {
        self.rx.recv().await
    }
}

/// Reader-thread body. Returns when input ends, on a syntax error, or when
/// the receiving side is dropped.
fn read_stream<R: Read>(reader: R, tx: &mpsc::Sender<Result<RawEvent, SourceError>>) {
    let values =
        serde_json::Deserializer::from_reader(BufReader::new(reader)).into_iter::<Value>();
    for value in values {
        let value = match value {
            Ok(value) => value,
            Err(e) => {
                let _ = tx.blocking_send(Err(SourceError::Syntax(e.to_string())));
                return;
            }
        };
        for item in decode_value(value) {
            if tx.blocking_send(item).is_err() {
                return;
            }
        }
    }
}

/// Expand one top-level JSON value into the notifications it carries.
fn decode_value(value: Value) -> Vec<Result<RawEvent, SourceError>> {
    let Value::Object(mut object) = value else {
        return vec![Err(SourceError::Decode(format!(
            "expected a JSON object, found {}",
            json_type(&value)
        )))];
    };

    if let Some(Value::Array(items)) = object.remove("items") {
        return items.into_iter().flat_map(decode_value).collect();
    }

    if let (Some(Value::String(kind)), Some(inner)) = (object.get("type"), object.get("object")) {
        return match kind.as_str() {
            "DELETED" | "BOOKMARK" => Vec::new(),
            "ERROR" => vec![Err(SourceError::Watch(watch_error_message(inner)))],
            _ => decode_value(inner.clone()),
        };
    }

    vec![decode_event(Value::Object(object))]
}

fn decode_event(value: Value) -> Result<RawEvent, SourceError> {
    serde_json::from_value(value).map_err(|e| SourceError::Decode(e.to_string()))
}

fn watch_error_message(status: &Value) -> String {
    status
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unspecified watch error")
        .to_string()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
