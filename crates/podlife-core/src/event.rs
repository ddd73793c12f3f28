//! # Raw Events
//!
//! [`RawEvent`] is the minimal view of a Kubernetes `core/v1` Event that the
//! classifier needs: the involved object's coordinates, the reason, and the
//! first-observed time. Everything else on the wire is ignored.
//!
//! `RawEvent` deserializes directly from the API server's JSON
//! representation. Missing fields decode as empty strings so that a partial
//! object still reaches the classifier, which decides whether it is usable.
//!
//! ## First-observed time
//!
//! Resolved in priority order, skipping absent or unparseable values:
//!
//! 1. `metadata.creationTimestamp` — when the API server stored the event.
//! 2. `firstTimestamp` — set by legacy event recorders.
//! 3. `eventTime` — set by `events.k8s.io/v1` recorders (microsecond time).
//!
//! `lastTimestamp` is deliberately not consulted: the timeline records when
//! a milestone first happened.

use serde::Deserialize;

use crate::temporal::Timestamp;

/// A delivered event notification, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "KubeEvent")]
pub struct RawEvent {
    /// `involvedObject.kind`, e.g. `Pod` or `Node`.
    pub involved_kind: String,
    /// `involvedObject.uid`.
    pub involved_uid: String,
    /// `involvedObject.namespace`.
    pub involved_namespace: String,
    /// `involvedObject.name`.
    pub involved_name: String,
    /// Machine-readable reason, e.g. `Scheduled`.
    pub reason: String,
    /// When the event was first observed, if any timestamp was usable.
    pub first_observed: Option<Timestamp>,
}

impl RawEvent {
    /// Shorthand for an event about a pod.
    pub fn pod(
        uid: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
        first_observed: Timestamp,
    ) -> Self {
        Self {
            involved_kind: "Pod".to_string(),
            involved_uid: uid.into(),
            involved_namespace: namespace.into(),
            involved_name: name.into(),
            reason: reason.into(),
            first_observed: Some(first_observed),
        }
    }
}

// -- Wire representation -----------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KubeEvent {
    #[serde(default)]
    metadata: KubeObjectMeta,
    #[serde(default)]
    involved_object: KubeObjectReference,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    first_timestamp: Option<String>,
    #[serde(default)]
    event_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KubeObjectMeta {
    #[serde(default)]
    creation_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KubeObjectReference {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<KubeEvent> for RawEvent {
    fn from(e: KubeEvent) -> Self {
        let first_observed = [
            e.metadata.creation_timestamp.as_deref(),
            e.first_timestamp.as_deref(),
            e.event_time.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find_map(|s| Timestamp::parse(s).ok());

        Self {
            involved_kind: e.involved_object.kind.unwrap_or_default(),
            involved_uid: e.involved_object.uid.unwrap_or_default(),
            involved_namespace: e.involved_object.namespace.unwrap_or_default(),
            involved_name: e.involved_object.name.unwrap_or_default(),
            reason: e.reason.unwrap_or_default(),
            first_observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_kubectl_event() {
        let wire = json!({
            "kind": "Event",
            "apiVersion": "v1",
            "metadata": {
                "name": "nginx-7c5ddbdf54-x2j9k.16f8a3c0e1b2d4a5",
                "namespace": "default",
                "creationTimestamp": "2021-06-01T08:30:15Z"
            },
            "involvedObject": {
                "kind": "Pod",
                "namespace": "default",
                "name": "nginx-7c5ddbdf54-x2j9k",
                "uid": "0b4e2f6a-52a1-4c0e-9d0e-2f1f5c1b7a11",
                "apiVersion": "v1"
            },
            "reason": "Scheduled",
            "message": "Successfully assigned default/nginx-7c5ddbdf54-x2j9k to node-1",
            "firstTimestamp": "2021-06-01T08:30:14Z",
            "lastTimestamp": "2021-06-01T08:35:00Z",
            "count": 1,
            "type": "Normal"
        });
        let event: RawEvent = serde_json::from_value(wire).unwrap();
        assert_eq!(event.involved_kind, "Pod");
        assert_eq!(event.involved_uid, "0b4e2f6a-52a1-4c0e-9d0e-2f1f5c1b7a11");
        assert_eq!(event.involved_namespace, "default");
        assert_eq!(event.involved_name, "nginx-7c5ddbdf54-x2j9k");
        assert_eq!(event.reason, "Scheduled");
        assert_eq!(
            event.first_observed.unwrap().to_rfc3339(),
            "2021-06-01T08:30:15Z"
        );
    }

    #[test]
    fn falls_back_to_first_timestamp_then_event_time() {
        let legacy: RawEvent = serde_json::from_value(json!({
            "involvedObject": {"kind": "Pod", "uid": "1"},
            "reason": "Pulling",
            "firstTimestamp": "2021-06-01T08:30:14Z",
            "lastTimestamp": "2021-06-01T08:40:00Z"
        }))
        .unwrap();
        assert_eq!(
            legacy.first_observed.unwrap().to_rfc3339(),
            "2021-06-01T08:30:14Z"
        );

        let modern: RawEvent = serde_json::from_value(json!({
            "involvedObject": {"kind": "Pod", "uid": "1"},
            "reason": "Pulling",
            "firstTimestamp": null,
            "eventTime": "2021-06-01T08:30:13.512345Z"
        }))
        .unwrap();
        assert_eq!(
            modern.first_observed.unwrap().to_rfc3339(),
            "2021-06-01T08:30:13Z"
        );
    }

    #[test]
    fn last_timestamp_is_never_used() {
        let event: RawEvent = serde_json::from_value(json!({
            "involvedObject": {"kind": "Pod", "uid": "1"},
            "reason": "Pulling",
            "lastTimestamp": "2021-06-01T08:40:00Z"
        }))
        .unwrap();
        assert_eq!(event.first_observed, None);
    }

    #[test]
    fn unparseable_timestamp_is_skipped() {
        let event: RawEvent = serde_json::from_value(json!({
            "metadata": {"creationTimestamp": "garbage"},
            "involvedObject": {"kind": "Pod", "uid": "1"},
            "reason": "Pulled",
            "firstTimestamp": "2021-06-01T08:30:14Z"
        }))
        .unwrap();
        assert_eq!(
            event.first_observed.unwrap().to_rfc3339(),
            "2021-06-01T08:30:14Z"
        );
    }

    #[test]
    fn partial_object_decodes_with_empty_fields() {
        let event: RawEvent = serde_json::from_value(json!({"reason": "Started"})).unwrap();
        assert_eq!(event.involved_kind, "");
        assert_eq!(event.involved_uid, "");
        assert_eq!(event.reason, "Started");
        assert_eq!(event.first_observed, None);
    }
}
