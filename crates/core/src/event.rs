//! Watch event wire format: `{"type": "ADDED", "object": {...}}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Resource;

/// `dashboardError` value the backend sends when the watcher for one kind
/// died and is being restarted. The backend resends a full ADDED burst for
/// that kind once it is back, so the client drops its cache for the kind.
pub const REQUEST_RESTART_ERROR: &str = "RequestRestartError";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Added,
    Modified,
    Deleted,
    Error,
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
            EventType::Error => "ERROR",
            EventType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(Resource),
    Modified(Resource),
    Deleted(Resource),
    Error(ErrorPayload),
}

impl WatchEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            WatchEvent::Added(_) => EventType::Added,
            WatchEvent::Modified(_) => EventType::Modified,
            WatchEvent::Deleted(_) => EventType::Deleted,
            WatchEvent::Error(_) => EventType::Error,
        }
    }
}

/// Payload of an `ERROR` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPayload {
    /// The backend watcher for `kind` is restarting.
    RequestRestart { kind: String },
    /// Any other server-reported failure.
    Status { code: Option<String>, message: String },
}

impl ErrorPayload {
    /// Text shown in the UI error slot: `"<code> <message>"`, or just the
    /// message when no code was sent.
    pub fn display_message(&self) -> String {
        match self {
            ErrorPayload::RequestRestart { kind } => format!("{REQUEST_RESTART_ERROR} {kind}"),
            ErrorPayload::Status { code: Some(code), message } => format!("{code} {message}"),
            ErrorPayload::Status { code: None, message } => message.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid watch event: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {event_type} object: {source}")]
    Object {
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type", default)]
    event_type: Option<EventType>,
    #[serde(default)]
    object: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawError {
    #[serde(default)]
    dashboard_error: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl From<RawError> for ErrorPayload {
    fn from(raw: RawError) -> Self {
        if raw.dashboard_error.as_deref() == Some(REQUEST_RESTART_ERROR) {
            return ErrorPayload::RequestRestart { kind: raw.kind.unwrap_or_default() };
        }
        let code = match raw.code {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        ErrorPayload::Status { code, message: raw.message.unwrap_or_default() }
    }
}

/// Decode one SSE `data` payload.
///
/// Returns `Ok(None)` for events the client ignores: no `object`, or a
/// `type` outside ADDED/MODIFIED/DELETED/ERROR. Metadata fields that do not
/// parse are dropped; only a non-object `metadata` fails the event.
pub fn decode(data: &str) -> Result<Option<WatchEvent>, DecodeError> {
    let raw: RawEvent = serde_json::from_str(data)?;
    let (Some(event_type), Some(object)) = (raw.event_type, raw.object) else {
        return Ok(None);
    };
    let resource = |object: Value| {
        serde_json::from_value::<Resource>(object)
            .map_err(|source| DecodeError::Object { event_type, source })
    };
    let event = match event_type {
        EventType::Added => WatchEvent::Added(resource(object)?),
        EventType::Modified => WatchEvent::Modified(resource(object)?),
        EventType::Deleted => WatchEvent::Deleted(resource(object)?),
        EventType::Error => {
            let raw: RawError = serde_json::from_value(object)
                .map_err(|source| DecodeError::Object { event_type, source })?;
            WatchEvent::Error(raw.into())
        }
        EventType::Unknown => return Ok(None),
    };
    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kind;

    #[test]
    fn decodes_resource_events() {
        let ev = decode(r#"{"type":"ADDED","object":{"kind":"Pod","metadata":{"uid":"p1","name":"a"}}}"#)
            .unwrap()
            .unwrap();
        match ev {
            WatchEvent::Added(r) => {
                assert_eq!(r.typed_kind(), Some(Kind::Pod));
                assert_eq!(r.uid(), "p1");
            }
            other => panic!("unexpected {other:?}"),
        }

        let ev = decode(r#"{"type":"DELETED","object":{"kind":"Service","metadata":{"uid":"s1"}}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(ev.event_type(), EventType::Deleted);
    }

    #[test]
    fn decodes_restart_marker() {
        let ev = decode(r#"{"type":"ERROR","object":{"dashboardError":"RequestRestartError","type":"Pod"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(ev, WatchEvent::Error(ErrorPayload::RequestRestart { kind: "Pod".into() }));
    }

    #[test]
    fn decodes_status_errors() {
        let ev = decode(r#"{"type":"ERROR","object":{"code":403,"message":"forbidden"}}"#)
            .unwrap()
            .unwrap();
        let WatchEvent::Error(payload) = ev else { panic!("expected error") };
        assert_eq!(payload.display_message(), "403 forbidden");

        let ev = decode(r#"{"type":"ERROR","object":{"message":"boom"}}"#).unwrap().unwrap();
        let WatchEvent::Error(payload) = ev else { panic!("expected error") };
        assert_eq!(payload.display_message(), "boom");
    }

    #[test]
    fn other_dashboard_errors_are_status_errors() {
        let ev = decode(r#"{"type":"ERROR","object":{"dashboardError":"Other","type":"Pod","message":"x"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            ev,
            WatchEvent::Error(ErrorPayload::Status { code: None, message: "x".into() })
        );
    }

    #[test]
    fn ignores_events_without_object_or_known_type() {
        assert!(decode(r#"{"type":"ADDED"}"#).unwrap().is_none());
        assert!(decode(r#"{"type":"ADDED","object":null}"#).unwrap().is_none());
        assert!(decode(r#"{"type":"BOOKMARK","object":{"kind":"Pod"}}"#).unwrap().is_none());
        assert!(decode(r#"{"object":{"kind":"Pod"}}"#).unwrap().is_none());
    }

    #[test]
    fn bad_metadata_field_keeps_the_delete() {
        let ev = decode(
            r#"{"type":"DELETED","object":{"kind":"Pod","metadata":{"uid":"p1","name":"web","creationTimestamp":""}}}"#,
        )
        .unwrap()
        .unwrap();
        match ev {
            WatchEvent::Deleted(r) => assert_eq!(r.uid(), "p1"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(decode("not json"), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode(r#"{"type":"ADDED","object":{"kind":"Pod","metadata":"nope"}}"#),
            Err(DecodeError::Object { event_type: EventType::Added, .. })
        ));
    }
}
