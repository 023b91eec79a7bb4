//! Channel protocol frames (JSON, protocol version 1.0.0).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ChangeKind, ChannelSpec, PushEvent};
use crate::error::{ClientError, ClientResult};

pub const PHX_JOIN: &str = "phx_join";
pub const PHX_LEAVE: &str = "phx_leave";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";
pub const HEARTBEAT: &str = "heartbeat";
pub const POSTGRES_CHANGES: &str = "postgres_changes";
pub const PHOENIX_TOPIC: &str = "phoenix";
const TOPIC_PREFIX: &str = "realtime:";

/// One message on the realtime socket, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    pub fn new(
        topic: impl Into<String>,
        event: impl Into<String>,
        payload: Value,
        reference: Option<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            reference,
        }
    }

    #[must_use]
    pub fn heartbeat(reference: String) -> Self {
        Self::new(PHOENIX_TOPIC, HEARTBEAT, json!({}), Some(reference))
    }

    /// Join request for `spec`, authorised with `access_token`.
    #[must_use]
    pub fn join(spec: &ChannelSpec, access_token: &str, reference: String) -> Self {
        let mut change = json!({
            "event": spec.events.as_str(),
            "schema": spec.schema,
            "table": spec.table,
        });
        if let Some(filter) = &spec.filter {
            change["filter"] = Value::String(filter.to_string());
        }

        let payload = json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [change],
                "private": false,
            },
            "access_token": access_token,
        });
        Self::new(topic_for(spec), PHX_JOIN, payload, Some(reference))
    }

    #[must_use]
    pub fn leave(topic: impl Into<String>, reference: String) -> Self {
        Self::new(topic, PHX_LEAVE, json!({}), Some(reference))
    }

    /// `status` of a `phx_reply` frame, if this is one.
    #[must_use]
    pub fn reply_status(&self) -> Option<&str> {
        if self.event != PHX_REPLY {
            return None;
        }
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Human-readable reason attached to a non-`ok` reply.
    #[must_use]
    pub fn reply_reason(&self) -> String {
        let response = self.payload.get("response");
        response
            .and_then(|r| r.get("reason").or_else(|| r.get("message")))
            .and_then(Value::as_str)
            .map_or_else(
                || response.map_or_else(String::new, ToString::to_string),
                ToString::to_string,
            )
    }
}

/// Wire topic for a logical channel name.
#[must_use]
pub fn topic_for(spec: &ChannelSpec) -> String {
    format!("{TOPIC_PREFIX}{}", spec.topic)
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    table: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

/// Decodes the payload of a `postgres_changes` frame.
///
/// # Errors
/// [`ClientError::Decode`] when the payload does not have the expected shape.
pub fn decode_change(payload: &Value) -> ClientResult<PushEvent> {
    let ChangePayload { data } = serde_json::from_value(payload.clone())?;
    let kind = ChangeKind::try_from(data.kind.as_str())
        .map_err(|err| ClientError::Decode(format!("{err}: {}", data.kind)))?;
    let non_empty = |row: Option<Value>| {
        row.filter(|value| value.as_object().is_some_and(|map| !map.is_empty()))
    };

    Ok(PushEvent {
        table: data.table,
        kind,
        record: non_empty(data.record),
        old_record: non_empty(data.old_record),
    })
}
