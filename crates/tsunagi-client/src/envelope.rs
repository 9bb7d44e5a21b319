//! Wire envelopes.
//!
//! Every frame is one JSON text message. Outbound calls carry `_index`,
//! the endpoint `path` and `args`. Inbound frames with `_index` answer a
//! pending call; frames without it are broadcasts keyed by `action`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::FS_METHOD_PREFIX;
use crate::error::{ConnectionError, ConnectionResult};
use crate::events::ServerMessage;

const INDEX_KEY: &str = "_index";

/// Outbound request frame.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<'a> {
    #[serde(rename = "_index")]
    pub index: u64,
    pub path: String,
    pub args: &'a Value,
}

impl<'a> RequestEnvelope<'a> {
    pub fn new(index: u64, method: &str, args: &'a Value) -> Self {
        Self {
            index,
            path: endpoint_path(method),
            args,
        }
    }

    pub fn encode(&self) -> ConnectionResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Map a method name to its server endpoint.
///
/// `FS:read` → `/FS/read`, anything else `whoami` → `/API/whoami`.
pub fn endpoint_path(method: &str) -> String {
    match method.strip_prefix(FS_METHOD_PREFIX) {
        Some(rest) => format!("/FS/{rest}"),
        None => format!("/API/{method}"),
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Answer to the pending call with this index. `_index` is stripped.
    Response { index: u64, payload: Value },
    /// Unsolicited server message.
    Broadcast(ServerMessage),
    /// `_index` present but not an unsigned integer; cannot match anything.
    Unroutable(Value),
}

impl Inbound {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::Broadcast(ServerMessage::from_payload(value));
        };

        match map.remove(INDEX_KEY) {
            None => Self::Broadcast(ServerMessage::from_payload(Value::Object(map))),
            Some(Value::Null) => Self::Broadcast(ServerMessage::from_payload(Value::Object(map))),
            Some(index) => match index.as_u64() {
                Some(index) => Self::Response {
                    index,
                    payload: Value::Object(map),
                },
                None => {
                    map.insert(INDEX_KEY.to_string(), index);
                    Self::Unroutable(Value::Object(map))
                }
            },
        }
    }
}

/// Decode a `{error, result}` response payload.
///
/// A non-null, non-false `error` becomes [`ConnectionError::Remote`];
/// otherwise `result` is returned (null when absent).
pub fn into_result(payload: Value) -> ConnectionResult<Value> {
    let mut map = match payload {
        Value::Object(map) => map,
        other => return Ok(other),
    };

    match map.remove("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {}
        Some(Value::String(msg)) => return Err(ConnectionError::Remote(msg)),
        Some(other) => return Err(ConnectionError::Remote(other.to_string())),
    }

    Ok(map.remove("result").unwrap_or(Value::Null))
}

/// Build a response payload the way a server would.
pub fn response_payload(result: Result<Value, String>) -> Value {
    let mut map = Map::new();
    match result {
        Ok(result) => {
            map.insert("error".into(), Value::Null);
            map.insert("result".into(), result);
        }
        Err(error) => {
            map.insert("error".into(), Value::String(error));
            map.insert("result".into(), Value::Null);
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_path() {
        assert_eq!(endpoint_path("FS:scandir"), "/FS/scandir");
        assert_eq!(endpoint_path("login"), "/API/login");
        // Only a leading prefix is stripped
        assert_eq!(endpoint_path("xFS:read"), "/API/xFS:read");
    }

    #[test]
    fn test_request_envelope_encoding() {
        let args = json!({"path": "home:///a.txt"});
        let text = RequestEnvelope::new(7, "FS:read", &args).encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"_index": 7, "path": "/FS/read", "args": {"path": "home:///a.txt"}})
        );
    }

    #[test]
    fn test_decode_response_strips_index() {
        let inbound = Inbound::decode(r#"{"_index": 3, "error": null, "result": 42}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Response {
                index: 3,
                payload: json!({"error": null, "result": 42}),
            }
        );
    }

    #[test]
    fn test_decode_broadcast() {
        let inbound =
            Inbound::decode(r#"{"action": "vfs:watch", "args": {"event": "write"}}"#).unwrap();
        match inbound {
            Inbound::Broadcast(msg) => {
                assert_eq!(msg.action.as_deref(), Some("vfs:watch"));
                assert_eq!(msg.args, json!({"event": "write"}));
            }
            other => panic!("expected broadcast, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_unroutable_index() {
        let inbound = Inbound::decode(r#"{"_index": "seven"}"#).unwrap();
        assert!(matches!(inbound, Inbound::Unroutable(_)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Inbound::decode("not json").is_err());
    }

    #[test]
    fn test_into_result() {
        assert_eq!(into_result(json!({"error": null, "result": [1, 2]})).unwrap(), json!([1, 2]));
        assert_eq!(into_result(json!({"error": false})).unwrap(), Value::Null);

        let err = into_result(json!({"error": "nope", "result": null})).unwrap_err();
        assert!(matches!(err, ConnectionError::Remote(msg) if msg == "nope"));

        let err = into_result(json!({"error": {"code": 5}})).unwrap_err();
        assert!(matches!(err, ConnectionError::Remote(msg) if msg.contains("\"code\":5")));
    }

    #[test]
    fn test_response_payload_shape() {
        assert_eq!(into_result(response_payload(Ok(json!("ok")))).unwrap(), json!("ok"));
        assert!(into_result(response_payload(Err("bad".into()))).is_err());
    }
}
