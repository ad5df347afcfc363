//! WebSocket Protocol Types
//!
//! Client → server: `{"command": ..., "payload": ..., "ack"?: ...}`
//! Server → client: `{"command": "streams" | "stream" | "ack", "payload": ...}`

use serde::Serialize;
use serde_json::{Map, Value};

/// Opaque session id supplied by the client in the `uuid` query parameter.
pub type ClientId = String;

/// Why an inbound text frame was dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("not valid JSON: {0}")]
    Json(String),

    #[error("envelope is not an object")]
    NotAnObject,

    #[error("envelope is missing `{0}`")]
    MissingKey(&'static str),

    #[error("invalid {command} payload: {reason}")]
    InvalidPayload {
        command: &'static str,
        reason: &'static str,
    },
}

/// A decoded envelope whose command has not been interpreted yet.
///
/// Splitting decode from interpretation lets the dispatcher answer the ack
/// before a bad payload is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope {
    command: Value,
    payload: Value,
    ack: Option<Value>,
}

impl RawEnvelope {
    /// Decode a text frame. Both `command` and `payload` must be present
    /// (`null` counts as present).
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Json(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        let command = object
            .remove("command")
            .ok_or(EnvelopeError::MissingKey("command"))?;
        let payload = object
            .remove("payload")
            .ok_or(EnvelopeError::MissingKey("payload"))?;
        let ack = object.remove("ack").filter(is_truthy);
        Ok(Self {
            command,
            payload,
            ack,
        })
    }

    /// The ack token to echo back, if the client asked for one.
    pub fn ack(&self) -> Option<&Value> {
        self.ack.as_ref()
    }

    /// Interpret the command and its payload.
    pub fn into_command(self) -> Result<ClientCommand, EnvelopeError> {
        let name = match self.command {
            Value::String(name) => name,
            other => return Ok(ClientCommand::Unknown(other.to_string())),
        };
        match name.as_str() {
            "subscribe" => topic_payload("subscribe", self.payload).map(ClientCommand::Subscribe),
            "unsubscribe" => {
                topic_payload("unsubscribe", self.payload).map(ClientCommand::Unsubscribe)
            }
            "publish" => Publish::from_payload(self.payload).map(ClientCommand::Publish),
            "sync" => Ok(ClientCommand::Sync),
            _ => Ok(ClientCommand::Unknown(name)),
        }
    }
}

fn topic_payload(command: &'static str, payload: Value) -> Result<String, EnvelopeError> {
    match payload {
        Value::String(topic) => Ok(topic),
        _ => Err(EnvelopeError::InvalidPayload {
            command,
            reason: "topic must be a string",
        }),
    }
}

/// Commands a client may send
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Subscribe(String),
    Unsubscribe(String),
    Publish(Publish),
    /// Reserved; accepted and ignored
    Sync,
    Unknown(String),
}

/// A client-originated publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Publish {
    pub name: String,
    /// Timestamp string -> `{channel: value}`
    pub data: Map<String, Value>,
    pub meta: Value,
    /// The payload exactly as received, relayed verbatim to subscribers
    pub raw: Value,
}

impl Publish {
    pub fn from_payload(payload: Value) -> Result<Self, EnvelopeError> {
        let invalid = |reason| EnvelopeError::InvalidPayload {
            command: "publish",
            reason,
        };
        let Value::Object(object) = &payload else {
            return Err(invalid("payload must be an object"));
        };
        let name = match object.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => return Err(invalid("`name` must be a string")),
        };
        let data = match object.get("data") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(data)) => data.clone(),
            Some(_) => return Err(invalid("`data` must be an object")),
        };
        let meta = object.get("meta").cloned().unwrap_or(Value::Null);
        Ok(Self {
            name,
            data,
            meta,
            raw: payload,
        })
    }

    /// Channel names derived from the first data record (empty if no data).
    pub fn channels(&self) -> Vec<String> {
        match self.data.values().next() {
            Some(Value::Object(record)) => record.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// Commands the server sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerCommand {
    /// Full topic -> channels mapping
    Streams,
    /// Relay of a publish to a topic's subscribers
    Stream,
    /// Echo of a client-supplied ack token
    Ack,
}

#[derive(Serialize)]
struct ServerEnvelope<'a> {
    command: ServerCommand,
    payload: &'a Value,
}

/// Serialize a server envelope once, ready to fan out as a text frame.
pub fn encode_server_message(
    command: ServerCommand,
    payload: &Value,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerEnvelope { command, payload })
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
