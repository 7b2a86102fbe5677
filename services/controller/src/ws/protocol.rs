//! Defines the JSON message protocol spoken with the puppeting service.

use serde::Serialize;
use serde_json::{Map, Value};

/// Field whose presence in the handshake reply means the session is accepted.
pub const VERSION_ACK_FIELD: &str = "apiVersion";
/// Field of a command reply that must echo the request type.
pub const RESPONSE_TYPE_FIELD: &str = "responseType";
/// Field that carries the body of a reply, when the service nests it.
pub const DATA_FIELD: &str = "data";

/// First message on a fresh connection.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest<'a> {
    pub identity: &'a str,
    pub protocol_version: u32,
}

/// Returns true if `reply` is a JSON object carrying the version acknowledgment.
pub fn acknowledges_version(reply: &str) -> bool {
    serde_json::from_str::<Value>(reply)
        .ok()
        .and_then(|value| value.as_object().map(|obj| obj.contains_key(VERSION_ACK_FIELD)))
        .unwrap_or(false)
}

/// A named state change with ordered parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    pub name: String,
    pub parameters: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Map::new(),
        }
    }

    /// Adds a parameter; insertion order is kept on the wire.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Adds a parameter only when `value` is present.
    pub fn optional_param(self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    /// Serializes the command as a wire request.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&CommandRequest {
            request_type: &self.name,
            parameters: &self.parameters,
        })
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CommandRequest<'a> {
    request_type: &'a str,
    parameters: &'a Map<String, Value>,
}

/// A reply to a command.
///
/// Parsing is lenient: anything that is not a JSON object yields an empty
/// discriminator and payload, and the raw text is always kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub discriminator: String,
    pub payload: Map<String, Value>,
    pub raw: String,
}

impl Response {
    pub fn parse(raw: String) -> Self {
        let payload = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(obj)) => obj,
            _ => Map::new(),
        };
        let discriminator = payload
            .get(RESPONSE_TYPE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            discriminator,
            payload,
            raw,
        }
    }

    /// Returns true if this reply echoes `request_type`.
    pub fn answers(&self, request_type: &str) -> bool {
        self.discriminator == request_type
    }

    /// The reply body: the `data` object when present, else the whole payload.
    pub fn data(&self) -> &Map<String, Value> {
        match self.payload.get(DATA_FIELD) {
            Some(Value::Object(data)) => data,
            _ => &self.payload,
        }
    }

    /// Objects in the array stored under `field` in [`Response::data`].
    pub fn items<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
        self.data()
            .get(field)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }
}
