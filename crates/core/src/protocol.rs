// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime protocol messages exchanged inside data envelopes.
//!
//! The protocol is request/response with server pushes:
//! - Client sends `{r, a, b}`: a request number, an action code and a body
//! - Server answers `{r, b}` with the same request number
//! - Server pushes `{a, b}` for data updates and revocations
//! - Server reports an unrecoverable protocol violation as `{error}`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Monotonically increasing number correlating a response with its request.
pub type RequestId = u64;

/// A request sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    #[serde(rename = "r")]
    pub id: RequestId,
    #[serde(flatten)]
    pub action: Action,
}

impl Request {
    pub fn new(id: RequestId, action: Action) -> Self {
        Request { id, action }
    }

    /// Serializes the request to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a request from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Client actions, tagged on the wire by their action code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "a", content = "b")]
pub enum Action {
    /// Start listening at a path.
    #[serde(rename = "q")]
    Listen(ListenBody),
    /// Stop listening at a path.
    #[serde(rename = "n")]
    Unlisten(UnlistenBody),
    #[serde(rename = "p")]
    Put(WriteBody),
    #[serde(rename = "m")]
    Merge(WriteBody),
    #[serde(rename = "o")]
    OnDisconnectPut(OnDisconnectBody),
    #[serde(rename = "om")]
    OnDisconnectMerge(OnDisconnectBody),
    #[serde(rename = "oc")]
    OnDisconnectCancel(OnDisconnectBody),
    /// Authenticate with a JWT credential.
    #[serde(rename = "auth")]
    Auth(AuthBody),
    /// Authenticate with any other credential (legacy secrets, opaque tokens).
    #[serde(rename = "gauth")]
    GAuth(AuthBody),
    #[serde(rename = "unauth")]
    Unauth(Empty),
    /// Usage counters.
    #[serde(rename = "s")]
    Stats(StatsBody),
}

impl Action {
    /// The wire action code.
    pub fn code(&self) -> &'static str {
        match self {
            Action::Listen(_) => "q",
            Action::Unlisten(_) => "n",
            Action::Put(_) => "p",
            Action::Merge(_) => "m",
            Action::OnDisconnectPut(_) => "o",
            Action::OnDisconnectMerge(_) => "om",
            Action::OnDisconnectCancel(_) => "oc",
            Action::Auth(_) => "auth",
            Action::GAuth(_) => "gauth",
            Action::Unauth(_) => "unauth",
            Action::Stats(_) => "s",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenBody {
    #[serde(rename = "p")]
    pub path: String,
    /// Query object, only for non-default queries.
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<u64>,
    /// Hash of the locally cached data, letting the server send a delta.
    #[serde(rename = "h")]
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnlistenBody {
    #[serde(rename = "p")]
    pub path: String,
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriteBody {
    #[serde(rename = "p")]
    pub path: String,
    #[serde(rename = "d")]
    pub data: Value,
    /// Pre-image hash for compare-and-set writes.
    #[serde(rename = "h", default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnDisconnectBody {
    #[serde(rename = "p")]
    pub path: String,
    #[serde(rename = "d")]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthBody {
    pub cred: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noauth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authvar: Option<Value>,
}

/// A body with no fields, serialized as `{}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsBody {
    #[serde(rename = "c")]
    pub counters: BTreeMap<String, u64>,
}

/// Status string carried by every response body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    PermissionDenied,
    InvalidToken,
    /// Synthesized locally for writes whose session died before a response.
    Disconnect,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Ok => "ok",
            Status::PermissionDenied => "permission_denied",
            Status::InvalidToken => "invalid_token",
            Status::Disconnect => "disconnect",
            Status::Other(s) => s,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == Status::Ok
    }

    /// Statuses that mean the credential itself was rejected.
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, Status::InvalidToken | Status::PermissionDenied)
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s {
            "ok" => Status::Ok,
            "permission_denied" => Status::PermissionDenied,
            "invalid_token" => Status::InvalidToken,
            "disconnect" => Status::Disconnect,
            other => Status::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Status::from(s.as_str()))
    }
}

/// The body of a response: `{s: status, d: data}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: Status,
    pub data: Option<Value>,
}

impl Response {
    pub fn new(status: Status, data: Option<Value>) -> Self {
        Response { status, data }
    }

    /// Reads a response body, tolerating missing fields.
    pub fn from_body(body: &Value) -> Self {
        let status = match body.get("s") {
            Some(Value::String(s)) => Status::from(s.as_str()),
            _ => Status::Other(String::new()),
        };
        let data = body.get("d").filter(|d| !d.is_null()).cloned();
        Response { status, data }
    }

    /// Builds the full `{r, b}` message answering request `id`.
    pub fn to_message(&self, id: RequestId) -> Value {
        let mut body = Map::new();
        body.insert("s".into(), Value::String(self.status.as_str().to_string()));
        if let Some(data) = &self.data {
            body.insert("d".into(), data.clone());
        }
        serde_json::json!({ "r": id, "b": Value::Object(body) })
    }
}

/// Server-initiated events.
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    /// Overwrite of the data at `path`.
    Data { path: String, data: Value, tag: Option<u64> },
    /// Merge of children into the data at `path`.
    Merge { path: String, data: Value, tag: Option<u64> },
    /// The server dropped a listen, normally because access was revoked.
    ListenRevoked { path: String, query: Option<Value> },
    /// The server no longer accepts the session's credential.
    AuthRevoked { status: Status, explanation: Option<String> },
    /// Rule evaluation trace sent when security debugging is enabled.
    SecurityDebug(Value),
    /// An action code this client does not understand.
    Unknown { action: String, body: Value },
}

impl Push {
    /// Decodes a push from its action code and body.
    pub fn decode(action: &str, body: Value) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedPush {
            action: action.to_string(),
            reason: reason.to_string(),
        };
        match action {
            "d" | "m" => {
                let path = body.get("p").and_then(Value::as_str).ok_or_else(|| malformed("missing path"))?;
                let data = body.get("d").cloned().unwrap_or(Value::Null);
                let tag = body.get("t").and_then(Value::as_u64);
                let path = path.to_string();
                if action == "d" {
                    Ok(Push::Data { path, data, tag })
                } else {
                    Ok(Push::Merge { path, data, tag })
                }
            }
            "c" => {
                let path = body.get("p").and_then(Value::as_str).ok_or_else(|| malformed("missing path"))?;
                let query = body.get("q").filter(|q| !q.is_null()).cloned();
                Ok(Push::ListenRevoked { path: path.to_string(), query })
            }
            "ac" => {
                let status = body
                    .get("s")
                    .and_then(Value::as_str)
                    .map(Status::from)
                    .ok_or_else(|| malformed("missing status"))?;
                let explanation = body.get("d").and_then(Value::as_str).map(str::to_string);
                Ok(Push::AuthRevoked { status, explanation })
            }
            "sd" => Ok(Push::SecurityDebug(body)),
            other => Ok(Push::Unknown { action: other.to_string(), body }),
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Answer to the request with the same number. The body is decoded by the
    /// request's owner, see [`Response::from_body`].
    Response { id: RequestId, body: Value },
    Push(Push),
    /// Fatal protocol violation reported by the server.
    Error(String),
}

impl ServerMessage {
    /// Classifies a decoded data message.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(Error::MalformedMessage("expected a JSON object".to_string()));
        };

        if let Some(r) = obj.get("r") {
            let id = r
                .as_u64()
                .ok_or_else(|| Error::MalformedMessage(format!("invalid request number {}", r)))?;
            let body = obj.remove("b").unwrap_or(Value::Null);
            return Ok(ServerMessage::Response { id, body });
        }

        if let Some(error) = obj.get("error") {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(ServerMessage::Error(message));
        }

        if let Some(action) = obj.get("a") {
            let action = action
                .as_str()
                .ok_or_else(|| Error::MalformedMessage(format!("invalid action {}", action)))?
                .to_string();
            let body = obj.remove("b").unwrap_or(Value::Null);
            return Push::decode(&action, body).map(ServerMessage::Push);
        }

        Err(Error::MalformedMessage(format!(
            "no request number, error or action in {}",
            Value::Object(obj)
        )))
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        ServerMessage::from_value(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
