// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport envelopes.
//!
//! Every WebSocket text frame carries one envelope: either a data message
//! (`{t: "d", d: <message>}`) for the realtime protocol, or a control
//! message (`{t: "c", d: {t: <code>, d: <payload>}}`) for the transport.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Wire protocol version sent as `v` in the connection URL.
pub const PROTOCOL_VERSION: &str = "5";

/// Handshake payload sent by the server once a connection is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Server time in milliseconds since the epoch.
    #[serde(rename = "ts")]
    pub timestamp: u64,
    #[serde(rename = "v")]
    pub version: String,
    /// Host the client should use for subsequent connections.
    #[serde(rename = "h")]
    pub host: String,
    #[serde(rename = "s", default)]
    pub session_id: String,
}

/// Transport-level control messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Hello(Hello),
    /// Server is shutting the connection down and the client must not retry.
    Shutdown(String),
    /// Server asks the client to reconnect to another host.
    Reset(String),
    Error(String),
    Ping,
    Pong,
    EndTransmission,
}

impl Control {
    fn code(&self) -> &'static str {
        match self {
            Control::Hello(_) => "h",
            Control::Shutdown(_) => "s",
            Control::Reset(_) => "r",
            Control::Error(_) => "e",
            Control::Ping => "p",
            Control::Pong => "o",
            Control::EndTransmission => "n",
        }
    }

    fn decode(code: &str, payload: Value) -> Result<Self> {
        let text = |payload: Value| match payload {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        match code {
            "h" => Ok(Control::Hello(serde_json::from_value(payload)?)),
            "s" => Ok(Control::Shutdown(text(payload))),
            "r" => Ok(Control::Reset(text(payload))),
            "e" => Ok(Control::Error(text(payload))),
            "p" => Ok(Control::Ping),
            "o" => Ok(Control::Pong),
            "n" => Ok(Control::EndTransmission),
            other => Err(Error::MalformedFrame(format!("unknown control '{}'", other))),
        }
    }

    fn payload(&self) -> Value {
        match self {
            Control::Hello(hello) => serde_json::to_value(hello).unwrap_or(Value::Null),
            Control::Shutdown(s) | Control::Reset(s) | Control::Error(s) => Value::String(s.clone()),
            Control::Ping | Control::Pong | Control::EndTransmission => json!({}),
        }
    }
}

/// One transport frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Data(Value),
    Control(Control),
}

impl Envelope {
    pub fn from_value(value: Value) -> Result<Self> {
        let layer = value
            .get("t")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedFrame("missing layer".to_string()))?;
        match layer {
            "d" => Ok(Envelope::Data(value.get("d").cloned().unwrap_or(Value::Null))),
            "c" => {
                let inner = value
                    .get("d")
                    .ok_or_else(|| Error::MalformedFrame("missing control body".to_string()))?;
                let code = inner
                    .get("t")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::MalformedFrame("missing control code".to_string()))?;
                let payload = inner.get("d").cloned().unwrap_or(Value::Null);
                Ok(Envelope::Control(Control::decode(code, payload)?))
            }
            other => Err(Error::UnknownLayer(other.to_string())),
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Envelope::from_value(serde_json::from_str(s)?)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Envelope::Data(message) => json!({ "t": "d", "d": message }),
            Envelope::Control(control) => {
                json!({ "t": "c", "d": { "t": control.code(), "d": control.payload() } })
            }
        }
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
