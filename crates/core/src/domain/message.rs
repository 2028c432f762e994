// Script Message Domain Model
//
// Messages arrive from the injected script as JSON objects carrying a `type`
// discriminator. Known kinds get their own variant, everything else is kept
// verbatim for inspection.

use serde_json::Value;

use super::error::{DomainError, Result};

/// Coarse message classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `send()` payload from the script
    Send,
    /// Uncaught runtime error reported by the instrumentation runtime
    Error,
    /// Anything else (`log`, future kinds, ...)
    Other,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Send => "send",
            MessageKind::Error => "error",
            MessageKind::Other => "other",
        }
    }
}

/// A single message received from the injected script
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptMessage {
    /// Informational data (`send(payload)`)
    Send { payload: Value },

    /// Runtime error raised inside the target
    Error {
        description: String,
        stack: Option<String>,
        file_name: Option<String>,
        line_number: Option<u64>,
    },

    /// Unrecognized message, kept raw
    Other(Value),
}

impl ScriptMessage {
    /// Parse a raw JSON line as delivered by the runtime
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw.trim())?;
        Self::from_value(value)
    }

    /// Classify an already-decoded message object
    ///
    /// # Errors
    /// - `DomainError::InvalidMessage` if the value is not an object or has no
    ///   string `type` field
    pub fn from_value(value: Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            DomainError::InvalidMessage(format!("expected a JSON object, got {}", value))
        })?;

        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::InvalidMessage("missing 'type' field".to_string()))?;

        match kind {
            "send" => Ok(ScriptMessage::Send {
                payload: obj.get("payload").cloned().unwrap_or(Value::Null),
            }),
            "error" => Ok(ScriptMessage::Error {
                description: obj
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                stack: non_empty_str(obj.get("stack")),
                file_name: non_empty_str(obj.get("fileName")),
                line_number: obj.get("lineNumber").and_then(Value::as_u64),
            }),
            _ => Ok(ScriptMessage::Other(value)),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ScriptMessage::Send { .. } => MessageKind::Send,
            ScriptMessage::Error { .. } => MessageKind::Error,
            ScriptMessage::Other(_) => MessageKind::Other,
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
