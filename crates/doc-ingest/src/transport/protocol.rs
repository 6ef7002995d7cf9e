//! Wire format of the worker command channel
//!
//! One JSON object per line. Requests carry a client-chosen `id` that the
//! worker echoes on the matching response:
//!
//! ```text
//! {"id":1,"command":{"cmd":"start_ingestion","payload":{"id":7,"title":"..."}}}
//! {"id":1,"response":{"documentId":7,"status":"PROCESSING","message":"Ingestion started"}}
//! {"id":2,"command":{"cmd":"get_status","payload":7}}
//! {"id":2,"err":"..."}
//! ```

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::DocumentSnapshot;

/// Commands understood by the worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", content = "payload", rename_all = "snake_case")]
pub enum Command {
    StartIngestion(DocumentSnapshot),
    GetStatus(i64),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartIngestion(_) => "start_ingestion",
            Self::GetStatus(_) => "get_status",
        }
    }
}

/// Request line sent to the worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestFrame {
    pub id: u64,
    pub command: Command,
}

/// Response line sent back by the worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl ResponseFrame {
    pub fn ok(id: u64, response: Value) -> Self {
        Self {
            id,
            response: Some(response),
            err: None,
        }
    }

    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            response: None,
            err: Some(message.into()),
        }
    }

    /// Payload of a successful response; worker-side errors become `Error::Transport`
    pub fn into_result(self) -> Result<Value> {
        match (self.response, self.err) {
            (_, Some(err)) => Err(Error::transport(err)),
            (Some(response), None) => Ok(response),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Serialize a frame as a single newline-terminated line
pub fn encode_line<T: Serialize>(frame: &T) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    Ok(line)
}

/// Decode a response payload into its typed form
pub fn decode_payload<T: DeserializeOwned>(command: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| Error::transport(format!("Malformed {} response: {}", command, e)))
}

/// Best-effort extraction of the request id from a line that failed to parse
pub fn salvage_id(line: &str) -> Option<u64> {
    serde_json::from_str::<Value>(line)
        .ok()?
        .get("id")?
        .as_u64()
}
