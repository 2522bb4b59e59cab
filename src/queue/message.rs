//! Queue message and replication operation types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message payload, tagged by variant.
///
/// The dequeue accessor has to match the variant used at enqueue time.
/// In snapshots the variant becomes the field name (`data` or `bytes_data`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    #[serde(rename = "data")]
    Text(String),
    #[serde(rename = "bytes_data")]
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Text(_) => PayloadKind::Text,
            Payload::Bytes(_) => PayloadKind::Bytes,
        }
    }
}

/// Which accessor a caller used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Text,
    Bytes,
}

impl PayloadKind {
    /// Name of the RPC that reads this variant.
    pub fn accessor(self) -> &'static str {
        match self {
            PayloadKind::Text => "DequeueMessage",
            PayloadKind::Bytes => "DequeueMessageBytes",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Text => f.write_str("text"),
            PayloadKind::Bytes => f.write_str("bytes"),
        }
    }
}

/// A unit of work stored in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel: String,
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(default)]
    pub trace_id: String,
}

impl Message {
    /// Create a message with a freshly generated id.
    pub fn new(channel: impl Into<String>, payload: Payload, trace_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel: channel.into(),
            payload,
            trace_id: trace_id.into(),
        }
    }
}

/// Kind of replicated change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Enqueue,
    Dequeue,
}

/// Replication unit sent between replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub message: Message,
}

impl Operation {
    pub fn enqueue(message: Message) -> Self {
        Self {
            kind: OperationKind::Enqueue,
            message,
        }
    }

    pub fn dequeue(message: Message) -> Self {
        Self {
            kind: OperationKind::Dequeue,
            message,
        }
    }
}

/// Serde helper storing binary payloads as standard base64 strings.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
