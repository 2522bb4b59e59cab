//! Errors returned to queue callers.

use tonic::Status;

use super::message::PayloadKind;

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Registry-level failures. These are the only errors surfaced to RPC callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("message queue is empty: {0}")]
    QueueEmpty(String),

    #[error("no {requested} payload pending on channel '{channel}' (use {})", .requested.other().accessor())]
    PayloadTypeMismatch {
        channel: String,
        requested: PayloadKind,
    },
}

impl PayloadKind {
    fn other(self) -> PayloadKind {
        match self {
            PayloadKind::Text => PayloadKind::Bytes,
            PayloadKind::Bytes => PayloadKind::Text,
        }
    }
}

impl From<QueueError> for Status {
    fn from(err: QueueError) -> Self {
        match &err {
            QueueError::ChannelNotFound(_) => Status::not_found(err.to_string()),
            QueueError::QueueEmpty(_) => Status::failed_precondition(err.to_string()),
            QueueError::PayloadTypeMismatch { .. } => Status::invalid_argument(err.to_string()),
        }
    }
}
