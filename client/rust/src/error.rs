//! Error types for the Eupalinos client library.

use tonic::{Code, Status};

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish connection to the server.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Transport-level error from tonic.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// gRPC error from the server.
    #[error("grpc error: {0}")]
    Grpc(Box<Status>),

    /// Server replied with something the client cannot represent.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<Status> for ClientError {
    fn from(status: Status) -> Self {
        ClientError::Grpc(Box::new(status))
    }
}

impl ClientError {
    /// Returns the error message.
    pub fn message(&self) -> String {
        match self {
            ClientError::Connection(msg) => msg.clone(),
            ClientError::Transport(e) => e.to_string(),
            ClientError::Grpc(s) => s.message().to_string(),
            ClientError::InvalidResponse(msg) => msg.clone(),
        }
    }

    /// Returns the gRPC status code if this is a gRPC error.
    pub fn code(&self) -> Option<Code> {
        match self {
            ClientError::Grpc(s) => Some(s.code()),
            _ => None,
        }
    }

    /// Returns the underlying gRPC Status if this is a gRPC error.
    pub fn status(&self) -> Option<&Status> {
        match self {
            ClientError::Grpc(s) => Some(s),
            _ => None,
        }
    }

    /// The channel was never created on the server.
    pub fn is_channel_not_found(&self) -> bool {
        matches!(self.code(), Some(Code::NotFound))
    }

    /// The channel exists but holds no pending messages.
    pub fn is_queue_empty(&self) -> bool {
        matches!(self.code(), Some(Code::FailedPrecondition))
    }

    /// The pending message was enqueued with the other payload variant.
    pub fn is_payload_mismatch(&self) -> bool {
        matches!(self.code(), Some(Code::InvalidArgument))
    }

    /// Returns true if this is a connection or transport error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ClientError::Connection(_) | ClientError::Transport(_))
            || matches!(self.code(), Some(Code::Unavailable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ClientError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "connection failed: refused");
        assert_eq!(err.message(), "refused");
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_grpc_error_from_status() {
        let err: ClientError = Status::not_found("channel 'orders' not found").into();
        assert!(matches!(err, ClientError::Grpc(_)));
        assert_eq!(err.code(), Some(Code::NotFound));
        assert_eq!(err.message(), "channel 'orders' not found");
        assert!(err.status().is_some());
    }

    #[test]
    fn test_queue_error_classification() {
        let not_found: ClientError = Status::not_found("x").into();
        let empty: ClientError = Status::failed_precondition("x").into();
        let mismatch: ClientError = Status::invalid_argument("x").into();

        assert!(not_found.is_channel_not_found() && !not_found.is_queue_empty());
        assert!(empty.is_queue_empty() && !empty.is_payload_mismatch());
        assert!(mismatch.is_payload_mismatch() && !mismatch.is_channel_not_found());
    }

    #[test]
    fn test_unavailable_is_connection_error() {
        let err: ClientError = Status::unavailable("down").into();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_invalid_response_has_no_code() {
        let err = ClientError::InvalidResponse("negative length".to_string());
        assert_eq!(err.to_string(), "invalid response: negative length");
        assert_eq!(err.code(), None);
        assert!(err.status().is_none());
    }
}
