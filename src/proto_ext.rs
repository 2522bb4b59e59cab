//! Conversions between queue types and their protobuf representation.

use tonic::Status;

use crate::proto::{self, internal_epistello};
use crate::queue::{Message, Operation, OperationKind, Payload};

impl From<Payload> for internal_epistello::Payload {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(data) => internal_epistello::Payload::Data(data),
            Payload::Bytes(data) => internal_epistello::Payload::BytesData(data),
        }
    }
}

impl From<Message> for proto::InternalEpistello {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            channel: message.channel,
            payload: Some(message.payload.into()),
            traceid: message.trace_id,
        }
    }
}

impl TryFrom<proto::InternalEpistello> for Message {
    type Error = Status;

    fn try_from(message: proto::InternalEpistello) -> Result<Self, Self::Error> {
        let payload = match message.payload {
            Some(internal_epistello::Payload::Data(data)) => Payload::Text(data),
            Some(internal_epistello::Payload::BytesData(data)) => Payload::Bytes(data),
            None => {
                return Err(Status::invalid_argument(format!(
                    "message {} has no payload",
                    message.id
                )))
            }
        };
        Ok(Self {
            id: message.id,
            channel: message.channel,
            payload,
            trace_id: message.traceid,
        })
    }
}

impl From<OperationKind> for proto::Operation {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Enqueue => proto::Operation::Enqueue,
            OperationKind::Dequeue => proto::Operation::Dequeue,
        }
    }
}

impl From<Operation> for proto::MessageUpdate {
    fn from(operation: Operation) -> Self {
        Self {
            operation: proto::Operation::from(operation.kind) as i32,
            message: Some(operation.message.into()),
        }
    }
}

impl TryFrom<proto::MessageUpdate> for Operation {
    type Error = Status;

    fn try_from(update: proto::MessageUpdate) -> Result<Self, Self::Error> {
        let kind = match proto::Operation::try_from(update.operation) {
            Ok(proto::Operation::Enqueue) => OperationKind::Enqueue,
            Ok(proto::Operation::Dequeue) => OperationKind::Dequeue,
            Err(_) => {
                return Err(Status::invalid_argument(format!(
                    "unknown operation {}",
                    update.operation
                )))
            }
        };
        let message = update
            .message
            .ok_or_else(|| Status::invalid_argument("update carries no message"))?
            .try_into()?;
        Ok(Self { kind, message })
    }
}
