//! Eupalinos - replicated multi-channel in-memory queue
//!
//! Producers enqueue text or binary messages onto named channels and
//! consumers dequeue them over gRPC. Every replica keeps a full copy of all
//! channels and forwards its own mutations to its peers on a best-effort
//! basis. Channel contents are periodically snapshotted to disk.

pub mod config;
pub mod grpc;
pub mod persistence;
pub mod proto_ext;
pub mod queue;
pub mod replication;
pub mod services;
pub mod stats;
pub mod transport;
pub mod utils;

pub mod proto {
    tonic::include_proto!("eupalinos");
}
