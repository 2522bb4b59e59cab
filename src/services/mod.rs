//! gRPC service implementations.

pub mod queue;

pub use queue::{trace_id_from, EupalinosService, TRACING_KEY};
