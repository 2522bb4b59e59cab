//! In-memory multi-channel queue.
//!
//! This module contains:
//! - `Message`, `Payload`, `Operation`: the data model
//! - `Channel`: a named set of pending messages with counters and a bounded
//!   notification buffer feeding replication
//! - `ChannelRegistry`: lazily created channels keyed by name
//! - `QueueService`: enqueue/dequeue/length/health over a single registry lock

mod channel;
mod error;
mod message;
mod registry;
mod service;

pub use channel::{
    Channel, ChannelCounters, ChannelStats, NotificationBuffer, PushOutcome,
    DEFAULT_NOTIFICATION_CAPACITY,
};
pub use error::{QueueError, Result};
pub use message::{Message, Operation, OperationKind, Payload, PayloadKind};
pub use registry::{ChannelFeed, ChannelRegistry};
pub use service::{Health, QueueOptions, QueueService};
