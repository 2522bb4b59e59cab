//! Rust client for the Eupalinos replicated queue.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use eupalinos_client::QueueClient;
//!
//! async fn example() -> eupalinos_client::Result<()> {
//!     let client = QueueClient::connect("localhost:50060")?;
//!     if !client.wait_for_healthy().await {
//!         panic!("queue never became healthy");
//!     }
//!
//!     let id = client.enqueue("orders", "order-1").await?;
//!     let delivery = client.dequeue("orders").await?;
//!     assert_eq!(delivery.id, id);
//!     Ok(())
//! }
//! ```
//!
//! Dequeue order is unspecified: any pending message may be returned.

pub mod client;
pub mod error;

pub mod proto {
    tonic::include_proto!("eupalinos");
}

pub use client::{traced_request, Delivery, QueueClient, DEFAULT_ADDRESS, TRACING_KEY};
pub use error::{ClientError, Result};

#[cfg(test)]
mod tests;
