//! Client for the Quadrille location store.
//!
//! Quadrille is a clustered, line-oriented request/response service with
//! an elected leader. This crate implements the client-side transport:
//! membership resolution from a seed list, concurrent leader location, a
//! fixed-size pool of long-lived connections, request-id sequencing with
//! concurrent response demultiplexing, and pool-wide failure recovery
//! with exponential backoff. Typed operations (get, insert, update,
//! delete, neighbors, bulk writes) sit on top of a single `submit` call.
//!
//! ```rust,no_run
//! use quadrille_client::QuadrilleClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = QuadrilleClient::connect("localhost:5679").await?;
//! let location = client.get("loc123").await?;
//! println!("{},{}", location.latitude, location.longitude);
//! client.close().await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bulk;
mod client;
mod discovery;
mod error;
mod pending;
mod pool;
mod protocol;
mod types;

pub use bulk::{BulkOperation, BulkWrite};
pub use client::{ClientConfig, QuadrilleClient};
pub use error::{ClientError, Result};
pub use types::{Location, Neighbor};
