//! # Arena Client Library
//!
//! This library provides the client side of the wizard arena. The client never
//! decides anything about game state: it keeps an observer replica of every
//! entity, applies what the server pushes, and reports hits.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The replica of the arena:
//! - One observer copy per entity, the client's own marked local
//! - Field updates ordered by version, stale ones dropped
//! - Death, respawn and game-over reactions run per copy
//! - Full snapshots repair anything lost on the way
//!
//! ### Network Module (`network`)
//! Manages all client-server communication:
//! - UDP socket management and connection handling
//! - Packet serialization and deserialization
//! - Heartbeats that keep the connection alive
//! - Optional auto-fire at a random living opponent
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(
//!         "127.0.0.1:8080",
//!         Some("Merlin".to_string()),
//!         Some(Duration::from_millis(500)),
//!         0,
//!     )
//!     .await?;
//!
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
