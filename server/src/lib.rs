//! # Arena Server Library
//!
//! This library provides the authoritative server for the wizard arena. It owns
//! the canonical state of every entity, applies damage, runs the death and
//! respawn cycle, decides matches, and pushes every change to the connected
//! clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! Health, names, colors and lifecycle state are only ever mutated here. The
//! shared crate's replicated fields reject writes on observer copies, so a
//! client cannot change another entity's state even through a modified build.
//!
//! ### Notifications
//! Every state change is queued as a packet in the session outbox: field
//! updates, damage notifications, respawns and the end of a match. The network
//! layer drains the outbox after each event and each tick, preserving order.
//!
//! ### Timers
//! Respawns and the return to the lobby are scheduled on a session clock and
//! fired by the server loop. Timers are cancelled when their entity leaves or
//! a new match starts, so a late timer never touches stale state.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Maps addresses to the entity each client drives and detects timeouts.
//!
//! ### Game Module (`game`)
//! The authoritative session tying all controllers together:
//! - Join/leave with initial state for late joiners
//! - Hit validation and kill counting
//! - Match start, win and lobby return
//!
//! ### Controllers (`health`, `lifecycle`, `match_controller`)
//! Damage and death detection, respawn timers, and match resolution.
//!
//! ### Support (`registry`, `scheduler`, `spawn`)
//! The session's entity registry, the timer queue and the spawn point ring.
//!
//! ### Network Module (`network`)
//! UDP socket handling, packet routing and the main server loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::GameConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 30Hz server for up to 16 clients, seeded with two ghost wizards
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(33),
//!         16,
//!         GameConfig::default(),
//!         2,
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod health;
pub mod lifecycle;
pub mod match_controller;
pub mod network;
pub mod registry;
pub mod scheduler;
pub mod spawn;
