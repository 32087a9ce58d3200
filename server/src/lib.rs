//! # Game Server Library
//!
//! Authoritative TCP server for the shared-room game. It owns the canonical
//! attributes of every player, validates every update against them, and
//! forwards accepted updates to the other players.
//!
//! ## Connection lifecycle
//!
//! Each accepted socket gets a fresh [`shared::Identity`], a spawn position
//! that overlaps nobody, and a join handshake:
//! - every existing player receives the newcomer's join
//! - the newcomer receives its own join under the reserved zero identity
//! - the newcomer receives one join per existing player
//!
//! After the handshake the connection's reader task decodes packets, runs
//! them through the filter chain and, when accepted, applies and forwards
//! them. When the peer disconnects, the others receive a single leave and the
//! player is forgotten.
//!
//! ## Module Organization
//!
//! - `client_manager`: identity to outbound queue registry, capacity limit
//! - `game`: player attributes, spawn placement, position updates
//! - `filters`: composable accept/reject predicates
//! - `room`: registry and game state behind one lock, handshake and cleanup
//! - `network`: listener, reader and writer tasks
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = ServerConfig {
//!         address: "127.0.0.1:7371".parse().unwrap(),
//!         bounds: (720, 480),
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod filters;
pub mod game;
pub mod network;
pub mod room;
