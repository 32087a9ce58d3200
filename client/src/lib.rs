//! # Game Client Library
//!
//! TCP client for the shared-room game server. The server tells the client
//! everything that happens in the room as packets wrapped with the identity
//! of the player they concern; the client unwraps them and hands them to a
//! chain of user callbacks.
//!
//! ## Module Organization
//!
//! - `callbacks`: ordered callback chain and helpers for the common packet kinds
//! - `network`: connection, outbound queue and inbound dispatch
//!
//! A join carrying [`shared::Identity::MAIN`] describes the local player
//! itself. Every other identity is a remote player.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::callbacks::on_player_join;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:7371".parse()?);
//!     client.add_callback(on_player_join(|identity, attributes| {
//!         println!("{} joined at {:?}", identity, attributes.position);
//!     }));
//!
//!     client.start().await?;
//!     client.update_position(40, 40);
//!     client.closed().await;
//!     Ok(())
//! }
//! ```

pub mod callbacks;
pub mod network;
