//! # Paddle Arena Server Library
//!
//! This library provides the authoritative server for a two-player paddle game
//! played in a single shared room. It owns the canonical room state, routes
//! client messages to it, and streams the result to every connection.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the only copy of the game physics. Clients send paddle
//! intents and render whatever `GAME_STATE` frames they receive.
//!
//! ### Session Routing
//! Handles the complete lifecycle of a connection:
//! - Identity allocation and the initial lobby snapshot
//! - Player slot and spectator assignment
//! - Pausing when a player leaves and reopening the slot after a delay
//! - Returning both players to the lobby after a finished game
//!
//! ### State Broadcasting
//! Every tick of a running game produces one `GAME_STATE` frame for all
//! connections. Delivery is best effort: a slow or closed connection misses
//! frames instead of delaying everyone else.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! One task owns the [`session::SessionRouter`] and with it the room.
//! Connection tasks forward inbound frames over a channel, and the loop
//! interleaves them with the 60Hz tick and the due timers. Nothing else
//! mutates the room, so there are no locks around game state.
//!
//! ### WebSocket Transport
//! Clients connect over WebSocket at `/` and exchange JSON text frames of the
//! form `{"type": ..., "payload": ...}`. A `GET /health` endpoint reports the
//! seated players and the game status.
//!
//! ## Module Organization
//!
//! ### Room Module (`room`)
//! Player slots, spectators, scoring and the per-tick physics step.
//!
//! ### Client Manager Module (`client_manager`)
//! Connected identities, their display names and cached roles.
//!
//! ### Broadcast Module (`broadcast`)
//! Per-connection outbound queues with fan-out and direct delivery.
//!
//! ### Session Module (`session`)
//! Message handling, role bookkeeping and the reclaim and reset timers.
//!
//! ### Network Module (`network`)
//! The axum server, per-socket tasks and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // Bind on the default port with room for 64 connections
//!     let server = Server::bind("0.0.0.0:3001", 64).await?;
//!
//!     // Runs until the transport stops
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod error;
pub mod network;
pub mod room;
pub mod session;
