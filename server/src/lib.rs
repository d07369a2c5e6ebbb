//! # Pong Server Library
//!
//! This library provides the authoritative server for two-player networked
//! Pong. It owns the only real copy of the ball and the scores, turns player
//! intent into paddle motion, and broadcasts every change to the clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive ball physics. Clients only mirror it and
//! snap their local copy whenever a velocity, position or reset update
//! arrives.
//!
//! ### Round State Machine
//! A session moves between `Lobby`, `Countdown` and `Playing`. Both players
//! must be ready to leave the lobby, and any disconnect sends the session
//! straight back to it.
//!
//! ### Client Management
//! Handles the lifecycle of TCP connections:
//! - Connection registration and id assignment
//! - Rejection of a third player with a diagnostic message
//! - Send-to-one and send-to-all-except-sender routing
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! Every transport event and every tick is processed by one loop, so the
//! session is never touched concurrently. Network tasks only decode frames
//! and forward them over a channel.
//!
//! ### Reliable Ordered Transport
//! Packets travel over TCP, each preceded by a big-endian length. Inputs are
//! edge-triggered and sent once, so they must not be lost or reordered.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection registry and per-connection outbound queues.
//!
//! ### Game Module (`game`)
//! The [`game::GameSession`] state machine and its use of the shared
//! simulation.
//!
//! ### Network Module (`network`)
//! TCP accept loop, per-connection reader/writer tasks, the fixed-rate tick
//! and the [`network::SessionHandler`] seam between transport and session.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameSession;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind(
//!         "0.0.0.0:8080",
//!         Duration::from_secs_f32(1.0 / 60.0),
//!         GameSession::new(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
