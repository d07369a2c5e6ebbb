//! # Pong Client Library
//!
//! This library provides the client side of two-player networked Pong. The
//! client owns no game truth: it forwards input to the server, mirrors the
//! broadcasts it receives, and predicts motion between them so the picture
//! stays smooth.
//!
//! ## Architecture Overview
//!
//! ### Mirror State
//! The client keeps one paddle for itself, one for its opponent and a ball.
//! Ball and scores are overwritten by every authoritative update; between
//! updates the ball keeps moving along its last known velocity.
//!
//! ### Edge-Triggered Input
//! Movement keys are sent only when they change, never polled every frame.
//! The opponent's paddle is predicted from the last intent the server
//! relayed.
//!
//! ### Optimistic Ready-Up
//! Toggling ready updates the local flag at once and informs the server
//! without waiting for an acknowledgement.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! [`game::ClientSession`], the mirror and the packet handling rules.
//!
//! ### Input Module (`input`)
//! Keyboard sampling and change detection.
//!
//! ### Connect Module (`connect`)
//! Text entry for the server IP and port, with validation.
//!
//! ### Announcements Module (`announcements`)
//! Fixed pool of fading on-screen messages.
//!
//! ### Network Module (`network`)
//! Background TCP connection with channel hand-off to the render loop.
//!
//! ### Rendering Module (`rendering`)
//! Draws the court, paddles, ball, scores and the connect form.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientSession;
//! use client::network::{NetworkClient, NetworkEvent};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut network = NetworkClient::connect("127.0.0.1:8080".parse()?)?;
//! let mut session = ClientSession::new();
//!
//! loop {
//!     for event in network.poll_events() {
//!         if let NetworkEvent::PacketReceived(packet) = event {
//!             session.apply_packet(packet);
//!         }
//!     }
//!     for packet in session.drain_outgoing() {
//!         network.send(packet);
//!     }
//!     session.update(1.0 / 60.0);
//! }
//! # }
//! ```

pub mod announcements;
pub mod connect;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
