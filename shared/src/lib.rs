//! Types, constants and protocol shared by the Pong server and client.
//!
//! All positions and velocities live in normalized space: `(0, 0)` is the
//! top-left corner of the court and `(1, 1)` the bottom-right. Speeds are
//! expressed in normalized units per second, derived from pixel constants
//! divided by the reference resolution, so the simulation does not depend on
//! the size of any window.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_4;

pub mod frame;
pub mod packet;
pub mod simulation;

pub use packet::{CodecError, Packet, PacketKind, PeerState};

pub const REFERENCE_WIDTH: f32 = 800.0;
pub const REFERENCE_HEIGHT: f32 = 600.0;
/// Converts a normalized vertical speed to the same on-screen speed horizontally.
pub const ASPECT_RATIO: f32 = REFERENCE_WIDTH / REFERENCE_HEIGHT;

pub const PADDLE_WIDTH: f32 = 12.0 / REFERENCE_WIDTH;
pub const PADDLE_HEIGHT: f32 = 96.0 / REFERENCE_HEIGHT;
pub const PADDLE_HALF_WIDTH: f32 = PADDLE_WIDTH / 2.0;
pub const PADDLE_HALF_HEIGHT: f32 = PADDLE_HEIGHT / 2.0;
/// Horizontal distance of a paddle's center from its own edge of the court.
pub const PADDLE_INSET: f32 = 64.0 / REFERENCE_WIDTH;
pub const PADDLE_SPEED: f32 = 256.0 / REFERENCE_HEIGHT;

pub const BALL_WIDTH: f32 = 10.0 / REFERENCE_WIDTH;
pub const BALL_HEIGHT: f32 = 10.0 / REFERENCE_HEIGHT;
pub const BALL_BASE_SPEED: f32 = 256.0 / REFERENCE_WIDTH;
pub const MAX_BOUNCE_ANGLE: f32 = FRAC_PI_4;

pub const MAX_PLAYERS: usize = 2;
pub const DEFAULT_PORT: u16 = 8080;
pub const COUNTDOWN_SECONDS: f32 = 3.0;

///Represents a vector in normalized 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    ///Positive direction is to the right.
    pub x: f32,
    ///Positive direction is down.
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

/// Court center, where the ball is served from and paddles start.
pub const CENTER: Vec2 = Vec2::new(0.5, 0.5);

/// Which end of the court a player defends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Maps the wire representation (`rightSide` flag) to a side.
    pub fn from_right_side(right_side: bool) -> Self {
        if right_side {
            Side::Right
        } else {
            Side::Left
        }
    }

    pub fn is_right(self) -> bool {
        self == Side::Right
    }

    /// Fixed horizontal position of the paddle defending this side.
    pub fn paddle_x(self) -> f32 {
        match self {
            Side::Left => PADDLE_INSET,
            Side::Right => 1.0 - PADDLE_INSET,
        }
    }
}

/// Axis-aligned box described by its center and half extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub center: Vec2,
    pub half_width: f32,
    pub half_height: f32,
}

impl Bounds {
    pub fn overlaps(&self, other: &Bounds) -> bool {
        (self.center.x - other.center.x).abs() <= self.half_width + other.half_width
            && (self.center.y - other.center.y).abs() <= self.half_height + other.half_height
    }
}

/// The ball. The server owns the authoritative copy; clients hold a mirror
/// that is advanced locally and overwritten on every authoritative update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Magnitude of the last launch or hit, in normalized horizontal units.
    pub speed: f32,
}

impl Ball {
    pub fn new() -> Self {
        Self {
            position: CENTER,
            velocity: Vec2::default(),
            speed: BALL_BASE_SPEED,
        }
    }

    /// Linear motion: `position += velocity * dt`.
    pub fn advance(&mut self, dt: f32) {
        self.position = self.position.add(&self.velocity.scale(dt));
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            center: self.position,
            half_width: BALL_WIDTH / 2.0,
            half_height: BALL_HEIGHT / 2.0,
        }
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

/// A player's paddle together with the per-player round state.
///
/// The connection identity is not stored here: the server keys paddles by
/// connection id and the client knows which record is "self" and which is
/// the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    pub side: Side,
    /// Vertical center, always within `[PADDLE_HALF_HEIGHT, 1 - PADDLE_HALF_HEIGHT]`.
    pub y: f32,
    pub moving_up: bool,
    pub moving_down: bool,
    pub score: u32,
    pub ready: bool,
}

impl Paddle {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            y: CENTER.y,
            moving_up: false,
            moving_down: false,
            score: 0,
            ready: false,
        }
    }

    pub fn x(&self) -> f32 {
        self.side.paddle_x()
    }

    /// Net vertical input: both keys held cancel out.
    pub fn net_input(&self) -> f32 {
        (self.moving_down as i32 - self.moving_up as i32) as f32
    }

    /// Moves the paddle by its current intent and keeps it fully on court.
    pub fn advance(&mut self, dt: f32) {
        self.y += self.net_input() * PADDLE_SPEED * dt;
        self.y = self
            .y
            .clamp(PADDLE_HALF_HEIGHT, 1.0 - PADDLE_HALF_HEIGHT);
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            center: Vec2::new(self.x(), self.y),
            half_width: PADDLE_HALF_WIDTH,
            half_height: PADDLE_HALF_HEIGHT,
        }
    }

    /// Snapshot sent in answer to a peer-state request.
    pub fn peer_state(&self) -> PeerState {
        PeerState {
            right_side: self.side.is_right(),
            score: self.score,
            ready: self.ready,
            y: self.y,
            moving_down: self.moving_down,
            moving_up: self.moving_up,
        }
    }

    pub fn from_peer_state(state: &PeerState) -> Self {
        Self {
            side: Side::from_right_side(state.right_side),
            y: state.y,
            moving_up: state.moving_up,
            moving_down: state.moving_down,
            score: state.score,
            ready: state.ready,
        }
    }
}
