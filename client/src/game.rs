//! Client-side mirror of the authoritative session.
//!
//! The client never decides ball motion or scores. It keeps a copy of both
//! paddles and the ball, predicts motion between server updates, and
//! overwrites the prediction whenever an authoritative value arrives.

use log::{debug, info, warn};
use shared::{Ball, Packet, Paddle, Side, Vec2, BALL_BASE_SPEED, CENTER};

/// Local view of the round, rebuilt from server broadcasts
#[derive(Debug, Clone)]
pub struct ClientSession {
    self_id: Option<u32>,
    self_paddle: Option<Paddle>,
    peer_paddle: Option<Paddle>,
    ball: Ball,
    started: bool,
    /// Movement keys as last reported, kept while no paddle exists yet
    held_up: bool,
    held_down: bool,

    /// Packets waiting to be written to the server
    outgoing: Vec<Packet>,
    /// Human-readable lines to show on screen (countdown, server text)
    notices: Vec<String>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            self_id: None,
            self_paddle: None,
            peer_paddle: None,
            ball: Ball::new(),
            started: false,
            held_up: false,
            held_down: false,
            outgoing: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn self_id(&self) -> Option<u32> {
        self.self_id
    }

    pub fn self_paddle(&self) -> Option<&Paddle> {
        self.self_paddle.as_ref()
    }

    pub fn peer_paddle(&self) -> Option<&Paddle> {
        self.peer_paddle.as_ref()
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Scores as `(left, right)`, zero for a side nobody holds.
    pub fn scores(&self) -> (u32, u32) {
        let score_of = |side: Side| {
            self.paddles()
                .find(|paddle| paddle.side == side)
                .map_or(0, |paddle| paddle.score)
        };
        (score_of(Side::Left), score_of(Side::Right))
    }

    pub fn paddles(&self) -> impl Iterator<Item = &Paddle> {
        self.self_paddle.iter().chain(self.peer_paddle.iter())
    }

    fn paddle_on_side_mut(&mut self, side: Side) -> Option<&mut Paddle> {
        self.self_paddle
            .iter_mut()
            .chain(self.peer_paddle.iter_mut())
            .find(|paddle| paddle.side == side)
    }

    /// Sends a movement edge. Repeated calls with the same value are dropped.
    /// Before joining, the key state is remembered and sent on join.
    pub fn set_moving_up(&mut self, active: bool) {
        self.held_up = active;
        let Some(paddle) = self.self_paddle.as_mut() else {
            return;
        };
        if paddle.moving_up != active {
            paddle.moving_up = active;
            self.outgoing.push(Packet::PlayerMovingUp { active });
        }
    }

    pub fn set_moving_down(&mut self, active: bool) {
        self.held_down = active;
        let Some(paddle) = self.self_paddle.as_mut() else {
            return;
        };
        if paddle.moving_down != active {
            paddle.moving_down = active;
            self.outgoing.push(Packet::PlayerMovingDown { active });
        }
    }

    /// Flips the local ready flag and tells the server without waiting for an answer.
    pub fn toggle_ready(&mut self) {
        if self.started {
            return;
        }
        let Some(paddle) = self.self_paddle.as_mut() else {
            return;
        };
        paddle.ready = !paddle.ready;
        self.outgoing.push(Packet::PlayerReady {
            ready: paddle.ready,
        });
    }

    fn reset_round(&mut self) {
        self.started = false;
        self.ball = Ball::new();
        for paddle in self.self_paddle.iter_mut().chain(self.peer_paddle.iter_mut()) {
            paddle.ready = false;
        }
    }

    /// Forgets everything learned from the server, e.g. after losing the connection.
    pub fn reset(&mut self) {
        let notices = std::mem::take(&mut self.notices);
        let (held_up, held_down) = (self.held_up, self.held_down);
        *self = Self::new();
        self.notices = notices;
        self.held_up = held_up;
        self.held_down = held_down;
    }

    /// Applies one authoritative packet to the mirror.
    pub fn apply_packet(&mut self, packet: Packet) {
        match packet {
            Packet::PlayerConnected { id, right_side } => {
                let side = Side::from_right_side(right_side);
                if self.self_id.is_none() {
                    info!("Joined as player {} on the {:?} side", id, side);
                    self.self_id = Some(id);
                    self.self_paddle = Some(Paddle::new(side));
                    self.outgoing.push(Packet::RequestPeers);
                    // Keys held while joining
                    let (held_up, held_down) = (self.held_up, self.held_down);
                    self.set_moving_up(held_up);
                    self.set_moving_down(held_down);
                } else if self.self_id != Some(id) {
                    info!("Player {} joined on the {:?} side", id, side);
                    self.peer_paddle = Some(Paddle::new(side));
                    self.notices.push("Opponent joined".to_string());
                }
            }
            Packet::PeerState(state) => {
                debug!("Received peer state {:?}", state);
                self.peer_paddle = Some(Paddle::from_peer_state(&state));
            }
            Packet::PlayerDisconnected { id } => {
                if self.self_id == Some(id) {
                    return;
                }
                info!("Player {} left", id);
                self.peer_paddle = None;
                self.reset_round();
                self.notices.push("Opponent left".to_string());
            }
            Packet::PlayerMovingUp { active } => {
                if let Some(peer) = self.peer_paddle.as_mut() {
                    peer.moving_up = active;
                }
            }
            Packet::PlayerMovingDown { active } => {
                if let Some(peer) = self.peer_paddle.as_mut() {
                    peer.moving_down = active;
                }
            }
            Packet::PlayerReady { ready } => {
                if let Some(peer) = self.peer_paddle.as_mut() {
                    peer.ready = ready;
                }
            }
            Packet::PlayerScore { right_side, score } => {
                let side = Side::from_right_side(right_side);
                if let Some(paddle) = self.paddle_on_side_mut(side) {
                    paddle.score = u32::try_from(score).unwrap_or(0);
                }
            }
            Packet::BallReset => {
                self.ball.position = CENTER;
                self.ball.velocity = Vec2::default();
                self.ball.speed = BALL_BASE_SPEED;
            }
            Packet::BallVelocity { x, y } => self.ball.velocity = Vec2::new(x, y),
            Packet::BallPosition { x, y } => self.ball.position = Vec2::new(x, y),
            Packet::GameStarted => {
                info!("Round started");
                self.started = true;
            }
            Packet::GameEnded => {
                info!("Round ended");
                self.reset_round();
            }
            Packet::PlayerCountdown { text } => self.notices.push(text),
            Packet::PlayerHit => debug!("Paddle hit"),
            Packet::BallBounce => debug!("Wall bounce"),
            Packet::Server { message } => {
                info!("Server: {}", message);
                self.notices.push(message);
            }
            Packet::RequestPeers => warn!("Server sent a peer request"),
        }
    }

    /// Local prediction step. Nothing moves outside a running round.
    pub fn update(&mut self, dt: f32) {
        if !self.started {
            return;
        }
        for paddle in self.self_paddle.iter_mut().chain(self.peer_paddle.iter_mut()) {
            paddle.advance(dt);
        }
        self.ball.advance(dt);
    }

    pub fn drain_outgoing(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn drain_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}
