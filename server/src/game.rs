use crate::network::{GameMessage, SessionHandler};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::simulation::{self, SimEvent};
use shared::{Ball, Packet, Paddle, Side, COUNTDOWN_SECONDS, MAX_PLAYERS};
use std::collections::HashMap;

pub const SERVER_FULL_MESSAGE: &str = "Server is full";

/// Whole seconds announced while counting down, after the initial "3".
const COUNTDOWN_MARKS: [f32; 2] = [2.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundPhase {
    Lobby,
    Countdown { remaining: f32 },
    Playing,
}

/// The authoritative two-player session.
///
/// Transport callbacks and ticks are delivered one at a time by the server
/// loop. Every reaction is queued as a [`GameMessage`] and flushed by the
/// transport after each call.
pub struct GameSession {
    players: HashMap<u32, Paddle>,
    ball: Ball,
    phase: RoundPhase,
    rng: StdRng,
    outgoing: Vec<GameMessage>,
}

impl GameSession {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Session with a reproducible serve sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            players: HashMap::new(),
            ball: Ball::new(),
            phase: RoundPhase::Lobby,
            rng,
            outgoing: Vec::new(),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase == RoundPhase::Playing
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn player(&self, client_id: u32) -> Option<&Paddle> {
        self.players.get(&client_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn ready_count(&self) -> usize {
        self.players.values().filter(|p| p.ready).count()
    }

    fn send(&mut self, client_id: u32, packet: Packet) {
        self.outgoing
            .push(GameMessage::SendPacket { client_id, packet });
    }

    fn broadcast(&mut self, packet: Packet) {
        self.outgoing.push(GameMessage::BroadcastPacket {
            packet,
            exclude: None,
        });
    }

    fn relay(&mut self, from: u32, packet: Packet) {
        self.outgoing.push(GameMessage::BroadcastPacket {
            packet,
            exclude: Some(from),
        });
    }

    /// Left is handed out first. A side freed by a disconnect is reused.
    fn free_side(&self) -> Side {
        if self.players.values().any(|p| p.side == Side::Left) {
            Side::Right
        } else {
            Side::Left
        }
    }

    fn start_countdown(&mut self) {
        info!("Both players ready, starting countdown");
        simulation::reset_ball(&mut self.ball, &mut self.rng);
        self.phase = RoundPhase::Countdown {
            remaining: COUNTDOWN_SECONDS,
        };
        self.broadcast(Packet::BallReset);
        self.broadcast(Packet::PlayerCountdown {
            text: format!("{}", COUNTDOWN_SECONDS as u32),
        });
    }

    /// Leaves the current round and goes back to the lobby with nobody ready.
    fn end_round(&mut self) {
        if self.phase != RoundPhase::Lobby {
            info!("Round ended, back to lobby");
            self.broadcast(Packet::GameEnded);
        }
        self.phase = RoundPhase::Lobby;
        self.ball = Ball::new();
        for paddle in self.players.values_mut() {
            paddle.ready = false;
        }
    }

    fn handle_ready(&mut self, client_id: u32, ready: bool) {
        if self.phase == RoundPhase::Playing {
            debug!("Ignoring ready change from {} during play", client_id);
            return;
        }
        if let Some(paddle) = self.players.get_mut(&client_id) {
            paddle.ready = ready;
        }
        self.relay(client_id, Packet::PlayerReady { ready });

        match self.phase {
            RoundPhase::Lobby
                if self.players.len() == MAX_PLAYERS && self.ready_count() == MAX_PLAYERS =>
            {
                self.start_countdown();
            }
            RoundPhase::Countdown { .. } if !ready => {
                info!("Player {} cancelled the countdown", client_id);
                self.end_round();
            }
            _ => {}
        }
    }

    fn handle_request_peers(&mut self, client_id: u32) {
        let peers: Vec<Packet> = self
            .players
            .iter()
            .filter(|(id, _)| **id != client_id)
            .map(|(_, paddle)| Packet::PeerState(paddle.peer_state()))
            .collect();
        for packet in peers {
            self.send(client_id, packet);
        }
    }

    fn tick_countdown(&mut self, remaining: f32, dt: f32) {
        let next = remaining - dt;
        for mark in COUNTDOWN_MARKS {
            if remaining > mark && next <= mark {
                self.broadcast(Packet::PlayerCountdown {
                    text: format!("{}", mark as u32),
                });
            }
        }

        if next <= 0.0 {
            info!("Round started");
            self.phase = RoundPhase::Playing;
            self.broadcast(Packet::PlayerCountdown {
                text: "GO!".to_string(),
            });
            self.broadcast(Packet::GameStarted);
            self.broadcast(Packet::BallVelocity {
                x: self.ball.velocity.x,
                y: self.ball.velocity.y,
            });
        } else {
            self.phase = RoundPhase::Countdown { remaining: next };
        }
    }

    fn tick_playing(&mut self, dt: f32) {
        let events = simulation::step(
            &mut self.ball,
            self.players.values_mut(),
            dt,
            &mut self.rng,
        );
        for event in events {
            let packet = match event {
                SimEvent::PaddleHit { .. } => Packet::PlayerHit,
                SimEvent::BallBounce => Packet::BallBounce,
                SimEvent::Score { side, score } => {
                    info!("Point for {:?} side, score {}", side, score);
                    Packet::PlayerScore {
                        right_side: side.is_right(),
                        score: i32::try_from(score).unwrap_or(i32::MAX),
                    }
                }
                SimEvent::BallReset => Packet::BallReset,
                SimEvent::BallPosition(position) => Packet::BallPosition {
                    x: position.x,
                    y: position.y,
                },
                SimEvent::BallVelocity(velocity) => Packet::BallVelocity {
                    x: velocity.x,
                    y: velocity.y,
                },
            };
            self.broadcast(packet);
        }

        for paddle in self.players.values_mut() {
            paddle.advance(dt);
        }
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandler for GameSession {
    fn on_connected(&mut self, client_id: u32) {
        if self.players.len() >= MAX_PLAYERS {
            warn!("Rejecting client {}: session already has {} players", client_id, MAX_PLAYERS);
            self.send(
                client_id,
                Packet::Server {
                    message: SERVER_FULL_MESSAGE.to_string(),
                },
            );
            self.outgoing.push(GameMessage::Kick { client_id });
            return;
        }

        let side = self.free_side();
        info!("Player {} joined on the {:?} side", client_id, side);
        self.players.insert(client_id, Paddle::new(side));
        self.broadcast(Packet::PlayerConnected {
            id: client_id,
            right_side: side.is_right(),
        });
    }

    fn on_disconnected(&mut self, client_id: u32) {
        if self.players.remove(&client_id).is_none() {
            return;
        }
        info!("Player {} left", client_id);
        self.end_round();
        self.broadcast(Packet::PlayerDisconnected { id: client_id });
    }

    fn on_packet_received(&mut self, client_id: u32, packet: Packet) {
        if !self.players.contains_key(&client_id) {
            warn!("Packet {:?} from unknown player {}", packet.kind(), client_id);
            return;
        }

        match packet {
            Packet::PlayerMovingUp { active } => {
                if let Some(paddle) = self.players.get_mut(&client_id) {
                    paddle.moving_up = active;
                }
                self.relay(client_id, Packet::PlayerMovingUp { active });
            }
            Packet::PlayerMovingDown { active } => {
                if let Some(paddle) = self.players.get_mut(&client_id) {
                    paddle.moving_down = active;
                }
                self.relay(client_id, Packet::PlayerMovingDown { active });
            }
            Packet::PlayerReady { ready } => self.handle_ready(client_id, ready),
            Packet::RequestPeers => self.handle_request_peers(client_id),
            Packet::Server { message } => info!("Player {} says: {}", client_id, message),
            other => warn!(
                "Player {} sent server-only packet {:?}",
                client_id,
                other.kind()
            ),
        }
    }

    fn tick(&mut self, dt: f32) {
        match self.phase {
            RoundPhase::Lobby => {}
            RoundPhase::Countdown { remaining } => self.tick_countdown(remaining, dt),
            RoundPhase::Playing => self.tick_playing(dt),
        }
    }

    fn drain_outgoing(&mut self) -> Vec<GameMessage> {
        std::mem::take(&mut self.outgoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{PeerState, Vec2, CENTER, PADDLE_SPEED};

    fn broadcasts(messages: &[GameMessage]) -> Vec<Packet> {
        messages
            .iter()
            .filter_map(|m| match m {
                GameMessage::BroadcastPacket {
                    packet,
                    exclude: None,
                } => Some(packet.clone()),
                _ => None,
            })
            .collect()
    }

    fn countdown_texts(messages: &[GameMessage]) -> Vec<String> {
        broadcasts(messages)
            .into_iter()
            .filter_map(|p| match p {
                Packet::PlayerCountdown { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn two_players() -> GameSession {
        let mut session = GameSession::with_seed(1);
        session.on_connected(1);
        session.on_connected(2);
        session.drain_outgoing();
        session
    }

    fn playing_session() -> GameSession {
        let mut session = two_players();
        session.on_packet_received(1, Packet::PlayerReady { ready: true });
        session.on_packet_received(2, Packet::PlayerReady { ready: true });
        session.tick(COUNTDOWN_SECONDS + 0.1);
        session.drain_outgoing();
        assert!(session.is_started());
        session
    }

    #[test]
    fn test_sides_assigned_by_arrival() {
        let mut session = GameSession::with_seed(1);
        session.on_connected(1);
        session.on_connected(2);

        assert_eq!(session.player(1).unwrap().side, Side::Left);
        assert_eq!(session.player(2).unwrap().side, Side::Right);
        assert_eq!(
            broadcasts(&session.drain_outgoing()),
            vec![
                Packet::PlayerConnected {
                    id: 1,
                    right_side: false
                },
                Packet::PlayerConnected {
                    id: 2,
                    right_side: true
                },
            ]
        );
    }

    #[test]
    fn test_request_peers_answers_requester_only() {
        let mut session = two_players();
        session.on_packet_received(2, Packet::RequestPeers);

        assert_eq!(
            session.drain_outgoing(),
            vec![GameMessage::SendPacket {
                client_id: 2,
                packet: Packet::PeerState(PeerState {
                    right_side: false,
                    score: 0,
                    ready: false,
                    y: 0.5,
                    moving_down: false,
                    moving_up: false,
                }),
            }]
        );
    }

    #[test]
    fn test_request_peers_when_alone_is_empty() {
        let mut session = GameSession::with_seed(1);
        session.on_connected(1);
        session.drain_outgoing();

        session.on_packet_received(1, Packet::RequestPeers);
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn test_third_client_is_rejected() {
        let mut session = two_players();
        session.on_connected(3);

        assert_eq!(
            session.drain_outgoing(),
            vec![
                GameMessage::SendPacket {
                    client_id: 3,
                    packet: Packet::Server {
                        message: SERVER_FULL_MESSAGE.to_string()
                    },
                },
                GameMessage::Kick { client_id: 3 },
            ]
        );
        assert_eq!(session.player_count(), 2);
        assert!(session.player(3).is_none());
    }

    #[test]
    fn test_countdown_sequence_then_start() {
        let mut session = two_players();
        let mut messages = Vec::new();

        session.on_packet_received(1, Packet::PlayerReady { ready: true });
        assert_eq!(session.phase(), RoundPhase::Lobby);
        session.on_packet_received(2, Packet::PlayerReady { ready: true });
        assert!(matches!(session.phase(), RoundPhase::Countdown { .. }));
        messages.extend(session.drain_outgoing());

        for _ in 0..200 {
            session.tick(1.0 / 60.0);
            messages.extend(session.drain_outgoing());
            if session.is_started() {
                break;
            }
        }

        assert!(session.is_started());
        assert_eq!(countdown_texts(&messages), vec!["3", "2", "1", "GO!"]);

        let packets = broadcasts(&messages);
        let go = packets
            .iter()
            .position(|p| *p == Packet::PlayerCountdown { text: "GO!".to_string() })
            .unwrap();
        assert_eq!(packets[go + 1], Packet::GameStarted);
        assert_eq!(
            packets[go + 2],
            Packet::BallVelocity {
                x: session.ball().velocity.x,
                y: session.ball().velocity.y
            }
        );
    }

    #[test]
    fn test_large_tick_still_announces_every_mark() {
        let mut session = two_players();
        session.on_packet_received(1, Packet::PlayerReady { ready: true });
        session.on_packet_received(2, Packet::PlayerReady { ready: true });
        session.drain_outgoing();

        session.tick(5.0);
        assert_eq!(
            countdown_texts(&session.drain_outgoing()),
            vec!["2", "1", "GO!"]
        );
    }

    #[test]
    fn test_single_ready_player_does_not_start() {
        let mut session = GameSession::with_seed(1);
        session.on_connected(1);
        session.on_packet_received(1, Packet::PlayerReady { ready: true });
        session.tick(COUNTDOWN_SECONDS * 2.0);

        assert_eq!(session.phase(), RoundPhase::Lobby);
        assert_eq!(session.ready_count(), 1);
    }

    #[test]
    fn test_unready_cancels_countdown() {
        let mut session = two_players();
        session.on_packet_received(1, Packet::PlayerReady { ready: true });
        session.on_packet_received(2, Packet::PlayerReady { ready: true });
        session.tick(0.5);
        session.drain_outgoing();

        session.on_packet_received(2, Packet::PlayerReady { ready: false });

        assert_eq!(session.phase(), RoundPhase::Lobby);
        assert_eq!(session.ready_count(), 0);
        assert!(broadcasts(&session.drain_outgoing()).contains(&Packet::GameEnded));
    }

    #[test]
    fn test_ready_ignored_while_playing() {
        let mut session = playing_session();
        session.on_packet_received(1, Packet::PlayerReady { ready: false });

        assert!(session.is_started());
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn test_disconnect_during_play_resets_round() {
        let mut session = playing_session();
        session.tick(0.1);
        session.drain_outgoing();

        session.on_disconnected(2);

        assert_eq!(session.phase(), RoundPhase::Lobby);
        assert_eq!(session.ready_count(), 0);
        assert_eq!(session.ball().position, CENTER);
        assert_eq!(session.ball().velocity, Vec2::default());
        assert_eq!(
            broadcasts(&session.drain_outgoing()),
            vec![Packet::GameEnded, Packet::PlayerDisconnected { id: 2 }]
        );
    }

    #[test]
    fn test_disconnect_in_lobby_only_notifies() {
        let mut session = two_players();
        session.on_packet_received(1, Packet::PlayerReady { ready: true });
        session.drain_outgoing();

        session.on_disconnected(2);

        assert_eq!(session.ready_count(), 0);
        assert_eq!(
            broadcasts(&session.drain_outgoing()),
            vec![Packet::PlayerDisconnected { id: 2 }]
        );
    }

    #[test]
    fn test_freed_side_is_reused() {
        let mut session = two_players();
        session.on_disconnected(1);
        session.on_connected(3);

        assert_eq!(session.player(3).unwrap().side, Side::Left);
        assert_eq!(session.player(2).unwrap().side, Side::Right);
    }

    #[test]
    fn test_intent_relayed_to_peer_only() {
        let mut session = two_players();
        session.on_packet_received(1, Packet::PlayerMovingUp { active: true });

        assert!(session.player(1).unwrap().moving_up);
        assert_eq!(
            session.drain_outgoing(),
            vec![GameMessage::BroadcastPacket {
                packet: Packet::PlayerMovingUp { active: true },
                exclude: Some(1),
            }]
        );
    }

    #[test]
    fn test_last_intent_wins() {
        let mut session = two_players();
        session.on_packet_received(2, Packet::PlayerMovingDown { active: true });
        session.on_packet_received(2, Packet::PlayerMovingDown { active: false });
        session.on_packet_received(2, Packet::PlayerMovingDown { active: true });

        assert!(session.player(2).unwrap().moving_down);
    }

    #[test]
    fn test_paddles_only_move_while_playing() {
        let mut session = two_players();
        session.on_packet_received(1, Packet::PlayerMovingDown { active: true });
        session.tick(0.5);
        assert_eq!(session.player(1).unwrap().y, 0.5);

        let mut session = playing_session();
        session.on_packet_received(1, Packet::PlayerMovingDown { active: true });
        session.tick(0.05);
        assert_approx_eq!(session.player(1).unwrap().y, 0.5 + PADDLE_SPEED * 0.05, 1e-6);
    }

    #[test]
    fn test_goal_broadcasts_score_and_reset() {
        let mut session = playing_session();
        session.ball.position = Vec2::new(0.999, 0.5);
        session.ball.velocity = Vec2::new(0.5, 0.0);

        session.tick(1.0 / 60.0);
        let packets = broadcasts(&session.drain_outgoing());

        let scores: Vec<&Packet> = packets
            .iter()
            .filter(|p| matches!(p, Packet::PlayerScore { .. }))
            .collect();
        assert_eq!(
            scores,
            vec![&Packet::PlayerScore {
                right_side: false,
                score: 1
            }]
        );
        assert!(packets.contains(&Packet::BallReset));
        assert_eq!(session.player(1).unwrap().score, 1);
        assert_eq!(session.player(2).unwrap().score, 0);
        assert_eq!(session.ball().position, CENTER);
    }

    #[test]
    fn test_wall_bounce_broadcasts_position_then_velocity() {
        let mut session = playing_session();
        session.ball.position = Vec2::new(0.5, 0.001);
        session.ball.velocity = Vec2::new(0.1, -0.5);

        session.tick(1.0 / 60.0);
        let packets = broadcasts(&session.drain_outgoing());

        assert_eq!(packets[0], Packet::BallBounce);
        assert!(matches!(packets[1], Packet::BallPosition { .. }));
        assert_eq!(packets[2], Packet::BallVelocity { x: 0.1, y: 0.5 });
    }

    #[test]
    fn test_unknown_player_packets_ignored() {
        let mut session = two_players();
        session.on_packet_received(9, Packet::PlayerReady { ready: true });

        assert!(session.drain_outgoing().is_empty());
        assert_eq!(session.ready_count(), 0);
    }
}
