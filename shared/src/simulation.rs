//! Ball physics for the authoritative simulation.
//!
//! The server calls [`step`] once per tick while a round is playing. The
//! function moves the ball, resolves paddle and wall collisions, awards
//! points and re-serves the ball, and reports everything that changed as a
//! list of [`SimEvent`]s for broadcasting. Paddle motion lives on
//! [`Paddle::advance`] because clients run it too.

use crate::{
    Ball, Paddle, Side, Vec2, ASPECT_RATIO, BALL_BASE_SPEED, BALL_WIDTH, CENTER,
    MAX_BOUNCE_ANGLE, PADDLE_HALF_HEIGHT, PADDLE_HALF_WIDTH,
};
use rand::Rng;

/// Observable outcome of a simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    PaddleHit { side: Side },
    BallBounce,
    Score { side: Side, score: u32 },
    BallReset,
    BallPosition(Vec2),
    BallVelocity(Vec2),
}

/// Velocity for a ball travelling at `speed` along `angle` (radians).
///
/// The vertical component is stretched by the aspect ratio so that the
/// angle is preserved on screen.
pub fn velocity_from_angle(speed: f32, angle: f32) -> Vec2 {
    Vec2::new(speed * angle.cos(), speed * angle.sin() * ASPECT_RATIO)
}

/// Picks a serve angle uniformly from (0°, 360°), never on an axis.
pub fn launch_angle<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    loop {
        let degrees: f32 = rng.gen_range(0.0..360.0);
        if degrees % 90.0 != 0.0 {
            return degrees.to_radians();
        }
    }
}

/// Puts the ball back on the center spot and serves it in a random direction.
pub fn reset_ball<R: Rng + ?Sized>(ball: &mut Ball, rng: &mut R) {
    ball.position = CENTER;
    ball.speed = BALL_BASE_SPEED;
    loop {
        let velocity = velocity_from_angle(ball.speed, launch_angle(rng));
        // Angles a hair away from an axis can still round a component to zero.
        if velocity.x != 0.0 && velocity.y != 0.0 {
            ball.velocity = velocity;
            return;
        }
    }
}

/// Bounces the ball off `paddle` if it overlaps it while travelling towards it.
///
/// The further from the paddle's center the ball hits, the steeper the
/// outgoing angle (up to 45°) and the faster the ball (up to twice the base
/// speed). Returns whether a hit happened.
pub fn collide_paddle(ball: &mut Ball, paddle: &Paddle) -> bool {
    let approaching = match paddle.side {
        Side::Left => ball.velocity.x < 0.0,
        Side::Right => ball.velocity.x > 0.0,
    };
    if !approaching || !ball.bounds().overlaps(&paddle.bounds()) {
        return false;
    }

    let normalized_intersect = ((paddle.y - ball.position.y) / PADDLE_HALF_HEIGHT).clamp(-1.0, 1.0);
    let bounce_angle = normalized_intersect * MAX_BOUNCE_ANGLE;
    ball.speed = BALL_BASE_SPEED * (1.0 + normalized_intersect.abs());

    let horizontal = ball.speed * bounce_angle.cos();
    let vertical = ball.speed * bounce_angle.sin() * ASPECT_RATIO;
    let face_offset = PADDLE_HALF_WIDTH + BALL_WIDTH / 2.0;
    match paddle.side {
        Side::Left => {
            ball.velocity = Vec2::new(horizontal, -vertical);
            ball.position.x = paddle.x() + face_offset;
        }
        Side::Right => {
            ball.velocity = Vec2::new(-horizontal, vertical);
            ball.position.x = paddle.x() - face_offset;
        }
    }
    true
}

/// Reflects the ball off the top or bottom wall. Returns whether it bounced.
pub fn bounce_vertical(ball: &mut Ball) -> bool {
    let escaping = (ball.position.y < 0.0 && ball.velocity.y < 0.0)
        || (ball.position.y > 1.0 && ball.velocity.y > 0.0);
    ball.position.y = ball.position.y.clamp(0.0, 1.0);
    if escaping {
        ball.velocity.y = -ball.velocity.y;
    }
    escaping
}

/// Side credited with a point, if the ball has left the court horizontally.
pub fn scoring_side(ball: &Ball) -> Option<Side> {
    if ball.position.x > 1.0 {
        Some(Side::Left)
    } else if ball.position.x < 0.0 {
        Some(Side::Right)
    } else {
        None
    }
}

/// Advances the ball by `dt` against the given paddles.
pub fn step<'a, R: Rng + ?Sized>(
    ball: &mut Ball,
    paddles: impl IntoIterator<Item = &'a mut Paddle>,
    dt: f32,
    rng: &mut R,
) -> Vec<SimEvent> {
    let mut paddles: Vec<&mut Paddle> = paddles.into_iter().collect();
    let mut events = Vec::new();

    ball.advance(dt);

    if let Some(paddle) = paddles.iter().find(|paddle| collide_paddle(ball, paddle)) {
        events.push(SimEvent::PaddleHit { side: paddle.side });
        events.push(SimEvent::BallPosition(ball.position));
        events.push(SimEvent::BallVelocity(ball.velocity));
    }

    if bounce_vertical(ball) {
        events.push(SimEvent::BallBounce);
        events.push(SimEvent::BallPosition(ball.position));
        events.push(SimEvent::BallVelocity(ball.velocity));
    }

    if let Some(side) = scoring_side(ball) {
        if let Some(paddle) = paddles.iter_mut().find(|paddle| paddle.side == side) {
            paddle.score += 1;
            events.push(SimEvent::Score {
                side,
                score: paddle.score,
            });
        }
        reset_ball(ball, rng);
        events.push(SimEvent::BallReset);
        events.push(SimEvent::BallVelocity(ball.velocity));
    }

    events
}
