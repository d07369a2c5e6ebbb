use crate::announcements::AnnouncementPool;
use crate::connect::ConnectForm;
use crate::game::ClientSession;
use macroquad::prelude::*;
use shared::{Paddle, Vec2 as NormVec2, BALL_HEIGHT, BALL_WIDTH, PADDLE_HEIGHT, PADDLE_WIDTH};

const BACKGROUND: Color = Color::new(0.1, 0.1, 0.1, 1.0);
const SELF_COLOR: Color = GREEN;
const PEER_COLOR: Color = Color::new(1.0, 0.27, 0.27, 1.0);
const NET_COLOR: Color = Color::new(0.27, 0.27, 0.27, 1.0);

/// Maps a normalized point to pixels on a `width` x `height` surface.
pub fn to_screen(point: NormVec2, width: f32, height: f32) -> (f32, f32) {
    (point.x * width, point.y * height)
}

/// Top-left corner and size in pixels of a box centered on `center`.
pub fn screen_rect(center: NormVec2, w: f32, h: f32, width: f32, height: f32) -> Rect {
    let (cx, cy) = to_screen(center, width, height);
    let (pw, ph) = (w * width, h * height);
    Rect::new(cx - pw / 2.0, cy - ph / 2.0, pw, ph)
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&self, session: &ClientSession, announcements: &AnnouncementPool, status: &str) {
        let (width, height) = (screen_width(), screen_height());
        clear_background(BACKGROUND);

        self.draw_net(width, height);

        if let Some(paddle) = session.self_paddle() {
            self.draw_paddle(paddle, SELF_COLOR, width, height);
        }
        if let Some(paddle) = session.peer_paddle() {
            self.draw_paddle(paddle, PEER_COLOR, width, height);
        }

        let ball = screen_rect(session.ball().position, BALL_WIDTH, BALL_HEIGHT, width, height);
        draw_rectangle(ball.x, ball.y, ball.w, ball.h, WHITE);

        let (left, right) = session.scores();
        let score_text = format!("{}   {}", left, right);
        let size = measure_text(&score_text, None, 48, 1.0);
        draw_text(&score_text, (width - size.width) / 2.0, 56.0, 48.0, WHITE);

        if !session.is_started() {
            self.draw_lobby(session, width, height);
        }

        for (i, announcement) in announcements.active().enumerate() {
            let font_size = 64.0 * announcement.scale();
            let size = measure_text(&announcement.text, None, font_size as u16, 1.0);
            let color = Color::new(1.0, 1.0, 1.0, announcement.alpha());
            draw_text(
                &announcement.text,
                (width - size.width) / 2.0,
                height / 2.0 - 40.0 + i as f32 * 48.0,
                font_size,
                color,
            );
        }

        draw_text(status, 10.0, height - 10.0, 16.0, GRAY);
    }

    fn draw_net(&self, width: f32, height: f32) {
        let dash = height / 30.0;
        for i in (0..30).step_by(2) {
            draw_rectangle(width / 2.0 - 1.0, i as f32 * dash, 2.0, dash, NET_COLOR);
        }
    }

    fn draw_paddle(&self, paddle: &Paddle, color: Color, width: f32, height: f32) {
        let rect = screen_rect(
            NormVec2::new(paddle.x(), paddle.y),
            PADDLE_WIDTH,
            PADDLE_HEIGHT,
            width,
            height,
        );
        draw_rectangle(rect.x, rect.y, rect.w, rect.h, color);

        if paddle.ready {
            draw_rectangle_lines(rect.x - 3.0, rect.y - 3.0, rect.w + 6.0, rect.h + 6.0, 2.0, YELLOW);
        }
    }

    fn draw_lobby(&self, session: &ClientSession, width: f32, height: f32) {
        let line = match (session.self_paddle(), session.peer_paddle()) {
            (None, _) => "Waiting for the server...".to_string(),
            (Some(_), None) => "Waiting for an opponent...".to_string(),
            (Some(own), Some(_)) if own.ready => "Ready! Space to cancel".to_string(),
            (Some(_), Some(_)) => "Press Space when ready".to_string(),
        };
        let size = measure_text(&line, None, 24, 1.0);
        draw_text(&line, (width - size.width) / 2.0, height - 60.0, 24.0, LIGHTGRAY);
        draw_text("W/S or arrows to move, Esc to quit", 10.0, 20.0, 16.0, GRAY);
    }

    pub fn render_connect_form(&self, form: &ConnectForm) {
        let (width, height) = (screen_width(), screen_height());
        clear_background(BACKGROUND);

        let x = width / 2.0 - 180.0;
        let y = height / 2.0 - 40.0;
        draw_text(&form.prompt(), x, y, 28.0, WHITE);

        draw_rectangle_lines(x, y + 16.0, 360.0, 40.0, 2.0, LIGHTGRAY);
        let caret = if (get_time() * 2.0) as i64 % 2 == 0 { "_" } else { "" };
        draw_text(&format!("{}{}", form.input(), caret), x + 10.0, y + 46.0, 28.0, WHITE);

        if let Some(error) = form.error() {
            draw_text(&error.to_string(), x, y + 86.0, 20.0, RED);
        }
        draw_text("Enter to confirm, Esc to quit", x, y + 116.0, 16.0, GRAY);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
