use clap::Parser;
use client::announcements::{AnnouncementPool, DEFAULT_LIFETIME};
use client::connect::ConnectForm;
use client::game::ClientSession;
use client::input::{InputAction, InputManager};
use client::network::{NetworkClient, NetworkEvent};
use client::rendering::Renderer;
use log::{error, info, warn};
use macroquad::prelude::*;
use std::net::SocketAddr;

/// Longest frame the prediction is allowed to step over
const MAX_FRAME_TIME: f32 = 1.0 / 20.0;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to; asks interactively when omitted
    #[arg(short = 's', long)]
    server: Option<SocketAddr>,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Pong".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

/// Returns `None` if the player quit instead of connecting.
async fn ask_for_server(renderer: &Renderer) -> Option<SocketAddr> {
    let mut form = ConnectForm::new();
    loop {
        while let Some(c) = get_char_pressed() {
            form.push_char(c);
        }
        if is_key_pressed(KeyCode::Backspace) {
            form.backspace();
        }
        if is_key_pressed(KeyCode::Enter) || is_key_pressed(KeyCode::KpEnter) {
            match form.submit() {
                Ok(Some(addr)) => return Some(addr),
                Ok(None) => {}
                Err(e) => warn!("{}", e),
            }
        }
        if is_key_pressed(KeyCode::Escape) {
            return None;
        }

        renderer.render_connect_form(&form);
        next_frame().await;
    }
}

async fn run_game(addr: SocketAddr, renderer: &Renderer) -> Result<(), Box<dyn std::error::Error>> {
    info!("Connecting to {}", addr);
    let mut network = NetworkClient::connect(addr)?;
    let mut session = ClientSession::new();
    let mut input = InputManager::new();
    let mut announcements = AnnouncementPool::new();
    let mut status = format!("Connecting to {}...", addr);

    loop {
        for event in network.poll_events() {
            match event {
                NetworkEvent::Connected => status = format!("Connected to {}", addr),
                NetworkEvent::PacketReceived(packet) => session.apply_packet(packet),
                NetworkEvent::Disconnected { reason } => {
                    status = format!("Disconnected: {}", reason);
                    session.reset();
                    announcements.clear();
                }
            }
        }

        for action in input.update() {
            match action {
                InputAction::MovingUp(active) => session.set_moving_up(active),
                InputAction::MovingDown(active) => session.set_moving_down(active),
                InputAction::ToggleReady => session.toggle_ready(),
                InputAction::Quit => return Ok(()),
            }
        }

        for packet in session.drain_outgoing() {
            network.send(packet);
        }
        for notice in session.drain_notices() {
            announcements.spawn(notice, DEFAULT_LIFETIME);
        }

        let dt = get_frame_time().min(MAX_FRAME_TIME);
        session.update(dt);
        announcements.animate(dt);

        renderer.render(&session, &announcements, &status);
        next_frame().await;
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let renderer = Renderer::new();

    info!("Starting client...");
    info!("Controls: W/S or arrows to move, Space to ready up, Esc to quit");

    let addr = match args.server {
        Some(addr) => addr,
        None => match ask_for_server(&renderer).await {
            Some(addr) => addr,
            None => return,
        },
    };

    if let Err(e) = run_game(addr, &renderer).await {
        error!("Client error: {}", e);
    }
}
