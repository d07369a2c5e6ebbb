use clap::Parser;
use log::{error, info};
use server::game::GameSession;
use server::network::Server;
use shared::DEFAULT_PORT;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let tick_duration = Duration::from_secs_f32(1.0 / args.tick_rate.max(1) as f32);
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting Pong server on {} at {}Hz", address, args.tick_rate);

    let mut server = Server::bind(&address, tick_duration, GameSession::new()).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
