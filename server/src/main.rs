use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};
use shared::token::{encode_token, parse_ip};
use shared::{DEFAULT_BOUNDS, DEFAULT_PORT, PLAYER_SIZE};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to (also accepts all, localhost, lan)
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Playfield width
    #[arg(long, default_value_t = DEFAULT_BOUNDS.0)]
    width: u16,

    /// Playfield height
    #[arg(long, default_value_t = DEFAULT_BOUNDS.1)]
    height: u16,

    /// Maximum concurrent players (defaults to a quarter of the playfield cells)
    #[arg(short, long)]
    max_players: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = SocketAddr::new(parse_ip(&args.host)?, args.port);

    let config = ServerConfig {
        address,
        bounds: (args.width, args.height),
        player_size: PLAYER_SIZE,
        max_players: args.max_players,
        ..ServerConfig::default()
    };

    let server = Server::bind(config).await?;
    let local_addr = server.local_addr()?;
    info!("Server listening on {}", local_addr);
    info!("server token: {}", encode_token(local_addr, Some(DEFAULT_PORT)));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
