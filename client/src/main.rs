use clap::Parser;
use client::callbacks::{on_message, on_player_join, on_player_leave, on_player_move};
use client::network::{Client, PacketSender};
use log::{info, warn};
use parking_lot::Mutex;
use rand::Rng;
use shared::token::parse_connection_address;
use shared::{Identity, Packet, PlayerAttributes, DEFAULT_BOUNDS, DEFAULT_PORT};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server to connect to, as ip[:port] or a server token
    address: String,

    /// Move the local player by a random step every this many milliseconds
    #[arg(short, long)]
    wander_ms: Option<u64>,

    /// Largest step taken per move when wandering
    #[arg(long, default_value_t = 8)]
    step: u16,
}

type Players = Arc<Mutex<HashMap<Identity, PlayerAttributes>>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = parse_connection_address(&args.address, DEFAULT_PORT)?;

    info!("Starting client...");
    info!("Connecting to: {}", address);

    let players: Players = Arc::new(Mutex::new(HashMap::new()));
    let mut client = Client::new(address);
    register_callbacks(&client, &players);

    client.start().await?;

    if let Some(period) = args.wander_ms {
        tokio::spawn(wander(
            client.sender(),
            Arc::clone(&players),
            Duration::from_millis(period.max(1)),
            args.step,
        ));
    }

    tokio::select! {
        _ = client.closed() => info!("Server closed the connection"),
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
    }

    Ok(())
}

/// Mirrors the room into `players` and logs what happens in it.
fn register_callbacks(client: &Client, players: &Players) {
    let joined = Arc::clone(players);
    client.add_callback(on_player_join(move |identity, attributes| {
        if identity.is_main() {
            info!("joined at {:?} with color {:?}", attributes.position, attributes.color);
        } else {
            info!("player {} joined at {:?}", identity, attributes.position);
        }
        joined.lock().insert(identity, attributes);
    }));

    let left = Arc::clone(players);
    client.add_callback(on_player_leave(move |identity| {
        if left.lock().remove(&identity).is_some() {
            info!("player {} left", identity);
        } else {
            warn!("leave for unknown player {}", identity);
        }
    }));

    let moved = Arc::clone(players);
    client.add_callback(on_player_move(move |identity, (x, y)| {
        match moved.lock().get_mut(&identity) {
            Some(attributes) => attributes.position = (x, y),
            None => warn!("move for unknown player {}", identity),
        }
    }));

    client.add_callback(on_message(|identity, message| {
        info!("<{}> {}", identity, message);
    }));

    client.add_callback(Box::new(|identity: Identity, packet: Packet| {
        warn!("unhandled packet from ({}): {:?}", identity, packet);
        None
    }));
}

/// Takes random steps from the local player's position, staying in bounds.
///
/// Our own moves are not echoed back, so the local copy is updated directly.
async fn wander(sender: PacketSender, players: Players, period: Duration, step: u16) {
    let mut interval = tokio::time::interval(period);
    let step = i32::from(step.max(1));

    loop {
        interval.tick().await;

        let next = {
            let mut players = players.lock();
            let Some(me) = players.get_mut(&Identity::MAIN) else {
                continue;
            };

            let mut rng = rand::thread_rng();
            let max_x = i32::from(DEFAULT_BOUNDS.0) - i32::from(me.size.0);
            let max_y = i32::from(DEFAULT_BOUNDS.1) - i32::from(me.size.1);
            let x = (i32::from(me.position.0) + rng.gen_range(-step..=step)).clamp(0, max_x.max(0));
            let y = (i32::from(me.position.1) + rng.gen_range(-step..=step)).clamp(0, max_y.max(0));

            me.position = (x as u16, y as u16);
            me.position
        };

        sender.update_position(next.0, next.1);
    }
}
