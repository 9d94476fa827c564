use clap::Parser;
use log::info;
use server::network::Server;
use shared::{GameConfig, DAMAGE_PER_HIT, MAX_HEALTH, SCORE_TO_WIN};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Bot wizards with no owning client
    #[arg(short, long, default_value = "0")]
    ghosts: usize,

    /// Ticks between full-state resync broadcasts
    #[arg(long, default_value = "60")]
    snapshot_interval: u32,

    #[arg(long, default_value_t = MAX_HEALTH)]
    max_health: i32,

    #[arg(long, default_value_t = DAMAGE_PER_HIT)]
    damage_per_hit: i32,

    /// Seconds a dead wizard waits before respawning
    #[arg(long, default_value = "4")]
    respawn_delay: f32,

    /// Seconds between a win and the return to the lobby
    #[arg(long, default_value = "7")]
    lobby_return_delay: f32,

    /// Seconds spent in the lobby before the next match
    #[arg(long, default_value = "3")]
    lobby_wait: f32,

    /// Kills needed to win a match
    #[arg(long, default_value_t = SCORE_TO_WIN)]
    score_to_win: u32,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        GameConfig {
            max_health: self.max_health,
            damage_per_hit: self.damage_per_hit,
            respawn_delay: Duration::from_secs_f32(self.respawn_delay.max(0.0)),
            lobby_return_delay: Duration::from_secs_f32(self.lobby_return_delay.max(0.0)),
            score_to_win: self.score_to_win,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);

    info!("Starting server on {}", address);
    info!(
        "Tick rate {}Hz, up to {} clients, {} ghosts",
        args.tick_rate, args.max_clients, args.ghosts
    );

    let mut server = Server::new(
        &address,
        tick_duration,
        args.max_clients,
        args.game_config(),
        args.ghosts,
    )
    .await?
    .with_snapshot_interval(args.snapshot_interval)
    .with_lobby_wait(Duration::from_secs_f32(args.lobby_wait.max(0.0)));

    server.run().await?;

    Ok(())
}
