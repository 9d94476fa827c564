use clap::Parser;
use client::network;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name; the server picks one when omitted
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Fire at a random opponent every N milliseconds (0 disables)
    #[arg(short = 'f', long, default_value = "0")]
    fire_interval_ms: u64,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let fire_interval = match args.fire_interval_ms {
        0 => None,
        ms => {
            info!("Auto-firing every {}ms", ms);
            Some(Duration::from_millis(ms))
        }
    };

    let mut client =
        network::Client::new(&args.server, args.name, fire_interval, args.fake_ping).await?;

    client.run().await?;

    Ok(())
}
