use clap::Parser;
use env_logger::Env;
use log::{error, info};
use server::config::{GameConfig, ServerConfig};
use server::network::Server;
use std::time::Duration;

/// Authoritative server for the two-player arena duel.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
    /// Simulation tick period in milliseconds
    #[clap(short, long, default_value = "2")]
    tick_ms: u64,
    /// Player slots (1 or 2)
    #[clap(short, long, default_value_t = shared::MAX_PLAYERS)]
    capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        game: GameConfig {
            tick_interval: Duration::from_millis(args.tick_ms.max(1)),
            max_players: args.capacity,
            ..GameConfig::default()
        },
        ..ServerConfig::default()
    };

    info!(
        "Starting server on {} with {}ms ticks and {} slots",
        config.address(),
        args.tick_ms.max(1),
        args.capacity
    );

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return Err(e.into());
        }
    };

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        })
        .await?;

    Ok(())
}
