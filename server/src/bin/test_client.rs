use clap::Parser;
use shared::{ClientCommand, InputKey, ServerMessage};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

/// Headless client that joins, walks around, fires a few shots and prints
/// what the server sends back.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to connect to
    #[clap(short, long, default_value = "127.0.0.1:5000")]
    server: String,
    /// Number of scripted input rounds
    #[clap(short, long, default_value = "10")]
    rounds: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.server);
    let stream = TcpStream::connect(&args.server).await?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let player_id = match lines.next_line().await? {
        Some(line) => match ServerMessage::decode(&line)? {
            ServerMessage::Welcome { player_id } => player_id,
            ServerMessage::Rejected { reason } => {
                println!("Rejected by server: {}", reason);
                return Ok(());
            }
            other => {
                println!("Unexpected first message: {:?}", other);
                return Ok(());
            }
        },
        None => {
            println!("Server closed the connection");
            return Ok(());
        }
    };
    println!("Joined as player {}", player_id);

    // Alternate between walking up and down while firing
    let script = [InputKey::Up, InputKey::Down];
    for round in 0..args.rounds {
        let key = script[round as usize % script.len()];
        for command in [
            ClientCommand::Press(key),
            ClientCommand::Press(InputKey::Fire),
        ] {
            writer.write_all(format!("{}\n", command).as_bytes()).await?;
        }

        drain_messages(&mut lines, player_id, Duration::from_millis(200)).await?;

        for command in [
            ClientCommand::Release(key),
            ClientCommand::Release(InputKey::Fire),
        ] {
            writer.write_all(format!("{}\n", command).as_bytes()).await?;
        }

        drain_messages(&mut lines, player_id, Duration::from_millis(50)).await?;
    }

    println!("Done, disconnecting");
    Ok(())
}

/// Reads for `window`, printing control events as they arrive and the last
/// snapshot at the end.
async fn drain_messages(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    player_id: u32,
    window: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut latest = None;
    let deadline = Instant::now() + window;

    while let Ok(line) = timeout_at(deadline, lines.next_line()).await {
        let Some(line) = line? else {
            println!("Server closed the connection");
            break;
        };

        match ServerMessage::decode(&line) {
            Ok(ServerMessage::Snapshot(snapshot)) => latest = Some(snapshot),
            Ok(other) => println!("Control event: {:?}", other),
            Err(e) => println!("Failed to decode line: {}", e),
        }
    }

    if let Some(snapshot) = latest {
        println!("Tick {}: {} players", snapshot.tick, snapshot.players.len());
        for player in &snapshot.players {
            let marker = if player.id == player_id { "*" } else { " " };
            println!(
                " {} Player {}: pos=({}, {}), health={}, projectiles={}",
                marker,
                player.id,
                player.x,
                player.y,
                player.health,
                player.projectiles.len()
            );
        }
    }

    Ok(())
}
