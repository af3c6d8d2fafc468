//! Minimal WebSocket client for poking a running server by hand.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{ClientMessage, PaddleInput, Role, ServerMessage};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server WebSocket URL
    #[clap(short, long, default_value = "ws://127.0.0.1:3001")]
    url: String,
    /// Role to request: player1, player2 or spectator
    #[clap(short, long, default_value = "spectator")]
    role: String,
    /// Paddle input to send after joining: up, down or stop
    #[clap(long)]
    paddle: Option<String>,
    /// Seconds to keep listening before disconnecting
    #[clap(short, long, default_value = "5")]
    seconds: u64,
}

fn parse_lowercase<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let role: Role = parse_lowercase(&args.role)?;
    let paddle = args
        .paddle
        .as_deref()
        .map(parse_lowercase::<PaddleInput>)
        .transpose()?;

    let (socket, _) = connect_async(args.url.as_str()).await?;
    info!("Connected to {}", args.url);
    let (mut sink, mut stream) = socket.split();

    let join = ClientMessage::JoinLobby { role }.to_json()?;
    sink.send(Message::text(join)).await?;
    info!("Requested role {}", role);

    if let Some(direction) = paddle {
        let input = ClientMessage::PaddleMove { direction }.to_json()?;
        sink.send(Message::text(input)).await?;
    }

    let listen = tokio::time::sleep(Duration::from_secs(args.seconds));
    tokio::pin!(listen);
    let mut game_states = 0u64;

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match ServerMessage::from_json(text.as_str()) {
                        // Game state arrives at 60Hz; only count it.
                        Ok(ServerMessage::GameState(_)) => game_states += 1,
                        Ok(message) => info!("Received {:?}", message),
                        Err(e) => warn!("Unreadable frame: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Connection error: {}", e);
                        break;
                    }
                }
            }
            _ = &mut listen => break,
        }
    }

    info!("Received {} game state frames", game_states);
    let _ = sink.close().await;
    Ok(())
}
