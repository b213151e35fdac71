//! Terminal client for the chat server
//!
//! Prints everything the server sends and forwards each non-empty stdin
//! line. Sending `/quit` ends the client.

use std::env;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Receive buffer size
const BUFFER_SIZE: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let stream = TcpStream::connect(&addr).await?;
    debug!("Connected to {}", addr);
    let (reader, mut writer) = stream.into_split();

    let mut receive_task = tokio::spawn(receive_loop(reader));
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = &mut receive_task => {
                println!("Disconnected from server.");
                return Ok(());
            }
            line = input.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.is_empty() {
                    continue;
                }

                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;

                if line.starts_with("/quit") {
                    break;
                }
            }
        }
    }

    let _ = writer.shutdown().await;
    println!("You have left the chat.");
    Ok(())
}

/// Print server output as it arrives until the server closes the connection
async fn receive_loop(mut reader: OwnedReadHalf) {
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut stdout = std::io::stdout();

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                let _ = stdout.write_all(&buffer[..n]);
                let _ = stdout.flush();
            }
            Err(e) => {
                debug!("Read failed: {}", e);
                break;
            }
        }
    }
}
