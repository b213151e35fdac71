//! TCP Chat Server - Entry Point
//!
//! Loads configuration, binds the listener and serves until Ctrl-C.

use std::env;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tcp_chat::{ChatServer, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=tcp_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tcp_chat=info")),
        )
        .init();

    // Config file from TCP_CHAT_CONFIG, bind address from the command line
    let mut config = Config::from_env()?;
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }

    let server = ChatServer::bind(config).await?;

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Bye");
    Ok(())
}
