//! Multi-client TCP Chat Server Library
//!
//! A line-oriented chat service built on tokio: clients connect over TCP,
//! pick a nickname, then chat with everyone else connected.
//!
//! # Features
//! - Nickname handshake
//! - Broadcast chat messages
//! - Private messages (`@name text`)
//! - Participant listing (`/list`) and leaving (`/quit`)
//! - Join/leave notices
//! - Append-only chat history file
//!
//! # Architecture
//! - `ClientRegistry` is an actor task owning the live participant list;
//!   every add/remove/snapshot goes through its command channel
//! - Each connection runs a `ConnectionSession` task that drives the
//!   handshake and receive loop, with a writer task draining its mailbox
//! - `MessageRouter` turns parsed lines into deliveries on registry
//!   snapshots, so slow recipients never hold up the registry
//!
//! # Example
//! ```ignore
//! use tcp_chat::{ChatServer, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tcp_chat::AppError> {
//!     let server = ChatServer::bind(Config::default()).await?;
//!     server.run(async { let _ = tokio::signal::ctrl_c().await; }).await
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod history;
pub mod participant;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use command::{parse_line, InboundCommand};
pub use config::Config;
pub use error::{AppError, DeliveryError, RegistryError};
pub use history::{ChatHistory, DiscardHistory, FileHistory, MemoryHistory};
pub use participant::{ConnectionHandle, DeliveryResult, Participant};
pub use registry::ClientRegistry;
pub use router::{MessageRouter, RouteReport, RouterOutcome};
pub use server::ChatServer;
pub use session::{ConnectionSession, SessionOptions, SessionState};
pub use types::ClientId;
