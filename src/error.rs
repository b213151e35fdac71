//! Error types for the chat server
//!
//! Defines application-level errors, registry errors and delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

use crate::types::ClientId;

/// Application-level errors
///
/// Every variant is scoped to a single connection (or to startup); none of
/// them takes the server down once it is listening.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error on a socket or file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound line framing failed (line too long or IO during decode)
    #[error("Line codec error: {0}")]
    Codec(#[from] LinesCodecError),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Registry actor failure
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Connection closed before a display name was supplied
    #[error("Connection closed during handshake")]
    HandshakeFailed,
}

/// Client registry errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A participant with this handle is already registered
    #[error("Duplicate handle: {0}")]
    DuplicateHandle(ClientId),

    /// The registry actor has stopped
    #[error("Registry closed")]
    Closed,
}

/// Message delivery errors
///
/// Occurs when the recipient's outbound mailbox cannot take the text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The recipient is not draining its mailbox
    #[error("Mailbox full")]
    Full,
}
