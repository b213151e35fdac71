//! Connection handle and participant definitions
//!
//! A `ConnectionHandle` is the opaque per-connection address used for
//! delivery; a `Participant` pairs it with the display name chosen during
//! the handshake.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::DeliveryError;
use crate::types::ClientId;

/// Outcome of delivering one text to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Text was queued on the recipient's outbound mailbox
    Delivered,
    /// Mailbox full or gone
    Failed(DeliveryError),
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered)
    }
}

/// Opaque handle for a live connection
///
/// Holds the connection's identity and the sending half of its outbound
/// mailbox. Cloning is cheap; equality is by identity only.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ClientId,
    outbox: mpsc::Sender<String>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh ID around the given mailbox sender
    pub fn new(outbox: mpsc::Sender<String>) -> Self {
        Self {
            id: ClientId::new(),
            outbox,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Deliver a text to this connection
    ///
    /// Never waits: a recipient whose mailbox is full gets nothing and the
    /// caller moves on to the next one.
    pub fn deliver(&self, text: impl Into<String>) -> DeliveryResult {
        match self.outbox.try_send(text.into()) {
            Ok(()) => DeliveryResult::Delivered,
            Err(TrySendError::Full(_)) => DeliveryResult::Failed(DeliveryError::Full),
            Err(TrySendError::Closed(_)) => DeliveryResult::Failed(DeliveryError::ChannelClosed),
        }
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

/// Registered chat participant
#[derive(Debug, Clone)]
pub struct Participant {
    /// Connection this participant is reachable through
    pub handle: ConnectionHandle,
    /// Display name (not required to be unique)
    pub name: String,
}

impl Participant {
    pub fn new(handle: ConnectionHandle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.handle.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_to_open_mailbox() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(tx);

        assert_eq!(handle.deliver("hello"), DeliveryResult::Delivered);
        assert_eq!(rx.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_deliver_to_closed_mailbox() {
        let (tx, rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(tx);
        drop(rx);

        let result = handle.deliver("hello");
        assert_eq!(result, DeliveryResult::Failed(DeliveryError::ChannelClosed));
        assert!(!result.is_delivered());
    }

    #[test]
    fn test_deliver_to_full_mailbox_does_not_wait() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(tx);

        assert_eq!(handle.deliver("first"), DeliveryResult::Delivered);
        assert_eq!(
            handle.deliver("second"),
            DeliveryResult::Failed(DeliveryError::Full)
        );

        // Room again once the recipient catches up
        assert_eq!(rx.try_recv().unwrap(), "first");
        assert_eq!(handle.deliver("third"), DeliveryResult::Delivered);
    }

    #[test]
    fn test_handle_equality_by_id() {
        let (tx, _rx) = mpsc::channel(4);
        let a = ConnectionHandle::new(tx.clone());
        let b = ConnectionHandle::new(tx);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_participant_id() {
        let (tx, _rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(tx);
        let id = handle.id();
        let participant = Participant::new(handle, "Alice");

        assert_eq!(participant.id(), id);
        assert_eq!(participant.name, "Alice");
    }
}
