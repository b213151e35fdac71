//! ClientRegistry actor implementation
//!
//! A single actor task owns the ordered list of live participants. Every
//! add/remove/snapshot/lookup is a command on one mpsc channel, so all of
//! them are serialized without any caller-visible locking.
//!
//! Snapshots are copies: callers deliver to recipients after the actor has
//! already moved on, so a slow recipient never holds up registry mutation.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::RegistryError;
use crate::participant::{ConnectionHandle, Participant};
use crate::types::ClientId;

/// Channel buffer size for registry commands
const REGISTRY_CHANNEL_SIZE: usize = 256;

/// Commands sent from registry handles to the actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a participant
    Add {
        participant: Participant,
        reply: oneshot::Sender<Result<(), RegistryError>>,
    },
    /// Unregister by connection ID
    Remove {
        client_id: ClientId,
        reply: oneshot::Sender<bool>,
    },
    /// Copy out all participants in registry order
    Snapshot {
        reply: oneshot::Sender<Vec<Participant>>,
    },
    /// First participant with the given display name
    FindByName {
        name: String,
        reply: oneshot::Sender<Option<ConnectionHandle>>,
    },
}

/// The actor owning registry state
struct RegistryActor {
    /// Live participants in join order
    participants: Vec<Participant>,
    /// Command receiver channel
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl RegistryActor {
    fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            participants: Vec::new(),
            receiver,
        }
    }

    /// Run until every `ClientRegistry` handle has been dropped
    async fn run(mut self) {
        debug!("ClientRegistry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("ClientRegistry shutting down");
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        // A dropped reply receiver means the caller gave up; nothing to do.
        match cmd {
            RegistryCommand::Add { participant, reply } => {
                let _ = reply.send(self.handle_add(participant));
            }
            RegistryCommand::Remove { client_id, reply } => {
                let _ = reply.send(self.handle_remove(client_id));
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(self.participants.clone());
            }
            RegistryCommand::FindByName { name, reply } => {
                let found = self
                    .participants
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| p.handle.clone());
                let _ = reply.send(found);
            }
        }
    }

    fn handle_add(&mut self, participant: Participant) -> Result<(), RegistryError> {
        let client_id = participant.id();
        if self.participants.iter().any(|p| p.id() == client_id) {
            return Err(RegistryError::DuplicateHandle(client_id));
        }

        debug!("Registered {} as {}", client_id, participant.name);
        self.participants.push(participant);
        debug!("Total participants: {}", self.participants.len());
        Ok(())
    }

    fn handle_remove(&mut self, client_id: ClientId) -> bool {
        let Some(pos) = self.participants.iter().position(|p| p.id() == client_id) else {
            return false;
        };

        // Vec::remove keeps join order for /list
        let participant = self.participants.remove(pos);
        debug!("Unregistered {} ({})", client_id, participant.name);
        debug!("Total participants: {}", self.participants.len());
        true
    }
}

/// Handle to the registry actor
///
/// Cheap to clone; every clone talks to the same actor. The actor stops
/// once the last handle is dropped.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    sender: mpsc::Sender<RegistryCommand>,
}

impl ClientRegistry {
    /// Spawn the registry actor on the current tokio runtime
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_SIZE);
        tokio::spawn(RegistryActor::new(receiver).run());
        Self { sender }
    }

    /// Register a participant
    ///
    /// Fails with `DuplicateHandle` if its connection is already registered.
    pub async fn add(&self, participant: Participant) -> Result<(), RegistryError> {
        self.request(|reply| RegistryCommand::Add { participant, reply })
            .await?
    }

    /// Unregister a connection
    ///
    /// Returns whether an entry was removed. Removing an absent handle is a
    /// no-op.
    pub async fn remove(&self, client_id: ClientId) -> Result<bool, RegistryError> {
        self.request(|reply| RegistryCommand::Remove { client_id, reply })
            .await
    }

    /// Point-in-time copy of all participants in join order
    pub async fn snapshot(&self) -> Result<Vec<Participant>, RegistryError> {
        self.request(|reply| RegistryCommand::Snapshot { reply })
            .await
    }

    /// Handle of the first participant (in join order) named `name`
    pub async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ConnectionHandle>, RegistryError> {
        let name = name.to_string();
        self.request(|reply| RegistryCommand::FindByName { name, reply })
            .await
    }

    /// Number of registered participants
    pub async fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.snapshot().await?.len())
    }

    /// Send a command and wait for its reply
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| RegistryError::Closed)?;
        response.await.map_err(|_| RegistryError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(name: &str) -> (Participant, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        (Participant::new(ConnectionHandle::new(tx), name), rx)
    }

    fn ids(participants: &[Participant]) -> Vec<ClientId> {
        participants.iter().map(Participant::id).collect()
    }

    #[tokio::test]
    async fn test_add_and_snapshot_in_join_order() {
        let registry = ClientRegistry::spawn();
        let (a, _ra) = participant("A");
        let (b, _rb) = participant("B");
        let (c, _rc) = participant("C");

        registry.add(a.clone()).await.unwrap();
        registry.add(b.clone()).await.unwrap();
        registry.add(c.clone()).await.unwrap();

        let snapshot = registry.snapshot().await.unwrap();
        assert_eq!(ids(&snapshot), vec![a.id(), b.id(), c.id()]);
        assert_eq!(registry.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_handle_rejected() {
        let registry = ClientRegistry::spawn();
        let (a, _ra) = participant("A");

        registry.add(a.clone()).await.unwrap();
        let err = registry
            .add(Participant::new(a.handle.clone(), "Other"))
            .await
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateHandle(a.id()));
        assert_eq!(registry.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = ClientRegistry::spawn();
        let (a, _ra) = participant("A");
        registry.add(a.clone()).await.unwrap();

        assert!(registry.remove(a.id()).await.unwrap());
        assert!(!registry.remove(a.id()).await.unwrap());
        assert!(!registry.remove(ClientId::new()).await.unwrap());
        assert!(registry.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_preserves_order_of_others() {
        let registry = ClientRegistry::spawn();
        let (a, _ra) = participant("A");
        let (b, _rb) = participant("B");
        let (c, _rc) = participant("C");
        for p in [&a, &b, &c] {
            registry.add(p.clone()).await.unwrap();
        }

        registry.remove(a.id()).await.unwrap();

        let snapshot = registry.snapshot().await.unwrap();
        assert_eq!(ids(&snapshot), vec![b.id(), c.id()]);
    }

    #[tokio::test]
    async fn test_snapshot_tracks_add_remove_sequence() {
        let registry = ClientRegistry::spawn();
        let mut live: Vec<Participant> = Vec::new();
        let mut receivers = Vec::new();

        // Interleave adds and removes, checking the snapshot after each step
        for round in 0..20 {
            let (p, rx) = participant(&format!("user{round}"));
            receivers.push(rx);
            registry.add(p.clone()).await.unwrap();
            live.push(p);

            if round % 3 == 2 {
                let gone = live.remove(round % live.len());
                assert!(registry.remove(gone.id()).await.unwrap());
            }

            let snapshot = registry.snapshot().await.unwrap();
            assert_eq!(ids(&snapshot), ids(&live));
        }
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let registry = ClientRegistry::spawn();
        let (a, _ra) = participant("A");
        registry.add(a.clone()).await.unwrap();

        let found = registry.find_by_name("A").await.unwrap();
        assert_eq!(found.map(|h| h.id()), Some(a.id()));
        assert!(registry.find_by_name("Z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_name_returns_first_match() {
        let registry = ClientRegistry::spawn();
        let (first, _r1) = participant("Twin");
        let (second, _r2) = participant("Twin");
        registry.add(first.clone()).await.unwrap();
        registry.add(second.clone()).await.unwrap();

        let found = registry.find_by_name("Twin").await.unwrap().unwrap();
        assert_eq!(found.id(), first.id());

        // With the first gone, the second one is found
        registry.remove(first.id()).await.unwrap();
        let found = registry.find_by_name("Twin").await.unwrap().unwrap();
        assert_eq!(found.id(), second.id());
    }

    #[tokio::test]
    async fn test_concurrent_adds_from_many_tasks() {
        let registry = ClientRegistry::spawn();
        let mut tasks = Vec::new();

        for i in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (p, rx) = participant(&format!("user{i}"));
                registry.add(p.clone()).await.unwrap();
                (p.id(), rx)
            }));
        }

        let mut added = Vec::new();
        for task in tasks {
            added.push(task.await.unwrap());
        }

        let snapshot = registry.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 32);
        for (id, _rx) in &added {
            assert!(snapshot.iter().any(|p| p.id() == *id));
        }
    }
}
