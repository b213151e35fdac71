//! Message routing
//!
//! Decides who receives what for each `InboundCommand`, delivers through
//! the recipients' connection handles and appends to the chat history.
//! Delivery always works on a registry snapshot and never waits on a
//! recipient; one failing or stalled recipient never stops delivery to
//! the rest.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::command::InboundCommand;
use crate::error::RegistryError;
use crate::history::ChatHistory;
use crate::participant::{ConnectionHandle, DeliveryResult, Participant};
use crate::registry::ClientRegistry;
use crate::types::ClientId;

/// What the session should do after a command has been routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterOutcome {
    /// Keep reading lines
    Continue,
    /// Leave the receive loop
    Disconnect,
}

/// Per-recipient delivery outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ClientId,
    pub result: DeliveryResult,
}

/// Result of routing one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteReport {
    pub outcome: RouterOutcome,
    pub deliveries: Vec<Delivery>,
}

impl RouteReport {
    fn new(outcome: RouterOutcome, deliveries: Vec<Delivery>) -> Self {
        Self {
            outcome,
            deliveries,
        }
    }

    /// Deliveries that failed
    pub fn failures(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|d| !d.result.is_delivered())
    }
}

/// Format a broadcast chat line
pub fn format_plain(sender: &str, text: &str) -> String {
    format!("{}: {}", sender, text)
}

/// Format a private message
pub fn format_private(sender: &str, text: &str) -> String {
    format!("[PM from {}]: {}", sender, text)
}

/// Format the join notice
pub fn format_join(name: &str) -> String {
    format!("{} has joined the chat!", name)
}

/// Format the leave notice
pub fn format_leave(name: &str) -> String {
    format!("{} has left the chat.", name)
}

/// Format the `/list` response
pub fn format_user_list(participants: &[Participant]) -> String {
    let mut text = String::from("Connected users:\n");
    for participant in participants {
        text.push_str(&participant.name);
        text.push('\n');
    }
    text
}

/// Routes commands between participants
#[derive(Clone)]
pub struct MessageRouter {
    registry: ClientRegistry,
    history: Arc<dyn ChatHistory>,
}

impl MessageRouter {
    pub fn new(registry: ClientRegistry, history: Arc<dyn ChatHistory>) -> Self {
        Self { registry, history }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Route one command sent by `sender`
    pub async fn route(
        &self,
        sender: &Participant,
        cmd: InboundCommand,
    ) -> Result<RouteReport, RegistryError> {
        match cmd {
            InboundCommand::Plain { text } => {
                let message = format_plain(&sender.name, &text);
                let deliveries = self.announce(sender.id(), &message).await?;
                Ok(RouteReport::new(RouterOutcome::Continue, deliveries))
            }
            InboundCommand::Private { target, text } => {
                let deliveries = self.route_private(sender, &target, &text).await?;
                Ok(RouteReport::new(RouterOutcome::Continue, deliveries))
            }
            InboundCommand::List => {
                let participants = self.registry.snapshot().await?;
                let listing = format_user_list(&participants);
                let delivery = deliver_to(&sender.handle, listing);
                Ok(RouteReport::new(RouterOutcome::Continue, vec![delivery]))
            }
            InboundCommand::Quit => {
                debug!("{} requested quit", sender.id());
                Ok(RouteReport::new(RouterOutcome::Disconnect, Vec::new()))
            }
        }
    }

    /// Deliver `text` to every participant except `except`, then append it
    /// to the history once
    ///
    /// Used for plain broadcasts and for join/leave notices.
    pub async fn announce(
        &self,
        except: ClientId,
        text: &str,
    ) -> Result<Vec<Delivery>, RegistryError> {
        let recipients = self.registry.snapshot().await?;

        let mut deliveries = Vec::with_capacity(recipients.len());
        for recipient in recipients.iter().filter(|p| p.id() != except) {
            deliveries.push(deliver_to(&recipient.handle, text));
        }

        self.history.append(text);
        Ok(deliveries)
    }

    async fn route_private(
        &self,
        sender: &Participant,
        target: &str,
        text: &str,
    ) -> Result<Vec<Delivery>, RegistryError> {
        let Some(handle) = self.registry.find_by_name(target).await? else {
            // No feedback to the sender, and nothing is logged
            debug!("{} sent a private message to unknown '{}'", sender.id(), target);
            return Ok(Vec::new());
        };

        let message = format_private(&sender.name, text);
        let delivery = deliver_to(&handle, message.as_str());
        self.history.append(&message);
        Ok(vec![delivery])
    }
}

/// Deliver and record the outcome, logging failures
fn deliver_to(handle: &ConnectionHandle, text: impl Into<String>) -> Delivery {
    let result = handle.deliver(text);
    if let DeliveryResult::Failed(e) = &result {
        warn!("Delivery to {} failed: {}", handle.id(), e);
    }
    Delivery {
        to: handle.id(),
        result,
    }
}
