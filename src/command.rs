//! Inbound line classification
//!
//! Turns one received line into an `InboundCommand`. Only `/list` and
//! `/quit` are commands; any other `/`-prefixed text is an ordinary chat
//! message and is broadcast verbatim.

use crate::types::strip_line_terminator;

/// A classified inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    /// Broadcast to everyone else
    Plain { text: String },
    /// Deliver to the first participant named `target`
    Private { target: String, text: String },
    /// Send the participant list back to the sender
    List,
    /// End the session
    Quit,
}

/// Classify a raw line
///
/// Returns `None` for an empty line (after stripping one trailing line
/// terminator); the caller should just read the next one.
pub fn parse_line(raw: &str) -> Option<InboundCommand> {
    let line = strip_line_terminator(raw);

    if line.is_empty() {
        return None;
    }

    if line.starts_with("/list") {
        return Some(InboundCommand::List);
    }

    if line.starts_with("/quit") {
        return Some(InboundCommand::Quit);
    }

    if let Some(rest) = line.strip_prefix('@') {
        return Some(parse_private(rest));
    }

    Some(InboundCommand::Plain {
        text: line.to_string(),
    })
}

/// Split `target text...` (the part after `@`)
fn parse_private(rest: &str) -> InboundCommand {
    let trimmed = rest.trim_start();
    let target_len = trimmed
        .find(char::is_whitespace)
        .unwrap_or(trimmed.len());
    let target = &trimmed[..target_len];

    // Body starts after the first space following the target token
    let after_target = &trimmed[target_len..];
    let text = match after_target.find(' ') {
        Some(pos) => &after_target[pos + 1..],
        None => "",
    };

    InboundCommand::Private {
        target: target.to_string(),
        text: text.to_string(),
    }
}
