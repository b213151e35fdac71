//! Basic type definitions for the chat server
//!
//! Provides:
//! - `ClientId`: UUID-based unique connection identifier
//! - display name limits and line helpers

use uuid::Uuid;

/// Maximum display name length in bytes
pub const MAX_NAME_LEN: usize = 31;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Unique for the lifetime of a connection and used as the
/// registry key, so it implements Hash and Eq.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Turn a handshake line into a display name
///
/// Truncates to `MAX_NAME_LEN` bytes without splitting a UTF-8 character.
pub fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_string();
    }

    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Remove a single trailing `\n`, `\r\n` or `\r`.
pub fn strip_line_terminator(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .or_else(|| line.strip_suffix('\r'))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_unique() {
        let id1 = ClientId::new();
        let id2 = ClientId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_strip_line_terminator() {
        assert_eq!(strip_line_terminator("Alice\n"), "Alice");
        assert_eq!(strip_line_terminator("Alice\r\n"), "Alice");
        assert_eq!(strip_line_terminator("Alice\r"), "Alice");
        assert_eq!(strip_line_terminator("Alice"), "Alice");
    }

    #[test]
    fn test_strip_only_one_terminator() {
        assert_eq!(strip_line_terminator("Alice\n\n"), "Alice\n");
    }

    #[test]
    fn test_short_name_unchanged() {
        assert_eq!(truncate_name("Alice"), "Alice");
        assert_eq!(truncate_name(""), "");
    }

    #[test]
    fn test_long_name_truncated() {
        let long = "x".repeat(40);
        assert_eq!(truncate_name(&long).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        // 15 two-byte characters = 30 bytes, then a 3-byte character straddles the limit
        let name = format!("{}€abc", "é".repeat(15));
        let truncated = truncate_name(&name);
        assert_eq!(truncated, "é".repeat(15));
        assert!(truncated.len() <= MAX_NAME_LEN);
    }
}
