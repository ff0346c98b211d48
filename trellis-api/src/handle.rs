//! Page handles - opaque identifiers for server-resident page instances.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one server-resident page instance.
///
/// A handle is minted when the page is created, travels to the client, and
/// comes back with every subsequent interaction. It is only ever compared
/// for equality; nothing may parse meaning out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(Uuid);

impl Handle {
    /// Mint a fresh, globally unique handle.
    pub fn mint() -> Self {
        Handle(Uuid::new_v4())
    }

    /// Parse a handle from its wire form. `None` if the token is malformed.
    pub fn parse(token: &str) -> Option<Self> {
        Uuid::parse_str(token).ok().map(Handle)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a node in a page's component tree.
///
/// Node ids are stable across builds of the same tree, so an update
/// operation can address the element it replaces on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "el{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_round_trip() {
        let a = Handle::mint();
        let b = Handle::mint();
        assert_ne!(a, b);
        assert_eq!(Handle::parse(&a.to_string()), Some(a));
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert_eq!(Handle::parse("not-a-handle"), None);
    }
}
