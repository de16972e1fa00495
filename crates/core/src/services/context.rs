//! Actor contexts passed into the services.
//!
//! The host owns identity and permissions; services only ever see an
//! explicit context with capability checks, never ambient global state.

use std::collections::HashSet;

/// Capabilities an actor may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// May submit an account request.
    RequestAccount,
    /// May review account requests (hold, reject, accept, complete).
    ConfirmAccount,
}

/// An authenticated actor, as resolved by the host.
#[derive(Debug, Clone)]
pub struct ActorContext {
    /// Host-side actor id.
    pub id: String,
    /// Display name.
    pub name: String,
    capabilities: HashSet<Capability>,
}

impl ActorContext {
    /// Create a context with no capabilities.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities: HashSet::new(),
        }
    }

    /// Grant a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Whether the actor holds the given capability.
    ///
    /// A blocked or anonymous requester simply lacks `RequestAccount`.
    #[must_use]
    pub fn is_authorized_for(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        let actor = ActorContext::new("user1", "Alice").with_capability(Capability::RequestAccount);

        assert!(actor.is_authorized_for(Capability::RequestAccount));
        assert!(!actor.is_authorized_for(Capability::ConfirmAccount));
    }
}
