//! # Membership Events
//!
//! Defines the events that flow through the bus and the keys they are
//! routed by.

use serde::{Deserialize, Serialize};
use shared_types::{ConnectionId, DiscoveryKey, IdentityClaim, RosterSnapshot};
use std::fmt;

/// What happened to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// An authorized peer connection became active.
    Join,
    /// An active peer connection closed.
    Leave,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join => write!(f, "join"),
            Self::Leave => write!(f, "leave"),
        }
    }
}

/// Routing key: subscribers receive only events with exactly this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub kind: EventKind,
    pub resource: DiscoveryKey,
}

impl EventKey {
    #[must_use]
    pub fn new(kind: EventKind, resource: DiscoveryKey) -> Self {
        Self { kind, resource }
    }

    #[must_use]
    pub fn join(resource: DiscoveryKey) -> Self {
        Self::new(EventKind::Join, resource)
    }

    #[must_use]
    pub fn leave(resource: DiscoveryKey) -> Self {
        Self::new(EventKind::Leave, resource)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.resource)
    }
}

/// A peer joined or left a resource.
///
/// `roster` is the resource's membership after the change, as an owned
/// copy. It is empty on the leave event of the last member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipEvent {
    pub kind: EventKind,
    pub resource: DiscoveryKey,
    pub connection_id: ConnectionId,
    pub peer: IdentityClaim,
    pub roster: RosterSnapshot,
}

impl MembershipEvent {
    #[must_use]
    pub fn join(
        resource: DiscoveryKey,
        connection_id: ConnectionId,
        peer: IdentityClaim,
        roster: RosterSnapshot,
    ) -> Self {
        Self {
            kind: EventKind::Join,
            resource,
            connection_id,
            peer,
            roster,
        }
    }

    #[must_use]
    pub fn leave(
        resource: DiscoveryKey,
        connection_id: ConnectionId,
        peer: IdentityClaim,
        roster: RosterSnapshot,
    ) -> Self {
        Self {
            kind: EventKind::Leave,
            resource,
            connection_id,
            peer,
            roster,
        }
    }

    /// The key this event is routed by.
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey::new(self.kind, self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key_mapping() {
        let resource = DiscoveryKey::new([3u8; 32]);
        let event = MembershipEvent::join(
            resource,
            ConnectionId::from("conn1"),
            IdentityClaim::new("abc123"),
            RosterSnapshot::new(),
        );
        assert_eq!(event.key(), EventKey::join(resource));
        assert_ne!(event.key(), EventKey::leave(resource));
    }

    #[test]
    fn test_event_key_display() {
        let resource = DiscoveryKey::new([0u8; 32]);
        let key = EventKey::leave(resource);
        assert_eq!(key.to_string(), format!("leave:{}", resource.encode()));
    }

    #[test]
    fn test_event_serializes_resource_as_hex() {
        let resource = DiscoveryKey::new([1u8; 32]);
        let event = MembershipEvent::leave(
            resource,
            ConnectionId::from("conn1"),
            IdentityClaim::new("abc123"),
            RosterSnapshot::new(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "Leave");
        assert_eq!(json["resource"], resource.encode());
        assert_eq!(json["peer"]["key"], "abc123");
    }
}
