//! # Membership Registry
//!
//! Tracks which authorized connections are present on each resource and
//! publishes a join or leave event whenever that changes.
//!
//! The roster lock is released before an event is published. Handlers
//! receive an owned snapshot and may call back into the registry.

use std::sync::Arc;

use parking_lot::Mutex;
use shared_bus::{EventKind, EventPublisher, InMemoryEventBus, MembershipEvent};
use shared_types::{ConnectionId, DiscoveryKey, IdentityClaim, RosterSnapshot};
use swarm_telemetry::{log_peer_event, MEMBERSHIP_EVENTS, MEMBERS_ACTIVE};

use crate::domain::Roster;

/// Per-resource membership with change notification.
pub struct MembershipRegistry {
    roster: Mutex<Roster>,
    bus: Arc<InMemoryEventBus>,
}

impl MembershipRegistry {
    /// Create a registry publishing to `bus`.
    #[must_use]
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self {
            roster: Mutex::new(Roster::new()),
            bus,
        }
    }

    /// The bus membership events are published on.
    #[must_use]
    pub fn event_bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    /// Record `connection_id` as a member of `resource` and publish a join
    /// event carrying the updated roster.
    ///
    /// Returns `false`, publishing nothing, when the connection is already
    /// a member.
    pub fn add_member(
        &self,
        resource: &DiscoveryKey,
        connection_id: &ConnectionId,
        identity: &IdentityClaim,
    ) -> bool {
        let snapshot = self
            .roster
            .lock()
            .insert(*resource, connection_id.clone(), identity.clone());
        let Some(snapshot) = snapshot else {
            tracing::debug!(
                connection = %connection_id,
                resource = %resource,
                "Duplicate join ignored"
            );
            return false;
        };

        MEMBERS_ACTIVE.inc();
        log_peer_event!(
            info,
            "registry",
            "peer joined",
            connection_id,
            resource,
            key = %identity.key,
            members = snapshot.len()
        );

        self.publish(MembershipEvent::join(
            *resource,
            connection_id.clone(),
            identity.clone(),
            snapshot,
        ));
        true
    }

    /// Remove `connection_id` from `resource` and publish a leave event.
    ///
    /// Returns `false`, publishing nothing, when the connection was not a
    /// member.
    pub fn remove_member(
        &self,
        resource: &DiscoveryKey,
        connection_id: &ConnectionId,
        identity: &IdentityClaim,
    ) -> bool {
        let snapshot = self.roster.lock().remove(resource, connection_id);
        let Some(snapshot) = snapshot else {
            tracing::debug!(
                connection = %connection_id,
                resource = %resource,
                "Removal of non-member ignored"
            );
            return false;
        };

        MEMBERS_ACTIVE.dec();
        log_peer_event!(
            info,
            "registry",
            "peer left",
            connection_id,
            resource,
            key = %identity.key,
            members = snapshot.len()
        );

        self.publish(MembershipEvent::leave(
            *resource,
            connection_id.clone(),
            identity.clone(),
            snapshot,
        ));
        true
    }

    /// Current members of `resource`.
    #[must_use]
    pub fn roster(&self, resource: &DiscoveryKey) -> Option<RosterSnapshot> {
        self.roster.lock().snapshot(resource)
    }

    /// Whether `connection_id` is a member of `resource`.
    #[must_use]
    pub fn is_member(&self, resource: &DiscoveryKey, connection_id: &ConnectionId) -> bool {
        self.roster.lock().contains(resource, connection_id)
    }

    /// Number of members of `resource`.
    #[must_use]
    pub fn member_count(&self, resource: &DiscoveryKey) -> usize {
        self.roster.lock().member_count(resource)
    }

    /// Resources with at least one member.
    #[must_use]
    pub fn resources(&self) -> Vec<DiscoveryKey> {
        self.roster.lock().resources()
    }

    fn publish(&self, event: MembershipEvent) {
        let kind = event.kind;
        self.bus.publish(event);
        MEMBERSHIP_EVENTS
            .with_label_values(&[match kind {
                EventKind::Join => "join",
                EventKind::Leave => "leave",
            }])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resource() -> DiscoveryKey {
        DiscoveryKey::new([3u8; 32])
    }

    fn registry() -> MembershipRegistry {
        MembershipRegistry::new(Arc::new(InMemoryEventBus::new()))
    }

    #[test]
    fn test_add_member_publishes_join() {
        let registry = registry();
        let mut joins = registry.event_bus().event_stream(EventKind::Join, resource());

        registry.add_member(&resource(), &"c1".into(), &IdentityClaim::new("aa"));

        let event = joins.try_recv().unwrap().unwrap();
        assert_eq!(event.connection_id, ConnectionId::from("c1"));
        assert_eq!(event.peer.key, "aa");
        assert_eq!(event.roster.len(), 1);
        assert_eq!(registry.member_count(&resource()), 1);
        assert!(registry.is_member(&resource(), &"c1".into()));
        assert!(!registry.is_member(&resource(), &"c2".into()));
    }

    #[test]
    fn test_remove_member_publishes_leave() {
        let registry = registry();
        let mut leaves = registry.event_bus().event_stream(EventKind::Leave, resource());
        let identity = IdentityClaim::new("aa");

        registry.add_member(&resource(), &"c1".into(), &identity);
        registry.add_member(&resource(), &"c2".into(), &identity);
        assert!(registry.remove_member(&resource(), &"c1".into(), &identity));

        let event = leaves.try_recv().unwrap().unwrap();
        assert_eq!(event.connection_id, ConnectionId::from("c1"));
        assert_eq!(
            event.roster.keys().cloned().collect::<Vec<_>>(),
            vec![ConnectionId::from("c2")]
        );
    }

    #[test]
    fn test_last_leave_deletes_resource() {
        let registry = registry();
        let mut leaves = registry.event_bus().event_stream(EventKind::Leave, resource());
        let identity = IdentityClaim::new("aa");

        registry.add_member(&resource(), &"c1".into(), &identity);
        assert!(registry.remove_member(&resource(), &"c1".into(), &identity));

        assert!(leaves.try_recv().unwrap().unwrap().roster.is_empty());
        assert!(registry.roster(&resource()).is_none());
        assert!(registry.resources().is_empty());
        assert!(!registry.is_member(&resource(), &"c1".into()));
    }

    #[test]
    fn test_duplicate_add_is_silent() {
        let registry = registry();
        let mut joins = registry.event_bus().event_stream(EventKind::Join, resource());
        let identity = IdentityClaim::new("aa");

        assert!(registry.add_member(&resource(), &"c1".into(), &identity));
        assert!(!registry.add_member(&resource(), &"c1".into(), &identity));

        assert!(joins.try_recv().unwrap().is_some());
        assert!(joins.try_recv().unwrap().is_none());
        assert_eq!(registry.member_count(&resource()), 1);
    }

    #[test]
    fn test_remove_non_member_is_silent() {
        let registry = registry();
        let mut leaves = registry.event_bus().event_stream(EventKind::Leave, resource());

        assert!(!registry.remove_member(&resource(), &"c9".into(), &IdentityClaim::new("aa")));
        assert!(leaves.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_handler_may_reenter_registry() {
        let registry = Arc::new(registry());
        let seen = Arc::new(AtomicUsize::new(0));

        let _sub = {
            let inner = Arc::clone(&registry);
            let seen = Arc::clone(&seen);
            registry.event_bus().subscribe(EventKind::Join, resource(), move |_| {
                seen.store(inner.member_count(&resource()), Ordering::SeqCst);
            })
        };

        registry.add_member(&resource(), &"c1".into(), &IdentityClaim::new("aa"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
