//! # Roster
//!
//! Per-resource membership table.
//!
//! ## Invariants
//!
//! - A resource key is present iff it has at least one member.
//! - Within a resource, a connection id appears at most once.
//!
//! `insert` and `remove` return the resource's membership after the change
//! as an owned snapshot, so callers can publish it after releasing
//! whatever lock guards the roster.

use std::collections::{BTreeMap, HashMap};

use shared_types::{ConnectionId, DiscoveryKey, IdentityClaim, MembershipEntry, RosterSnapshot};

/// Membership of every resource with at least one connected peer.
#[derive(Debug, Default)]
pub struct Roster {
    members: HashMap<DiscoveryKey, BTreeMap<ConnectionId, MembershipEntry>>,
}

impl Roster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `connection_id` under `resource`.
    ///
    /// Returns the snapshot after the insert, or `None` without touching
    /// anything when the connection is already a member.
    pub fn insert(
        &mut self,
        resource: DiscoveryKey,
        connection_id: ConnectionId,
        identity: IdentityClaim,
    ) -> Option<RosterSnapshot> {
        let entries = self.members.entry(resource).or_default();
        if entries.contains_key(&connection_id) {
            return None;
        }
        entries.insert(
            connection_id.clone(),
            MembershipEntry::new(connection_id, identity),
        );
        Some(Self::to_snapshot(entries))
    }

    /// Remove `connection_id` from `resource`.
    ///
    /// Returns `None` when the connection was not a member. Removing the
    /// last member deletes the resource key and yields an empty snapshot.
    pub fn remove(
        &mut self,
        resource: &DiscoveryKey,
        connection_id: &ConnectionId,
    ) -> Option<RosterSnapshot> {
        let entries = self.members.get_mut(resource)?;
        entries.remove(connection_id)?;

        if entries.is_empty() {
            self.members.remove(resource);
            return Some(RosterSnapshot::new());
        }
        Some(Self::to_snapshot(entries))
    }

    /// Current members of `resource`, or `None` if it has none.
    #[must_use]
    pub fn snapshot(&self, resource: &DiscoveryKey) -> Option<RosterSnapshot> {
        self.members.get(resource).map(Self::to_snapshot)
    }

    /// Whether `connection_id` is a member of `resource`.
    #[must_use]
    pub fn contains(&self, resource: &DiscoveryKey, connection_id: &ConnectionId) -> bool {
        self.members
            .get(resource)
            .is_some_and(|entries| entries.contains_key(connection_id))
    }

    /// Number of members of `resource`.
    #[must_use]
    pub fn member_count(&self, resource: &DiscoveryKey) -> usize {
        self.members.get(resource).map_or(0, BTreeMap::len)
    }

    /// Number of resources with at least one member.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.members.len()
    }

    /// Resources with at least one member, in key order.
    #[must_use]
    pub fn resources(&self) -> Vec<DiscoveryKey> {
        let mut keys: Vec<DiscoveryKey> = self.members.keys().copied().collect();
        keys.sort();
        keys
    }

    fn to_snapshot(entries: &BTreeMap<ConnectionId, MembershipEntry>) -> RosterSnapshot {
        entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.identity.clone()))
            .collect()
    }
}
