//! # Inbound Ports
//!
//! API the supervisor exposes: the connect entry point for the swarm, and
//! the membership view for the application.

use std::sync::Arc;

use async_trait::async_trait;
use shared_bus::{EventStream, MembershipEvent, Subscription};
use shared_types::{ConnectionId, DiscoveryKey, RosterSnapshot};

use super::outbound::{ConnectionInfo, PeerConnection};
use crate::domain::{ConnectionState, SupervisorError};

/// Connect entry point - inbound port.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Establish a new connection: extract the identity, authorize it on
    /// the channel's resource, record membership and attach the close
    /// handler.
    ///
    /// Returns the resource the peer joined. On error the connection is
    /// left out of the roster and no close handler is attached.
    async fn on_connection(
        &self,
        connection: Arc<dyn PeerConnection>,
        info: ConnectionInfo,
    ) -> Result<DiscoveryKey, SupervisorError>;
}

/// Membership view - inbound port.
pub trait MembershipApi: Send + Sync {
    /// Call `handler` for each peer that joins `resource`.
    fn on_join(
        &self,
        resource: DiscoveryKey,
        handler: Box<dyn Fn(&MembershipEvent) + Send + Sync>,
    ) -> Subscription;

    /// Call `handler` for each peer that leaves `resource`.
    fn on_leave(
        &self,
        resource: DiscoveryKey,
        handler: Box<dyn Fn(&MembershipEvent) + Send + Sync>,
    ) -> Subscription;

    /// Join events for `resource` as an async stream.
    fn join_stream(&self, resource: DiscoveryKey) -> EventStream;

    /// Leave events for `resource` as an async stream.
    fn leave_stream(&self, resource: DiscoveryKey) -> EventStream;

    /// Current members of `resource`, or `None` if it has none.
    fn roster(&self, resource: &DiscoveryKey) -> Option<RosterSnapshot>;

    /// Number of members of `resource`.
    fn member_count(&self, resource: &DiscoveryKey) -> usize;

    /// Resources with at least one member.
    fn resources(&self) -> Vec<DiscoveryKey>;

    /// Lifecycle state of a connection the supervisor still tracks.
    fn connection_state(&self, id: &ConnectionId) -> Option<ConnectionState>;
}
