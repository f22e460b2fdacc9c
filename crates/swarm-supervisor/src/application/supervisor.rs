//! # Peer Supervisor
//!
//! Application service wiring identity extraction, authorization and
//! membership together for every connection the swarm delivers.
//!
//! ## Connection Flow
//!
//! ```text
//! connect ─→ extract identity ─→ authorize ─→ add_member ─→ attach on_close
//!                 │                   │                          │
//!                 └─── error ─────────┘                    close ─→ remove_member
//! ```
//!
//! A failed establishment leaves the connection out of the roster and
//! attaches no close handler. Failures are returned, counted and logged,
//! and never affect other connections.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::{EventKind, EventStream, InMemoryEventBus, MembershipEvent, Subscription};
use shared_types::{ConnectionId, DiscoveryKey, RosterSnapshot};
use swarm_telemetry::{log_peer_event, CONNECTIONS_REJECTED};
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, info_span, Instrument};

use super::authorizer::Authorizer;
use super::identity::extract_identity;
use super::registry::MembershipRegistry;
use crate::config::SupervisorConfig;
use crate::domain::{ConnectionState, SupervisorError};
use crate::ports::{
    ConnectionHandler, ConnectionInfo, MembershipApi, PeerConnection, ResourceSet, Swarm,
};

// =============================================================================
// LIFECYCLE TRACKING
// =============================================================================

/// Lifecycle state of one tracked connection id.
struct Tracked {
    state: ConnectionState,
    /// Establishments started for this id and not yet finished.
    attempts: usize,
}

/// Lifecycle state of every connection not yet closed.
///
/// Duplicate connect signals share one entry. A failed attempt only drops
/// the entry when no other attempt for the id is still running and the
/// connection never became active.
#[derive(Default)]
struct Lifecycle {
    states: Mutex<HashMap<ConnectionId, Tracked>>,
}

impl Lifecycle {
    /// Record a connect signal. A tracked id keeps its current state.
    fn begin(&self, id: &ConnectionId) {
        let mut states = self.states.lock();
        let tracked = states.entry(id.clone()).or_insert(Tracked {
            state: ConnectionState::Connecting,
            attempts: 0,
        });
        if tracked.attempts > 0 || tracked.state == ConnectionState::Active {
            debug!(connection = %id, state = %tracked.state, "Connect signal for a tracked connection");
        }
        tracked.attempts += 1;
    }

    fn advance(&self, id: &ConnectionId, next: ConnectionState) {
        let mut states = self.states.lock();
        if let Some(tracked) = states.get_mut(id) {
            if tracked.state.can_transition_to(next) {
                tracked.state = next;
            }
        }
    }

    /// Finish a successful attempt.
    fn activate(&self, id: &ConnectionId) {
        let mut states = self.states.lock();
        let tracked = states.entry(id.clone()).or_insert(Tracked {
            state: ConnectionState::Authorizing,
            attempts: 1,
        });
        tracked.attempts = tracked.attempts.saturating_sub(1);
        if tracked.state.can_transition_to(ConnectionState::Active) {
            tracked.state = ConnectionState::Active;
        }
    }

    /// Finish a failed attempt.
    fn abort(&self, id: &ConnectionId) {
        let mut states = self.states.lock();
        let Some(tracked) = states.get_mut(id) else {
            return;
        };
        tracked.attempts = tracked.attempts.saturating_sub(1);
        if tracked.attempts == 0 && tracked.state != ConnectionState::Active {
            states.remove(id);
        }
    }

    fn close(&self, id: &ConnectionId) {
        self.states.lock().remove(id);
    }

    fn get(&self, id: &ConnectionId) -> Option<ConnectionState> {
        self.states.lock().get(id).map(|tracked| tracked.state)
    }
}

// =============================================================================
// SUPERVISOR
// =============================================================================

/// Auto-authorizing connection supervisor.
pub struct PeerSupervisor {
    config: SupervisorConfig,
    authorizer: Authorizer,
    registry: Arc<MembershipRegistry>,
    lifecycle: Arc<Lifecycle>,
}

impl PeerSupervisor {
    /// Create a supervisor over `resources` with its own event bus.
    pub fn new(resources: Arc<dyn ResourceSet>, config: SupervisorConfig) -> Self {
        Self::with_event_bus(resources, config, Arc::new(InMemoryEventBus::new()))
    }

    /// Create a supervisor publishing membership events to `bus`.
    pub fn with_event_bus(
        resources: Arc<dyn ResourceSet>,
        config: SupervisorConfig,
        bus: Arc<InMemoryEventBus>,
    ) -> Self {
        Self {
            authorizer: Authorizer::new(resources, &config),
            registry: Arc::new(MembershipRegistry::new(bus)),
            lifecycle: Arc::new(Lifecycle::default()),
            config,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// The membership registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<MembershipRegistry> {
        &self.registry
    }

    /// The bus membership events are published on.
    #[must_use]
    pub fn event_bus(&self) -> &Arc<InMemoryEventBus> {
        self.registry.event_bus()
    }

    /// Establish one connection. See [`ConnectionHandler::on_connection`].
    pub async fn handle_connection(
        &self,
        connection: Arc<dyn PeerConnection>,
        info: ConnectionInfo,
    ) -> Result<DiscoveryKey, SupervisorError> {
        let span = info_span!("peer_connection", connection = %info.id, channel = %info.channel);
        let id = info.id.clone();

        let result = self.establish(connection, info).instrument(span).await;
        if let Err(err) = &result {
            self.lifecycle.abort(&id);
            CONNECTIONS_REJECTED.with_label_values(&[err.reason()]).inc();
        }
        result
    }

    async fn establish(
        &self,
        connection: Arc<dyn PeerConnection>,
        info: ConnectionInfo,
    ) -> Result<DiscoveryKey, SupervisorError> {
        self.lifecycle.begin(&info.id);

        let identity =
            extract_identity(connection.as_ref(), &info.id, self.config.max_identity_bytes)?;
        self.lifecycle.advance(&info.id, ConnectionState::Authorizing);

        let authorization = self.authorizer.authorize(&identity, &info.channel).await?;
        let resource = authorization.resource;
        log_peer_event!(
            info,
            "supervisor",
            "authorized peer",
            info.id,
            resource,
            key = %identity.key,
            outcome = %authorization.outcome
        );

        self.lifecycle.activate(&info.id);
        self.registry.add_member(&resource, &info.id, &identity);

        let registry = Arc::clone(&self.registry);
        let lifecycle = Arc::clone(&self.lifecycle);
        let id = info.id;
        connection.on_close(Box::new(move || {
            registry.remove_member(&resource, &id, &identity);
            lifecycle.close(&id);
        }));

        Ok(resource)
    }

    /// Supervise every connection `swarm` delivers until its stream ends
    /// and all in-flight establishments have finished.
    ///
    /// Each connection is established on its own task. Failures are logged
    /// and do not stop the loop.
    pub async fn run<S>(self: Arc<Self>, swarm: &S)
    where
        S: Swarm + ?Sized,
    {
        let mut connections = swarm.connections();
        let mut tasks: JoinSet<(ConnectionId, Result<DiscoveryKey, SupervisorError>)> =
            JoinSet::new();
        let mut accepting = true;

        info!("Connection supervisor running");

        loop {
            tokio::select! {
                next = connections.next(), if accepting => match next {
                    Some(incoming) => {
                        let supervisor = Arc::clone(&self);
                        tasks.spawn(async move {
                            let id = incoming.info.id.clone();
                            let result = supervisor
                                .handle_connection(incoming.connection, incoming.info)
                                .await;
                            (id, result)
                        });
                    }
                    None => {
                        debug!(in_flight = tasks.len(), "Connection stream ended");
                        accepting = false;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok((_, Ok(_))) => {}
                    Ok((id, Err(err))) => {
                        error!(connection = %id, reason = err.reason(), error = %err, "Connection establishment failed");
                    }
                    Err(join_err) => {
                        error!(error = %join_err, "Connection task aborted");
                    }
                },
                else => break,
            }
        }

        info!("Connection supervisor stopped");
    }
}

#[async_trait]
impl ConnectionHandler for PeerSupervisor {
    async fn on_connection(
        &self,
        connection: Arc<dyn PeerConnection>,
        info: ConnectionInfo,
    ) -> Result<DiscoveryKey, SupervisorError> {
        self.handle_connection(connection, info).await
    }
}

impl MembershipApi for PeerSupervisor {
    fn on_join(
        &self,
        resource: DiscoveryKey,
        handler: Box<dyn Fn(&MembershipEvent) + Send + Sync>,
    ) -> Subscription {
        self.event_bus().subscribe(EventKind::Join, resource, handler)
    }

    fn on_leave(
        &self,
        resource: DiscoveryKey,
        handler: Box<dyn Fn(&MembershipEvent) + Send + Sync>,
    ) -> Subscription {
        self.event_bus().subscribe(EventKind::Leave, resource, handler)
    }

    fn join_stream(&self, resource: DiscoveryKey) -> EventStream {
        self.event_bus().event_stream(EventKind::Join, resource)
    }

    fn leave_stream(&self, resource: DiscoveryKey) -> EventStream {
        self.event_bus().event_stream(EventKind::Leave, resource)
    }

    fn roster(&self, resource: &DiscoveryKey) -> Option<RosterSnapshot> {
        self.registry.roster(resource)
    }

    fn member_count(&self, resource: &DiscoveryKey) -> usize {
        self.registry.member_count(resource)
    }

    fn resources(&self) -> Vec<DiscoveryKey> {
        self.registry.resources()
    }

    fn connection_state(&self, id: &ConnectionId) -> Option<ConnectionState> {
        self.lifecycle.get(id)
    }
}
