//! # Outbound Ports
//!
//! What the supervisor needs from its host: the swarm that delivers
//! connections, the connections themselves, and the set of resources the
//! node holds together with their access-control stores.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{AccessKey, ConnectionId, DiscoveryKey, PublicKey};
use tokio_stream::Stream;

use crate::domain::AccessControlError;

/// Callback run once when a connection closes.
pub type CloseHandler = Box<dyn FnOnce() + Send + 'static>;

/// A live peer connection delivered by the swarm.
pub trait PeerConnection: Send + Sync {
    /// Identity payload the remote peer attached to the handshake.
    fn remote_user_data(&self) -> Option<Vec<u8>>;

    /// Register `handler` to run once when the connection closes.
    ///
    /// If the connection is already closed the handler runs immediately.
    fn on_close(&self, handler: CloseHandler);
}

/// Transport details that accompany a connect signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Unique per connection; the registry's notion of "peer".
    pub id: ConnectionId,
    /// The resource the connection was opened for, as an encoded discovery key.
    pub channel: String,
}

impl ConnectionInfo {
    /// Create connection info.
    pub fn new(id: impl Into<ConnectionId>, channel: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel: channel.into(),
        }
    }
}

/// One connect signal from the swarm.
#[derive(Clone)]
pub struct IncomingConnection {
    /// The connection.
    pub connection: Arc<dyn PeerConnection>,
    /// Its transport details.
    pub info: ConnectionInfo,
}

/// Stream of connect signals.
pub type ConnectionStream = Pin<Box<dyn Stream<Item = IncomingConnection> + Send>>;

/// The swarm - outbound port.
pub trait Swarm: Send + Sync {
    /// Connect signals, in arrival order. Ends when the swarm shuts down.
    fn connections(&self) -> ConnectionStream;
}

/// Per-resource writer access list - outbound port.
#[async_trait]
pub trait AccessControlStore: Send + Sync {
    /// Is `key` already allowed to write?
    async fn authorized(&self, key: &AccessKey) -> Result<bool, AccessControlError>;

    /// Allow `key` to write.
    async fn authorize(&self, key: &AccessKey) -> Result<(), AccessControlError>;
}

/// A replicated resource the node holds - outbound port.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Content public key.
    fn public_key(&self) -> PublicKey;

    /// Public handle derived from the content key.
    fn discovery_key(&self) -> DiscoveryKey;

    /// Completes once the resource is loaded and usable.
    async fn ready(&self);

    /// The resource's access-control store.
    fn access_control(&self) -> Arc<dyn AccessControlStore>;
}

/// Everything the node holds - outbound port.
pub trait ResourceSet: Send + Sync {
    /// Current resources. Consulted on every lookup.
    fn resources(&self) -> Vec<Arc<dyn Resource>>;
}
