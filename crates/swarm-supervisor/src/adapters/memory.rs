//! # In-Memory Adapters
//!
//! Implementations of the outbound ports that live entirely in process.
//! Used by tests and by hosts that embed the supervisor without a real
//! transport. The access-control store counts calls and can be told to
//! fail.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{AccessKey, ConnectionId, DiscoveryKey, IdentityClaim, PublicKey};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::domain::AccessControlError;
use crate::ports::{
    AccessControlStore, CloseHandler, ConnectionInfo, ConnectionStream, IncomingConnection,
    PeerConnection, Resource, ResourceSet, Swarm,
};

// =============================================================================
// CONNECTION
// =============================================================================

#[derive(Default)]
struct CloseState {
    closed: bool,
    handlers: Vec<CloseHandler>,
}

/// A peer connection closed explicitly with [`InMemoryConnection::close`].
#[derive(Default)]
pub struct InMemoryConnection {
    user_data: Option<Vec<u8>>,
    state: Mutex<CloseState>,
}

impl InMemoryConnection {
    /// Connection carrying raw user-data bytes.
    #[must_use]
    pub fn with_user_data(user_data: Option<Vec<u8>>) -> Self {
        Self {
            user_data,
            state: Mutex::new(CloseState::default()),
        }
    }

    /// Connection whose peer presented `identity`.
    #[must_use]
    pub fn with_identity(identity: &IdentityClaim) -> Self {
        // Serializing a string key plus JSON values cannot fail.
        Self::with_user_data(identity.to_json().ok())
    }

    /// Connection whose peer presented nothing.
    #[must_use]
    pub fn without_identity() -> Self {
        Self::with_user_data(None)
    }

    /// Close the connection, running every registered close handler once.
    /// Closing twice is a no-op.
    pub fn close(&self) {
        let handlers = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.handlers)
        };
        for handler in handlers {
            handler();
        }
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Close handlers waiting for the connection to close.
    #[must_use]
    pub fn close_handler_count(&self) -> usize {
        self.state.lock().handlers.len()
    }
}

impl PeerConnection for InMemoryConnection {
    fn remote_user_data(&self) -> Option<Vec<u8>> {
        self.user_data.clone()
    }

    fn on_close(&self, handler: CloseHandler) {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            handler();
            return;
        }
        state.handlers.push(handler);
    }
}

// =============================================================================
// ACCESS CONTROL
// =============================================================================

/// Access-control store backed by a set of keys.
///
/// Both operations yield to the runtime once before completing, so
/// concurrent establishments interleave the way they would against a
/// real store.
#[derive(Default)]
pub struct InMemoryAccessControl {
    keys: Mutex<HashSet<AccessKey>>,
    grants: Mutex<Vec<AccessKey>>,
    check_calls: AtomicUsize,
    grant_calls: AtomicUsize,
    fail_checks: AtomicBool,
    fail_grants: AtomicBool,
}

impl InMemoryAccessControl {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` without counting it as a grant.
    pub fn preauthorize(&self, key: AccessKey) {
        self.keys.lock().insert(key);
    }

    /// Whether `key` is in the store.
    #[must_use]
    pub fn is_authorized(&self, key: &AccessKey) -> bool {
        self.keys.lock().contains(key)
    }

    /// Every key passed to `authorize`, in call order.
    #[must_use]
    pub fn grants(&self) -> Vec<AccessKey> {
        self.grants.lock().clone()
    }

    /// Number of `authorized` calls.
    #[must_use]
    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    /// Number of `authorize` calls.
    #[must_use]
    pub fn grant_calls(&self) -> usize {
        self.grant_calls.load(Ordering::SeqCst)
    }

    /// Make `authorized` fail.
    pub fn fail_checks(&self, fail: bool) {
        self.fail_checks.store(fail, Ordering::SeqCst);
    }

    /// Make `authorize` fail.
    pub fn fail_grants(&self, fail: bool) {
        self.fail_grants.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccessControlStore for InMemoryAccessControl {
    async fn authorized(&self, key: &AccessKey) -> Result<bool, AccessControlError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.fail_checks.load(Ordering::SeqCst) {
            return Err(AccessControlError::Check("store unavailable".to_string()));
        }
        Ok(self.is_authorized(key))
    }

    async fn authorize(&self, key: &AccessKey) -> Result<(), AccessControlError> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(AccessControlError::Grant("store unavailable".to_string()));
        }
        self.grants.lock().push(key.clone());
        self.keys.lock().insert(key.clone());
        Ok(())
    }
}

// =============================================================================
// RESOURCES
// =============================================================================

/// A resource with an in-memory access-control store.
pub struct InMemoryResource {
    public_key: PublicKey,
    discovery_key: DiscoveryKey,
    ready: watch::Sender<bool>,
    store: Arc<InMemoryAccessControl>,
}

impl InMemoryResource {
    /// A resource that is ready immediately.
    #[must_use]
    pub fn new(public_key: PublicKey) -> Self {
        Self::build(public_key, true)
    }

    /// A resource whose `ready` waits for [`InMemoryResource::mark_ready`].
    #[must_use]
    pub fn pending(public_key: PublicKey) -> Self {
        Self::build(public_key, false)
    }

    fn build(public_key: PublicKey, ready: bool) -> Self {
        let (sender, _) = watch::channel(ready);
        Self {
            discovery_key: public_key.discovery_key(),
            public_key,
            ready: sender,
            store: Arc::new(InMemoryAccessControl::new()),
        }
    }

    /// Release everything waiting in `ready`.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// The concrete store, for inspection.
    #[must_use]
    pub fn store(&self) -> &Arc<InMemoryAccessControl> {
        &self.store
    }
}

#[async_trait]
impl Resource for InMemoryResource {
    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn discovery_key(&self) -> DiscoveryKey {
        self.discovery_key
    }

    async fn ready(&self) {
        let mut receiver = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = receiver.wait_for(|ready| *ready).await;
    }

    fn access_control(&self) -> Arc<dyn AccessControlStore> {
        self.store.clone()
    }
}

/// A mutable set of resources.
#[derive(Default)]
pub struct InMemoryResourceSet {
    resources: RwLock<Vec<Arc<dyn Resource>>>,
}

impl InMemoryResourceSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start holding `resource`.
    pub fn add(&self, resource: Arc<dyn Resource>) {
        debug!(resource = %resource.discovery_key(), "Resource added");
        self.resources.write().push(resource);
    }

    /// Stop holding the resource with `discovery_key`. Returns whether it
    /// was held.
    pub fn remove(&self, discovery_key: &DiscoveryKey) -> bool {
        let mut resources = self.resources.write();
        let before = resources.len();
        resources.retain(|r| r.discovery_key() != *discovery_key);
        resources.len() != before
    }

    /// Number of resources held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Whether no resources are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

impl ResourceSet for InMemoryResourceSet {
    fn resources(&self) -> Vec<Arc<dyn Resource>> {
        self.resources.read().clone()
    }
}

// =============================================================================
// SWARM
// =============================================================================

/// A swarm whose connections are injected by hand.
pub struct InMemorySwarm {
    sender: Mutex<Option<mpsc::UnboundedSender<IncomingConnection>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<IncomingConnection>>>,
}

impl InMemorySwarm {
    /// New swarm with no connections.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Deliver a connect signal and return the connection for the test to
    /// close later.
    pub fn connect(
        &self,
        id: impl Into<ConnectionId>,
        channel: impl Into<String>,
        user_data: Option<Vec<u8>>,
    ) -> Arc<InMemoryConnection> {
        let connection = Arc::new(InMemoryConnection::with_user_data(user_data));
        let incoming = IncomingConnection {
            connection: connection.clone(),
            info: ConnectionInfo::new(id, channel),
        };

        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(incoming).is_err() {
                    debug!("Connect signal dropped (supervisor gone)");
                }
            }
            None => debug!("Connect signal dropped (swarm shut down)"),
        }
        connection
    }

    /// End the connection stream once queued signals are consumed.
    pub fn shutdown(&self) {
        self.sender.lock().take();
    }
}

impl Default for InMemorySwarm {
    fn default() -> Self {
        Self::new()
    }
}

impl Swarm for InMemorySwarm {
    fn connections(&self) -> ConnectionStream {
        match self.receiver.lock().take() {
            Some(receiver) => Box::pin(UnboundedReceiverStream::new(receiver)),
            None => Box::pin(tokio_stream::empty()),
        }
    }
}
