//! # Swarm Supervisor
//!
//! Auto-authorizing peer membership for a replicated-storage swarm.
//!
//! Every peer that connects on a resource's channel and presents an
//! identity is granted write access to that resource, recorded in the
//! resource's roster, and announced to the application. When the
//! connection closes the peer is removed and its departure announced.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | Identity Extractor | Decode the peer's user-data into an `IdentityClaim` |
//! | Authorizer | Grant the claim's access key on the channel's resource |
//! | Membership Registry | Per-resource roster; publishes join/leave events |
//! | Event Bus | `shared-bus`, keyed by `(kind, discovery key)` |
//! | Connection Supervisor | Runs the above for every connection |
//!
//! ## Module Structure
//!
//! ```text
//! swarm-supervisor/
//! ├── domain/          # Errors, identity parsing, Roster, ConnectionState
//! ├── ports/           # API traits (inbound) + host traits (outbound)
//! ├── application/     # Authorizer, MembershipRegistry, PeerSupervisor
//! ├── adapters/        # In-memory swarm, connections, resources, stores
//! └── config.rs        # SupervisorConfig
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let supervisor = Arc::new(PeerSupervisor::new(resources, SupervisorConfig::default()));
//! let _joins = supervisor.on_join(archive_key, Box::new(|event| {
//!     println!("{} joined ({} members)", event.peer.key, event.roster.len());
//! }));
//! supervisor.run(&swarm).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    InMemoryAccessControl, InMemoryConnection, InMemoryResource, InMemoryResourceSet,
    InMemorySwarm,
};
pub use application::{
    extract_identity, Authorization, AuthorizationOutcome, Authorizer, MembershipRegistry,
    PeerSupervisor,
};
pub use config::{ConfigError, SupervisorConfig, DEFAULT_MAX_IDENTITY_BYTES};
pub use domain::{parse_identity, AccessControlError, ConnectionState, Roster, SupervisorError};
pub use ports::{
    AccessControlStore, CloseHandler, ConnectionHandler, ConnectionInfo, ConnectionStream,
    IncomingConnection, MembershipApi, PeerConnection, Resource, ResourceSet, Swarm,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
