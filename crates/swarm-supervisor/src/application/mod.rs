//! # Application Layer
//!
//! Services orchestrating the domain against the outbound ports.

pub mod authorizer;
pub mod identity;
pub mod registry;
pub mod supervisor;

pub use authorizer::{Authorization, AuthorizationOutcome, Authorizer};
pub use identity::extract_identity;
pub use registry::MembershipRegistry;
pub use supervisor::PeerSupervisor;
