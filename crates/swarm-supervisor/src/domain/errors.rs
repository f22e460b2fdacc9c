//! # Domain Errors
//!
//! Every error here is fatal to one connection's establishment and to
//! nothing else. None are retried.

use shared_types::{ConnectionId, KeyEncodingError};
use thiserror::Error;

/// Failure reported by an access-control store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessControlError {
    /// "Is this key authorized?" failed.
    #[error("Access-control check failed: {0}")]
    Check(String),

    /// "Authorize this key" failed.
    #[error("Access-control grant failed: {0}")]
    Grant(String),
}

/// Connection establishment errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// The peer sent no identity payload.
    #[error("Peer on connection {connection} does not have user data")]
    MissingIdentity {
        /// Connection the peer arrived on.
        connection: ConnectionId,
    },

    /// The identity payload could not be decoded.
    #[error("Malformed identity on connection {connection}: {reason}")]
    MalformedIdentity {
        /// Connection the peer arrived on.
        connection: ConnectionId,
        /// Decoder message.
        reason: String,
    },

    /// The identity's `key` field is not a valid access-key encoding.
    #[error("Invalid access key {key:?}: {source}")]
    InvalidAccessKey {
        /// The encoded key as presented.
        key: String,
        /// Why decoding failed.
        #[source]
        source: KeyEncodingError,
    },

    /// The connection's channel matches no held resource.
    #[error("Attempting to authorize with an unknown resource (channel {channel})")]
    UnknownResource {
        /// Channel the connection was opened for.
        channel: String,
    },

    /// The access-control store failed.
    #[error(transparent)]
    AccessControl(#[from] AccessControlError),
}

impl SupervisorError {
    /// Stable label for metrics and log queries.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingIdentity { .. } => "missing_identity",
            Self::MalformedIdentity { .. } => "malformed_identity",
            Self::InvalidAccessKey { .. } => "invalid_access_key",
            Self::UnknownResource { .. } => "unknown_resource",
            Self::AccessControl(_) => "access_control",
        }
    }
}
