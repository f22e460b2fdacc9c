//! # Identity Extractor
//!
//! Reads the identity payload off a live connection.

use shared_types::{ConnectionId, IdentityClaim};

use crate::domain::{parse_identity, SupervisorError};
use crate::ports::PeerConnection;

/// Extract the identity the remote peer presented on `connection`.
///
/// # Errors
///
/// `MissingIdentity` when the peer sent no user-data, `MalformedIdentity`
/// when it is oversized or does not decode to a claim with a `key`.
pub fn extract_identity(
    connection: &dyn PeerConnection,
    connection_id: &ConnectionId,
    max_identity_bytes: usize,
) -> Result<IdentityClaim, SupervisorError> {
    let user_data = connection.remote_user_data();
    parse_identity(connection_id, user_data.as_deref(), max_identity_bytes)
}
