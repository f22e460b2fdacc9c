//! # Identity Parsing
//!
//! Turns a connection's raw user-data into an `IdentityClaim`. Pure: the
//! caller reads the bytes off the connection.

use shared_types::{ConnectionId, IdentityClaim};

use super::errors::SupervisorError;

/// Parse the identity a peer presented on `connection`.
///
/// Absent and empty payloads are both `MissingIdentity`. Payloads over
/// `max_bytes` are rejected as malformed before decoding.
pub fn parse_identity(
    connection: &ConnectionId,
    user_data: Option<&[u8]>,
    max_bytes: usize,
) -> Result<IdentityClaim, SupervisorError> {
    let bytes = match user_data {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => {
            return Err(SupervisorError::MissingIdentity {
                connection: connection.clone(),
            })
        }
    };

    if bytes.len() > max_bytes {
        return Err(SupervisorError::MalformedIdentity {
            connection: connection.clone(),
            reason: format!("{} bytes exceeds limit of {}", bytes.len(), max_bytes),
        });
    }

    IdentityClaim::from_json(bytes).map_err(|e| SupervisorError::MalformedIdentity {
        connection: connection.clone(),
        reason: e.to_string(),
    })
}
