//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Keys**: `PublicKey`, `DiscoveryKey`, `AccessKey`
//! - **Peers**: `ConnectionId`, `IdentityClaim`
//! - **Membership**: `MembershipEntry`, `RosterSnapshot`
//!
//! All keys travel as hex strings. Decoding is case-insensitive, encoding is
//! always lowercase.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::KeyEncodingError;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of archive public keys and discovery keys.
pub const KEY_LENGTH: usize = 32;

/// Context label mixed into every discovery key derivation.
pub const DISCOVERY_CONTEXT: &[u8] = b"auto-swarm/discovery";

// =============================================================================
// CLUSTER A: KEYS
// =============================================================================

/// Public key of an archive (the writable identity of a resource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; KEY_LENGTH]);

impl PublicKey {
    #[must_use]
    pub fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Derive the discovery key peers rendezvous on for this archive.
    #[must_use]
    pub fn discovery_key(&self) -> DiscoveryKey {
        DiscoveryKey::derive(self)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for PublicKey {
    type Err = KeyEncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(Self)
    }
}

/// Non-secret rendezvous key of an archive.
///
/// Connections are tagged with the encoded form of this key (their
/// "channel"), and the roster is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiscoveryKey(pub [u8; KEY_LENGTH]);

impl DiscoveryKey {
    #[must_use]
    pub fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// HMAC-SHA256 keyed by the public key over [`DISCOVERY_CONTEXT`].
    ///
    /// Deterministic, and reveals nothing about the public key itself.
    #[must_use]
    pub fn derive(public_key: &PublicKey) -> Self {
        let mut mac = HmacSha256::new_from_slice(public_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(DISCOVERY_CONTEXT);
        let mut bytes = [0u8; KEY_LENGTH];
        bytes.copy_from_slice(&mac.finalize().into_bytes());
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Wire encoding used for connection channels.
    #[must_use]
    pub fn encode(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether `channel` is the encoding of this key.
    #[must_use]
    pub fn matches_channel(&self, channel: &str, case_insensitive: bool) -> bool {
        let encoded = self.encode();
        if case_insensitive {
            encoded.eq_ignore_ascii_case(channel)
        } else {
            encoded == channel
        }
    }
}

impl fmt::Display for DiscoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for DiscoveryKey {
    type Err = KeyEncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(Self)
    }
}

impl TryFrom<String> for DiscoveryKey {
    type Error = KeyEncodingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiscoveryKey> for String {
    fn from(key: DiscoveryKey) -> Self {
        key.encode()
    }
}

/// A peer's access-control key, as handed to the access-control store.
///
/// Length is not fixed here; the store (or supervisor config) decides what
/// lengths it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessKey(Vec<u8>);

impl AccessKey {
    /// Decode an access key from its hex wire encoding.
    pub fn decode(encoded: &str) -> Result<Self, KeyEncodingError> {
        if encoded.is_empty() {
            return Err(KeyEncodingError::Empty);
        }
        Ok(Self(hex::decode(encoded)?))
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn encode(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn decode_fixed(encoded: &str) -> Result<[u8; KEY_LENGTH], KeyEncodingError> {
    if encoded.is_empty() {
        return Err(KeyEncodingError::Empty);
    }
    let bytes = hex::decode(encoded)?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| KeyEncodingError::InvalidLength {
            expected: KEY_LENGTH,
            actual,
        })
}

// =============================================================================
// CLUSTER B: PEERS
// =============================================================================

/// Transport-assigned identifier of a single connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity a peer presents in its connection's user-data.
///
/// `key` is the peer's encoded access-control key. Every other field is
/// application-defined and carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaim {
    /// Encoded access-control key.
    pub key: String,

    /// Application-defined fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl IdentityClaim {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style helper for application fields.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Parse a claim from its serialized form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize the claim into the form peers put in their user-data.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// =============================================================================
// CLUSTER C: MEMBERSHIP
// =============================================================================

/// One authorized peer connection on one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipEntry {
    pub connection_id: ConnectionId,
    pub identity: IdentityClaim,
}

impl MembershipEntry {
    #[must_use]
    pub fn new(connection_id: ConnectionId, identity: IdentityClaim) -> Self {
        Self {
            connection_id,
            identity,
        }
    }
}

/// Owned copy of one resource's roster: connection id to identity.
pub type RosterSnapshot = BTreeMap<ConnectionId, IdentityClaim>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_key_is_deterministic() {
        let public_key = PublicKey::new([7u8; KEY_LENGTH]);
        assert_eq!(public_key.discovery_key(), public_key.discovery_key());
        assert_ne!(public_key.discovery_key().0, public_key.0);
    }

    #[test]
    fn test_distinct_public_keys_distinct_discovery_keys() {
        let a = PublicKey::new([1u8; KEY_LENGTH]).discovery_key();
        let b = PublicKey::new([2u8; KEY_LENGTH]).discovery_key();
        assert_ne!(a, b);
    }

    #[test]
    fn test_discovery_key_string_roundtrip() {
        let key = DiscoveryKey::new([0xab; KEY_LENGTH]);
        let parsed: DiscoveryKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
        assert_eq!(key.encode().len(), 64);
    }

    #[test]
    fn test_discovery_key_rejects_short_input() {
        let err = "abcd".parse::<DiscoveryKey>().unwrap_err();
        assert_eq!(
            err,
            KeyEncodingError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn test_matches_channel_case() {
        let key = DiscoveryKey::new([0xab; KEY_LENGTH]);
        let upper = key.encode().to_uppercase();
        assert!(key.matches_channel(&upper, true));
        assert!(!key.matches_channel(&upper, false));
        assert!(key.matches_channel(&key.encode(), false));
    }

    #[test]
    fn test_discovery_key_serializes_as_hex() {
        let key = DiscoveryKey::new([1u8; KEY_LENGTH]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.encode()));
        let back: DiscoveryKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_access_key_decode() {
        let key = AccessKey::decode("abc123").unwrap();
        assert_eq!(key.as_bytes(), &[0xab, 0xc1, 0x23]);
        assert_eq!(key.encode(), "abc123");
        assert_eq!(AccessKey::decode("ABC123").unwrap(), key);
    }

    #[test]
    fn test_access_key_from_bytes() {
        let key = AccessKey::from_bytes(vec![0xab, 0xc1, 0x23]);
        assert_eq!(key, AccessKey::decode("abc123").unwrap());
        assert_eq!(key.len(), 3);
        assert!(!key.is_empty());
        assert_eq!(key.to_string(), "abc123");
    }

    #[test]
    fn test_access_key_decode_errors() {
        assert_eq!(AccessKey::decode(""), Err(KeyEncodingError::Empty));
        assert!(matches!(
            AccessKey::decode("not-hex"),
            Err(KeyEncodingError::InvalidHex(_))
        ));
        assert!(matches!(
            AccessKey::decode("abc"),
            Err(KeyEncodingError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_identity_claim_keeps_extra_fields() {
        let raw = br#"{"key":"abc123","name":"alice","color":7}"#;
        let claim = IdentityClaim::from_json(raw).unwrap();
        assert_eq!(claim.key, "abc123");
        assert_eq!(claim.field("name"), Some(&Value::from("alice")));
        assert_eq!(claim.field("color"), Some(&Value::from(7)));

        let encoded = claim.to_json().unwrap();
        assert_eq!(IdentityClaim::from_json(&encoded).unwrap(), claim);
    }

    #[test]
    fn test_identity_claim_requires_key() {
        assert!(IdentityClaim::from_json(br#"{"name":"alice"}"#).is_err());
    }

    #[test]
    fn test_connection_id_orders_snapshot() {
        let mut snapshot = RosterSnapshot::new();
        snapshot.insert(ConnectionId::from("conn2"), IdentityClaim::new("02"));
        snapshot.insert(ConnectionId::from("conn1"), IdentityClaim::new("01"));
        let ids: Vec<_> = snapshot.keys().map(ConnectionId::as_str).collect();
        assert_eq!(ids, vec!["conn1", "conn2"]);
    }
}
