//! # Authorizer
//!
//! Grants a peer's access key write permission on the resource its
//! connection was opened for.
//!
//! ## Flow
//!
//! 1. Decode the identity's `key` into an `AccessKey`
//! 2. Resolve the channel to a held resource
//! 3. Wait for the resource to be ready
//! 4. Ask its access-control store whether the key is authorized
//! 5. If not, authorize it
//!
//! Each step short-circuits with a `SupervisorError`. Two connections
//! presenting the same key may both reach step 5; stores treat repeat
//! grants as no-ops.

use std::fmt;
use std::sync::Arc;

use shared_types::{AccessKey, DiscoveryKey, IdentityClaim, KeyEncodingError};
use swarm_telemetry::AUTHORIZATIONS;
use tracing::debug;

use crate::config::SupervisorConfig;
use crate::domain::SupervisorError;
use crate::ports::{Resource, ResourceSet};

/// What the authorizer did for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The key was added to the store.
    Granted,
    /// The store already listed the key.
    AlreadyAuthorized,
}

impl AuthorizationOutcome {
    /// Metric label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorizationOutcome::Granted => "granted",
            AuthorizationOutcome::AlreadyAuthorized => "already_authorized",
        }
    }
}

impl fmt::Display for AuthorizationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// The resource the key may now write to.
    pub resource: DiscoveryKey,
    /// The decoded key.
    pub key: AccessKey,
    /// Whether this call granted the key.
    pub outcome: AuthorizationOutcome,
}

/// Writer authorization against the node's resources.
pub struct Authorizer {
    resources: Arc<dyn ResourceSet>,
    access_key_len: Option<usize>,
    case_insensitive_channels: bool,
}

impl Authorizer {
    /// Create an authorizer over `resources`.
    pub fn new(resources: Arc<dyn ResourceSet>, config: &SupervisorConfig) -> Self {
        Self {
            resources,
            access_key_len: config.access_key_len,
            case_insensitive_channels: config.case_insensitive_channels,
        }
    }

    /// Decode the identity's access key.
    pub fn decode_key(&self, identity: &IdentityClaim) -> Result<AccessKey, SupervisorError> {
        let invalid = |source| SupervisorError::InvalidAccessKey {
            key: identity.key.clone(),
            source,
        };

        let key = AccessKey::decode(&identity.key).map_err(invalid)?;
        if let Some(expected) = self.access_key_len {
            if key.len() != expected {
                return Err(invalid(KeyEncodingError::InvalidLength {
                    expected,
                    actual: key.len(),
                }));
            }
        }
        Ok(key)
    }

    /// Find the held resource whose discovery key matches `channel`.
    pub fn resolve(&self, channel: &str) -> Result<Arc<dyn Resource>, SupervisorError> {
        self.resources
            .resources()
            .into_iter()
            .find(|resource| {
                resource
                    .discovery_key()
                    .matches_channel(channel, self.case_insensitive_channels)
            })
            .ok_or_else(|| SupervisorError::UnknownResource {
                channel: channel.to_string(),
            })
    }

    /// Ensure `identity`'s key may write to the resource behind `channel`.
    pub async fn authorize(
        &self,
        identity: &IdentityClaim,
        channel: &str,
    ) -> Result<Authorization, SupervisorError> {
        let key = self.decode_key(identity)?;
        let resource = self.resolve(channel)?;
        let discovery_key = resource.discovery_key();

        resource.ready().await;
        debug!(resource = %discovery_key, "Resource ready");

        let store = resource.access_control();
        let outcome = if store.authorized(&key).await? {
            AuthorizationOutcome::AlreadyAuthorized
        } else {
            store.authorize(&key).await?;
            AuthorizationOutcome::Granted
        };

        AUTHORIZATIONS.with_label_values(&[outcome.as_str()]).inc();
        debug!(resource = %discovery_key, key = %key, outcome = %outcome, "Access key authorized");

        Ok(Authorization {
            resource: discovery_key,
            key,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryResource, InMemoryResourceSet};
    use crate::domain::AccessControlError;
    use shared_types::PublicKey;

    fn setup(config: SupervisorConfig) -> (Authorizer, Arc<InMemoryResource>) {
        let resource = Arc::new(InMemoryResource::new(PublicKey::new([7u8; 32])));
        let set = InMemoryResourceSet::new();
        set.add(resource.clone());
        (Authorizer::new(Arc::new(set), &config), resource)
    }

    #[tokio::test]
    async fn test_grants_new_key() {
        let (authorizer, resource) = setup(SupervisorConfig::for_testing());
        let channel = resource.discovery_key().encode();

        let auth = authorizer
            .authorize(&IdentityClaim::new("abc123"), &channel)
            .await
            .unwrap();

        assert_eq!(auth.outcome, AuthorizationOutcome::Granted);
        assert_eq!(auth.resource, resource.discovery_key());
        assert_eq!(auth.key.as_bytes(), &[0xab, 0xc1, 0x23]);
        assert!(resource.store().is_authorized(&auth.key));
        assert_eq!(resource.store().grant_calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_key_not_regranted() {
        let (authorizer, resource) = setup(SupervisorConfig::for_testing());
        resource.store().preauthorize(AccessKey::decode("abc123").unwrap());

        let auth = authorizer
            .authorize(&IdentityClaim::new("abc123"), &resource.discovery_key().encode())
            .await
            .unwrap();

        assert_eq!(auth.outcome, AuthorizationOutcome::AlreadyAuthorized);
        assert_eq!(resource.store().grant_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let (authorizer, resource) = setup(SupervisorConfig::for_testing());

        let err = authorizer
            .authorize(&IdentityClaim::new("abc123"), &"00".repeat(32))
            .await
            .unwrap_err();

        assert!(matches!(err, SupervisorError::UnknownResource { .. }));
        assert_eq!(resource.store().check_calls(), 0);
    }

    #[tokio::test]
    async fn test_channel_case() {
        let (authorizer, resource) = setup(SupervisorConfig::for_testing());
        let upper = resource.discovery_key().encode().to_uppercase();
        assert!(authorizer.resolve(&upper).is_ok());

        let strict = SupervisorConfig {
            case_insensitive_channels: false,
            ..SupervisorConfig::for_testing()
        };
        let (authorizer, _) = setup(strict);
        assert!(authorizer.resolve(&upper).is_err());
    }

    #[test]
    fn test_invalid_key_encoding() {
        let (authorizer, _) = setup(SupervisorConfig::for_testing());

        let err = authorizer.decode_key(&IdentityClaim::new("not-hex")).unwrap_err();
        assert_eq!(err.reason(), "invalid_access_key");

        let err = authorizer.decode_key(&IdentityClaim::new("")).unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::InvalidAccessKey { source: KeyEncodingError::Empty, .. }
        ));
    }

    #[test]
    fn test_key_length_enforced() {
        let config = SupervisorConfig {
            access_key_len: Some(32),
            ..SupervisorConfig::for_testing()
        };
        let (authorizer, _) = setup(config);

        let err = authorizer.decode_key(&IdentityClaim::new("abc123")).unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::InvalidAccessKey {
                source: KeyEncodingError::InvalidLength { expected: 32, actual: 3 },
                ..
            }
        ));
        assert!(authorizer.decode_key(&IdentityClaim::new("ab".repeat(32))).is_ok());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (authorizer, resource) = setup(SupervisorConfig::for_testing());
        resource.store().fail_grants(true);

        let err = authorizer
            .authorize(&IdentityClaim::new("abc123"), &resource.discovery_key().encode())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SupervisorError::AccessControl(AccessControlError::Grant(_))
        ));
    }
}
