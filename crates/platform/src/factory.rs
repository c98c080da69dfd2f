use std::collections::HashMap;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::debug;

use sentra_core::config::ZscalerConfig;
use sentra_core::{TenantCredential, ToolError};

use crate::Client;

/// Fully resolved credential set, ready to mint a client. Unlike
/// [`TenantCredential`], nothing here is optional except the customer id
/// (which only ZPA operations need).
#[derive(Clone)]
pub struct ResolvedCredential {
    pub client_id: String,
    pub client_secret: SecretString,
    pub vanity_domain: String,
    pub customer_id: Option<String>,
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("vanity_domain", &self.vanity_domain)
            .field("customer_id", &self.customer_id)
            .finish()
    }
}

impl ResolvedCredential {
    /// Resolve a tenant directory record, failing with the tenant and field
    /// name when a required piece is missing.
    pub fn from_tenant(record: &TenantCredential) -> Result<Self, ToolError> {
        Ok(Self {
            client_id: record.require_client_id()?.to_string(),
            client_secret: record.require_client_secret()?.clone(),
            vanity_domain: record.require_vanity_domain()?.to_string(),
            customer_id: record.customer_id.clone(),
        })
    }

    /// Resolve environment-level defaults. Only reached when a tool call
    /// supplied no tenant name; a named tenant never falls back here.
    pub fn from_environment(config: &ZscalerConfig) -> Result<Self, ToolError> {
        let missing = |field: &str| ToolError::Auth {
            context: "environment credential source".to_string(),
            message: format!(
                "no tenant name was supplied and SENTRA_ZSCALER_{} is not configured",
                field.to_uppercase()
            ),
        };

        Ok(Self {
            client_id: config.client_id.clone().ok_or_else(|| missing("client_id"))?,
            client_secret: config.client_secret.clone().ok_or_else(|| missing("client_secret"))?,
            vanity_domain: config.vanity_domain.clone().ok_or_else(|| missing("vanity_domain"))?,
            customer_id: config.customer_id.clone(),
        })
    }

    /// Cache key: identifies the credential set, including secret material,
    /// without being reversible to it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.client_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.client_secret.expose_secret().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.vanity_domain.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.customer_id.as_deref().unwrap_or("").as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// Builds authenticated clients and caches one per credential fingerprint.
///
/// Clients are immutable after construction (their bearer token refreshes
/// internally), so sharing the cached `Arc<Client>` across concurrent tool
/// calls is safe.
pub struct ClientFactory {
    environment: Option<ResolvedCredential>,
    cache: RwLock<HashMap<String, Arc<Client>>>,
}

impl ClientFactory {
    pub fn new(config: &ZscalerConfig) -> Self {
        Self {
            environment: ResolvedCredential::from_environment(config).ok(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached client for this credential set, building one on
    /// first use.
    pub async fn client_for(&self, credential: &ResolvedCredential) -> Arc<Client> {
        let fingerprint = credential.fingerprint();
        {
            let cache = self.cache.read().await;
            if let Some(client) = cache.get(&fingerprint) {
                return Arc::clone(client);
            }
        }

        let mut cache = self.cache.write().await;
        // Re-check under the write lock; another caller may have won the race.
        if let Some(client) = cache.get(&fingerprint) {
            return Arc::clone(client);
        }
        debug!(vanity_domain = %credential.vanity_domain, "building platform client");
        let client = Arc::new(Client::new(credential.clone()));
        cache.insert(fingerprint, Arc::clone(&client));
        client
    }

    /// Client from environment-level credentials. Logged distinctly so
    /// tenant-scoped and ambient resolution are never confused in traces.
    pub async fn default_client(&self) -> Result<Arc<Client>, ToolError> {
        let credential = self.environment.clone().ok_or_else(|| ToolError::Auth {
            context: "environment credential source".to_string(),
            message: "no tenant name was supplied and no environment credentials are configured"
                .to_string(),
        })?;
        debug!(credential_source = "environment", "resolving default platform client");
        Ok(self.client_for(&credential).await)
    }

    /// Drop the cached client for a credential fingerprint, forcing a
    /// rebuild (and token re-handshake) on next use.
    pub async fn invalidate(&self, fingerprint: &str) -> bool {
        self.cache.write().await.remove(fingerprint).is_some()
    }

    #[doc(hidden)]
    pub async fn cached_clients(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use sentra_core::config::ZscalerConfig;
    use sentra_core::{TenantCredential, ToolError};

    use super::{ClientFactory, ResolvedCredential};

    fn tenant() -> TenantCredential {
        TenantCredential {
            name: "acme".to_string(),
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string().into()),
            vanity_domain: Some("acme".to_string()),
            customer_id: None,
            test_tenant: false,
        }
    }

    fn env_config() -> ZscalerConfig {
        ZscalerConfig {
            client_id: Some("env-id".to_string()),
            client_secret: Some("env-secret".to_string().into()),
            vanity_domain: Some("envco".to_string()),
            customer_id: None,
        }
    }

    #[test]
    fn tenant_missing_secret_is_a_missing_credential_error() {
        let mut record = tenant();
        record.client_secret = None;
        let error = ResolvedCredential::from_tenant(&record).unwrap_err();
        assert!(matches!(error, ToolError::MissingCredential { field: "client_secret", .. }));
    }

    #[test]
    fn fingerprint_is_stable_and_secret_sensitive() {
        let a = ResolvedCredential::from_tenant(&tenant()).unwrap();
        let b = ResolvedCredential::from_tenant(&tenant()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut other = tenant();
        other.client_secret = Some("different".to_string().into());
        let c = ResolvedCredential::from_tenant(&other).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert!(!a.fingerprint().contains("secret"));
    }

    #[test]
    fn debug_output_redacts_the_secret() {
        let credential = ResolvedCredential::from_tenant(&tenant()).unwrap();
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn factory_caches_one_client_per_credential() {
        let factory = ClientFactory::new(&ZscalerConfig::default());
        let credential = ResolvedCredential::from_tenant(&tenant()).unwrap();

        let first = factory.client_for(&credential).await;
        let second = factory.client_for(&credential).await;
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(factory.cached_clients().await, 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_rebuild() {
        let factory = ClientFactory::new(&ZscalerConfig::default());
        let credential = ResolvedCredential::from_tenant(&tenant()).unwrap();

        let first = factory.client_for(&credential).await;
        assert!(factory.invalidate(&credential.fingerprint()).await);
        let second = factory.client_for(&credential).await;
        assert!(!std::sync::Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn default_client_requires_environment_credentials() {
        let factory = ClientFactory::new(&ZscalerConfig::default());
        let error = factory.default_client().await.unwrap_err();
        assert!(matches!(error, ToolError::Auth { .. }));

        let configured = ClientFactory::new(&env_config());
        assert!(configured.default_client().await.is_ok());
    }
}
