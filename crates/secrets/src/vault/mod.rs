//! HashiCorp Vault client construction and KV reads
//!
//! The resolver only talks to Vault through two small capabilities:
//! - [`VaultConnector`]: binds a client to an address
//! - [`VaultBackend`]: token assignment, AppRole login and raw KV reads
//!
//! [`create_vault_client`] combines them with a [`VaultConfig`] into a
//! [`VaultClient`], which is either ready to read or [`VaultClient::Unavailable`]
//! when no Vault integration is present at runtime.

#[cfg(feature = "vault")]
mod http;

#[cfg(feature = "vault")]
pub use http::{HttpVaultBackend, HttpVaultConnector};

use crate::SecretError;
use crate::config::{KvVersion, VaultConfig, VaultCredentials};
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a Vault backend
#[derive(Debug, Error)]
pub enum VaultError {
    /// The client could not be configured (bad address, TLS setup, ...)
    #[error("Vault client setup failed: {0}")]
    Setup(String),

    /// Vault answered with an error status
    #[error("Vault returned status {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error messages returned by Vault
        message: String,
    },

    /// The request did not complete
    #[error("Vault request failed: {0}")]
    Transport(String),
}

/// Raw access to a Vault server.
///
/// Reads return the response body as Vault sends it: `{"data": {...}}` for
/// KV v1 and `{"data": {"data": {...}, "metadata": {...}}}` for KV v2.
/// A missing secret is `Ok(None)`, not an error.
#[async_trait]
pub trait VaultBackend: Send + Sync {
    /// Use `token` for all subsequent requests.
    fn set_token(&mut self, token: &SecretString);

    /// Exchange an AppRole role id and secret id for a client token.
    async fn login_approle(
        &self,
        mount: &str,
        role_id: &str,
        secret_id: &SecretString,
    ) -> Result<SecretString, VaultError>;

    /// Read a secret from a KV v1 engine.
    async fn read_kv_v1(&self, mount: &str, path: &str) -> Result<Option<Value>, VaultError>;

    /// Read the latest version of a secret from a KV v2 engine.
    async fn read_kv_v2(&self, mount: &str, path: &str) -> Result<Option<Value>, VaultError>;
}

/// Creates [`VaultBackend`]s bound to an address.
pub trait VaultConnector: Send + Sync {
    /// Connect to `address`, or to the backend's default when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    fn connect(&self, address: Option<&str>) -> Result<Box<dyn VaultBackend>, VaultError>;
}

/// The connector used when none is injected.
///
/// Returns `None` when the crate is built without the `vault` feature.
#[must_use]
pub fn default_connector() -> Option<Arc<dyn VaultConnector>> {
    #[cfg(feature = "vault")]
    {
        Some(Arc::new(HttpVaultConnector::new()))
    }
    #[cfg(not(feature = "vault"))]
    {
        None
    }
}

/// A Vault client ready for KV reads, or the marker for a missing integration.
pub enum VaultClient {
    /// No Vault integration available at runtime
    Unavailable,
    /// Connected client
    Ready(ConnectedVault),
}

impl VaultClient {
    /// Check if the client can serve reads
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => f.write_str("VaultClient::Unavailable"),
            Self::Ready(vault) => f
                .debug_struct("VaultClient")
                .field("kv_version", &vault.kv_version)
                .field("kv_mount", &vault.kv_mount)
                .finish(),
        }
    }
}

/// An authenticated (or deliberately unauthenticated) Vault client
pub struct ConnectedVault {
    backend: Box<dyn VaultBackend>,
    kv_version: KvVersion,
    kv_mount: String,
}

impl ConnectedVault {
    /// KV engine version used for reads
    #[must_use]
    pub const fn kv_version(&self) -> KvVersion {
        self.kv_version
    }

    /// KV engine mount point used for reads
    #[must_use]
    pub fn kv_mount(&self) -> &str {
        &self.kv_mount
    }

    /// Read the secret data at `path`.
    ///
    /// The version-specific envelope is removed: KV v1 data lives under
    /// `data`, KV v2 data under `data.data`. Returns `None` when Vault has
    /// no secret at `path` or the payload carries no data mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the request itself fails.
    pub async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>, VaultError> {
        let payload = match self.kv_version {
            KvVersion::V1 => self.backend.read_kv_v1(&self.kv_mount, path).await?,
            KvVersion::V2 => self.backend.read_kv_v2(&self.kv_mount, path).await?,
        };
        Ok(payload.and_then(|payload| unwrap_payload(self.kv_version, payload)))
    }
}

fn unwrap_payload(kv_version: KvVersion, payload: Value) -> Option<Map<String, Value>> {
    let Value::Object(mut body) = payload else {
        return None;
    };
    let data = match kv_version {
        KvVersion::V1 => body.remove("data")?,
        KvVersion::V2 => match body.remove("data")? {
            Value::Object(mut versioned) => versioned.remove("data")?,
            _ => return None,
        },
    };
    match data {
        Value::Object(data) => Some(data),
        _ => None,
    }
}

/// Build a Vault client from configuration.
///
/// Without a connector the client is [`VaultClient::Unavailable`]. Otherwise
/// the client is bound to the configured address and KV version, then
/// authenticated with the configured token, or with an AppRole login when
/// only role credentials are present. With no credentials at all the client
/// stays unauthenticated and Vault itself will reject reads.
///
/// # Errors
///
/// Returns [`SecretError::VaultConnect`] if the client cannot be built and
/// [`SecretError::VaultAppRole`] if the AppRole login fails.
pub async fn create_vault_client(
    config: &VaultConfig,
    connector: Option<&dyn VaultConnector>,
) -> Result<VaultClient, SecretError> {
    let Some(connector) = connector else {
        return Ok(VaultClient::Unavailable);
    };

    let mut backend = connector
        .connect(config.address.as_deref())
        .map_err(|source| SecretError::VaultConnect { source })?;

    tracing::debug!(
        kv_version = %config.kv_version,
        mount = %config.kv_mount,
        "Using Vault secrets KV version {}",
        config.kv_version
    );

    match &config.credentials {
        VaultCredentials::Token(token) => backend.set_token(token),
        VaultCredentials::AppRole { role_id, secret_id } => {
            let token = backend
                .login_approle(&config.approle_mount, role_id, secret_id)
                .await
                .map_err(|source| SecretError::VaultAppRole { source })?;
            tracing::debug!(role_id = %role_id, "Authenticated to Vault with AppRole");
            backend.set_token(&token);
        }
        VaultCredentials::None => {
            tracing::debug!("No Vault credentials configured");
        }
    }

    Ok(VaultClient::Ready(ConnectedVault {
        backend,
        kv_version: config.kv_version,
        kv_mount: config.kv_mount.clone(),
    }))
}
