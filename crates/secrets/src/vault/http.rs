//! Vault HTTP API backend built on `vaultrs`

use super::{VaultBackend, VaultConnector, VaultError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use url::Url;
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

/// Connects to Vault over HTTP
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpVaultConnector;

impl HttpVaultConnector {
    /// Create a new HTTP connector
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl VaultConnector for HttpVaultConnector {
    fn connect(&self, address: Option<&str>) -> Result<Box<dyn VaultBackend>, VaultError> {
        let mut settings = VaultClientSettingsBuilder::default();
        if let Some(address) = address {
            // the vaultrs address setter panics on strings it cannot parse
            parse_address(address)?;
            settings.address(address);
        }
        let settings = settings
            .build()
            .map_err(|e| VaultError::Setup(format!("Failed to build Vault client: {e}")))?;
        let client = VaultClient::new(settings)
            .map_err(|e| VaultError::Setup(format!("Failed to create Vault client: {e}")))?;

        Ok(Box::new(HttpVaultBackend { client }))
    }
}

/// [`VaultBackend`] over the Vault HTTP API
pub struct HttpVaultBackend {
    client: VaultClient,
}

impl std::fmt::Debug for HttpVaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVaultBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl VaultBackend for HttpVaultBackend {
    fn set_token(&mut self, token: &SecretString) {
        self.client.set_token(token.expose_secret());
    }

    async fn login_approle(
        &self,
        mount: &str,
        role_id: &str,
        secret_id: &SecretString,
    ) -> Result<SecretString, VaultError> {
        let auth =
            vaultrs::auth::approle::login(&self.client, mount, role_id, secret_id.expose_secret())
                .await
                .map_err(map_client_error)?;
        Ok(SecretString::from(auth.client_token))
    }

    async fn read_kv_v1(&self, mount: &str, path: &str) -> Result<Option<Value>, VaultError> {
        let data = vaultrs::kv1::get::<Map<String, Value>>(&self.client, mount, path).await;
        // vaultrs strips the response envelope, put it back so both engines
        // report the shape Vault sends on the wire
        not_found_as_none(data).map(|data| data.map(|data| json!({ "data": data })))
    }

    async fn read_kv_v2(&self, mount: &str, path: &str) -> Result<Option<Value>, VaultError> {
        let data = vaultrs::kv2::read::<Map<String, Value>>(&self.client, mount, path).await;
        not_found_as_none(data).map(|data| data.map(|data| json!({ "data": { "data": data } })))
    }
}

fn parse_address(address: &str) -> Result<Url, VaultError> {
    let url = Url::parse(address)
        .map_err(|e| VaultError::Setup(format!("Invalid Vault address '{address}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(VaultError::Setup(format!(
            "Invalid Vault address '{address}', expected an http(s) URL"
        )));
    }
    Ok(url)
}

fn not_found_as_none<T>(result: Result<T, ClientError>) -> Result<Option<T>, VaultError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ClientError::APIError { code: 404, .. }) => Ok(None),
        Err(e) => Err(map_client_error(e)),
    }
}

fn map_client_error(error: ClientError) -> VaultError {
    match error {
        ClientError::APIError { code, errors } => VaultError::Api {
            status: code,
            message: errors.join(", "),
        },
        other => VaultError::Transport(other.to_string()),
    }
}
