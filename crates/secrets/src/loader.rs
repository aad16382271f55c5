//! Secret loading orchestration

use crate::config::Configuration;
use crate::resolvers::{
    EnvProvider, ProcessEnv, load_inline_secrets, load_secrets_from_env, load_secrets_from_vault,
};
use crate::vault::{VaultConnector, default_connector};
use crate::{ResolvedSecrets, SecretError, SecretsSpec};
use std::sync::Arc;

/// Loads an experiment's secrets from every supported source.
///
/// Sources run in a fixed order: inline values, environment variables,
/// then Vault. Their results are merged per target, so when the same
/// secret name is produced twice the later source wins.
///
/// # Example
///
/// ```ignore
/// use chaoskit_secrets::{SecretLoader, SecretsSpec};
///
/// let loader = SecretLoader::new().with_env(fake_env);
/// let secrets = loader.load(&spec, &configuration).await?;
/// ```
#[derive(Clone)]
pub struct SecretLoader {
    env: Arc<dyn EnvProvider>,
    vault: Option<Arc<dyn VaultConnector>>,
}

impl Default for SecretLoader {
    fn default() -> Self {
        Self {
            env: Arc::new(ProcessEnv),
            vault: default_connector(),
        }
    }
}

impl SecretLoader {
    /// Create a loader over the process environment and the default Vault connector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read environment references from `env` instead of the process environment
    #[must_use]
    pub fn with_env(mut self, env: impl EnvProvider + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Connect to Vault through `connector`
    #[must_use]
    pub fn with_vault_connector(mut self, connector: impl VaultConnector + 'static) -> Self {
        self.vault = Some(Arc::new(connector));
        self
    }

    /// Treat the Vault integration as unavailable
    #[must_use]
    pub fn without_vault(mut self) -> Self {
        self.vault = None;
        self
    }

    /// Check if Vault references can be resolved
    #[must_use]
    pub fn has_vault(&self) -> bool {
        self.vault.is_some()
    }

    /// Resolve every secret of `spec`.
    ///
    /// # Errors
    ///
    /// Fails without a partial result when an environment reference cannot
    /// be resolved, when Vault authentication fails, or when Vault rejects
    /// a read. Secrets that are merely missing from Vault are skipped.
    pub async fn load(
        &self,
        spec: &SecretsSpec,
        configuration: &Configuration,
    ) -> Result<ResolvedSecrets, SecretError> {
        tracing::debug!(targets = spec.len(), "Loading secrets...");

        let mut secrets = load_inline_secrets(spec);
        secrets.merge(load_secrets_from_env(spec, self.env.as_ref())?);
        secrets.merge(
            load_secrets_from_vault(spec, configuration, self.vault.as_deref()).await?,
        );

        tracing::debug!(targets = secrets.len(), "Secrets loaded");
        Ok(secrets)
    }
}

impl std::fmt::Debug for SecretLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretLoader")
            .field("vault", &self.has_vault())
            .finish_non_exhaustive()
    }
}

/// Resolve `spec` with the process environment and the default Vault connector.
///
/// Shorthand for `SecretLoader::new().load(spec, configuration)`.
///
/// # Errors
///
/// See [`SecretLoader::load`].
pub async fn load_secrets(
    spec: &SecretsSpec,
    configuration: &Configuration,
) -> Result<ResolvedSecrets, SecretError> {
    SecretLoader::new().load(spec, configuration).await
}
