//! Secret resolution for chaoskit experiments
//!
//! An experiment declares its secrets per target. Each secret is either an
//! inline value or a reference to an environment variable or to a
//! HashiCorp Vault KV secret:
//!
//! ```json
//! {
//!     "kubernetes": {
//!         "api_server_url": "http://1.2.3.4",
//!         "token": {"type": "env", "key": "KUBE_TOKEN"},
//!         "certs": {"type": "vault", "path": "k8s/certs", "key": "ca"}
//!     }
//! }
//! ```
//!
//! [`load_secrets`] turns such a definition into the same shape with every
//! reference replaced by its value:
//!
//! ```ignore
//! use chaoskit_secrets::{Configuration, SecretsSpec, load_secrets};
//!
//! let spec = SecretsSpec::from_value(experiment["secrets"].clone())?;
//! let secrets = load_secrets(&spec, &configuration).await?;
//! let token = secrets.get_secret("kubernetes", "token");
//! ```
//!
//! Vault connection settings come from the experiment configuration
//! (`vault_addr`, `vault_kv_version`, `vault_token`, `vault_role_id`,
//! `vault_role_secret`, `vault_secrets_mount_point`). The HTTP client is
//! behind the default `vault` feature; without it Vault references are
//! left unresolved.

mod config;
mod loader;
pub mod resolvers;
#[cfg(test)]
mod test_utils;
mod types;
pub mod vault;

pub use config::{Configuration, KvVersion, VaultConfig, VaultCredentials};
pub use loader::{SecretLoader, load_secrets};
pub use resolvers::{
    EnvProvider, ProcessEnv, load_inline_secrets, load_secrets_from_env, load_secrets_from_vault,
};
pub use types::{ResolvedSecrets, SecretRef, SecretsSpec, TargetSecrets, VaultKey};
pub use vault::{
    ConnectedVault, VaultBackend, VaultClient, VaultConnector, VaultError, create_vault_client,
};

use thiserror::Error;

/// Error types for secret resolution
#[derive(Debug, Error)]
pub enum SecretError {
    /// An env reference names a variable that is not set
    #[error("Secrets make reference to an environment key that does not exist: {key}")]
    MissingEnvVar {
        /// Target holding the secret
        target: String,
        /// Secret name
        name: String,
        /// Environment variable name
        key: String,
    },

    /// An env reference has no `key` field
    #[error("Secret '{name}' of target '{target}' is an env reference without a key")]
    MissingEnvKey {
        /// Target holding the secret
        target: String,
        /// Secret name
        name: String,
    },

    /// The Vault client could not be constructed
    #[error("Failed to create Vault client: {source}")]
    VaultConnect {
        /// Underlying Vault error
        #[source]
        source: VaultError,
    },

    /// AppRole login was rejected or failed
    #[error("Failed to connect to Vault with the AppRole: {source}")]
    VaultAppRole {
        /// Underlying Vault error
        #[source]
        source: VaultError,
    },

    /// Vault failed to serve a read
    #[error("Failed to read Vault secret at '{path}': {source}")]
    VaultRead {
        /// Secret path
        path: String,
        /// Underlying Vault error
        #[source]
        source: VaultError,
    },

    /// The secrets definition does not have the target -> name -> secret shape
    #[error("Invalid secrets definition: {0}")]
    InvalidDefinition(#[source] serde_json::Error),
}

impl SecretError {
    /// Whether the error means the experiment cannot run as declared.
    ///
    /// These are operator mistakes (a missing variable, bad credentials, a
    /// malformed definition) rather than failures of the Vault server.
    #[must_use]
    pub const fn is_invalid_experiment(&self) -> bool {
        !matches!(self, Self::VaultRead { .. })
    }
}
