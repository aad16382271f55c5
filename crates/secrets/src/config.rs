//! Vault connection settings read from the experiment configuration

use secrecy::SecretString;
use serde_json::{Map, Value};

/// Free-form experiment configuration.
pub type Configuration = Map<String, Value>;

/// Configuration key for the Vault address
pub const VAULT_ADDR: &str = "vault_addr";
/// Configuration key for the KV engine version
pub const VAULT_KV_VERSION: &str = "vault_kv_version";
/// Configuration key for the KV engine mount point
pub const VAULT_SECRETS_MOUNT_POINT: &str = "vault_secrets_mount_point";
/// Configuration key for a static Vault token
pub const VAULT_TOKEN: &str = "vault_token";
/// Configuration key for the AppRole role id
pub const VAULT_ROLE_ID: &str = "vault_role_id";
/// Configuration key for the AppRole secret id
pub const VAULT_ROLE_SECRET: &str = "vault_role_secret";

const DEFAULT_KV_MOUNT: &str = "secret";
const DEFAULT_APPROLE_MOUNT: &str = "approle";

/// Vault KV secrets engine version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KvVersion {
    /// KV v1: the secret is stored directly at the path
    V1,
    /// KV v2: versioned secrets, payload nested under `data.data`
    #[default]
    V2,
}

impl KvVersion {
    /// Parse a configured version; accepts `"1"`, `"2"`, `1` and `2`.
    #[must_use]
    pub fn parse(value: &Value) -> Option<Self> {
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        match text.as_str() {
            "1" => Some(Self::V1),
            "2" => Some(Self::V2),
            _ => None,
        }
    }

    /// Version as used in configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2 => "2",
        }
    }
}

impl std::fmt::Display for KvVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the Vault client authenticates
#[derive(Debug, Clone, Default)]
pub enum VaultCredentials {
    /// Static token assigned to the client
    Token(SecretString),

    /// AppRole login exchanged for a session token
    AppRole {
        /// Role id
        role_id: String,
        /// Secret id
        secret_id: SecretString,
    },

    /// No credentials configured; requests go out unauthenticated
    #[default]
    None,
}

/// Typed view over the `vault_*` configuration keys
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault address; the client default applies when absent
    pub address: Option<String>,

    /// KV engine version (defaults to 2)
    pub kv_version: KvVersion,

    /// KV engine mount point (defaults to "secret")
    pub kv_mount: String,

    /// AppRole auth mount point
    pub approle_mount: String,

    /// Authentication strategy
    pub credentials: VaultCredentials,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: None,
            kv_version: KvVersion::default(),
            kv_mount: DEFAULT_KV_MOUNT.to_string(),
            approle_mount: DEFAULT_APPROLE_MOUNT.to_string(),
            credentials: VaultCredentials::None,
        }
    }
}

impl VaultConfig {
    /// Extract Vault settings from an experiment configuration.
    ///
    /// A `vault_token` takes precedence over AppRole credentials. AppRole is
    /// only used when both `vault_role_id` and `vault_role_secret` are set.
    #[must_use]
    pub fn from_configuration(configuration: &Configuration) -> Self {
        let kv_version = match configuration.get(VAULT_KV_VERSION) {
            None | Some(Value::Null) => KvVersion::default(),
            Some(raw) => KvVersion::parse(raw).unwrap_or_else(|| {
                tracing::warn!(
                    kv_version = %raw,
                    "Unsupported Vault KV version, falling back to version 2"
                );
                KvVersion::V2
            }),
        };

        let credentials = if let Some(token) = text_value(configuration, VAULT_TOKEN) {
            VaultCredentials::Token(SecretString::from(token))
        } else if let (Some(role_id), Some(secret_id)) = (
            text_value(configuration, VAULT_ROLE_ID),
            text_value(configuration, VAULT_ROLE_SECRET),
        ) {
            VaultCredentials::AppRole {
                role_id,
                secret_id: SecretString::from(secret_id),
            }
        } else {
            VaultCredentials::None
        };

        Self {
            address: text_value(configuration, VAULT_ADDR),
            kv_version,
            kv_mount: text_value(configuration, VAULT_SECRETS_MOUNT_POINT)
                .unwrap_or_else(|| DEFAULT_KV_MOUNT.to_string()),
            approle_mount: DEFAULT_APPROLE_MOUNT.to_string(),
            credentials,
        }
    }
}

fn text_value(configuration: &Configuration, key: &str) -> Option<String> {
    match configuration.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
