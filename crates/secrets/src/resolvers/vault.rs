//! HashiCorp Vault secret resolver
//!
//! A reference reads the secret at `path` from the KV engine and either
//! keeps the whole payload or, when `key` is given, a single field of it:
//!
//! ```json
//! {"type": "vault", "path": "foo/bar"}
//! {"type": "vault", "path": "foo/bar", "key": "mypassword"}
//! ```

use crate::config::{Configuration, VaultConfig};
use crate::vault::{VaultClient, VaultConnector, create_vault_client};
use crate::{ResolvedSecrets, SecretError, SecretRef, SecretsSpec};
use serde_json::Value;

/// Resolve every `vault` reference of the definition.
///
/// Entries that cannot be found are skipped with a warning: a reference
/// without `path`, a path with no secret, or a `key` missing from the
/// payload. When no Vault integration is available (`connector` is `None`)
/// nothing is resolved at all and an error is logged.
///
/// The client is only created when the definition holds at least one
/// Vault reference.
///
/// # Errors
///
/// Returns an error if the client cannot be created or authenticated, or
/// if Vault rejects a read for any reason other than a missing secret.
pub async fn load_secrets_from_vault(
    spec: &SecretsSpec,
    configuration: &Configuration,
    connector: Option<&dyn VaultConnector>,
) -> Result<ResolvedSecrets, SecretError> {
    let mut secrets = ResolvedSecrets::new();

    if !spec.has_vault_refs() {
        return Ok(secrets);
    }

    let config = VaultConfig::from_configuration(configuration);
    let VaultClient::Ready(vault) = create_vault_client(&config, connector).await? else {
        tracing::error!(
            "Vault support is not available, secrets from Vault will not be loaded. \
             Enable the `vault` feature of chaoskit-secrets"
        );
        return Ok(ResolvedSecrets::new());
    };

    for (target, name, secret) in spec.iter() {
        let SecretRef::Vault { path, key } = secret else {
            continue;
        };

        let Some(path) = path.as_deref() else {
            tracing::warn!(
                target_name = target,
                secret = name,
                "Missing Vault secret path for '{name}'"
            );
            continue;
        };

        let data = vault
            .read(path)
            .await
            .map_err(|source| SecretError::VaultRead {
                path: path.to_string(),
                source,
            })?;

        let Some(mut data) = data else {
            tracing::warn!(
                target_name = target,
                secret = name,
                path,
                "No Vault secret found at path: {path}"
            );
            continue;
        };

        let value = match key {
            Some(key) => {
                let Some(value) = key.as_field().and_then(|field| data.remove(field)) else {
                    tracing::warn!(
                        target_name = target,
                        secret = name,
                        path,
                        key = %key,
                        "No Vault key '{key}' at secret path '{path}'"
                    );
                    continue;
                };
                value
            }
            None => Value::Object(data),
        };

        secrets.insert(target, name, value);
    }

    Ok(secrets)
}
