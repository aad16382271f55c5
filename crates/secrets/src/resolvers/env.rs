//! Environment variable secret resolver

use crate::{ResolvedSecrets, SecretError, SecretRef, SecretsSpec};
use serde_json::Value;
use std::collections::HashMap;

/// Read-only view of environment variables
pub trait EnvProvider: Send + Sync {
    /// Look up a variable, `None` when it is not set.
    ///
    /// A value that is not valid unicode is converted lossily.
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|value| value.to_string_lossy().into_owned())
    }
}

impl EnvProvider for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Resolve every `env` reference of the definition.
///
/// # Errors
///
/// A referenced variable that is not set makes the experiment unrunnable:
/// the first one found aborts the whole resolution with
/// [`SecretError::MissingEnvVar`]. A reference without a `key` fails with
/// [`SecretError::MissingEnvKey`].
pub fn load_secrets_from_env(
    spec: &SecretsSpec,
    env: &dyn EnvProvider,
) -> Result<ResolvedSecrets, SecretError> {
    let mut secrets = ResolvedSecrets::new();

    for (target, name, secret) in spec.iter() {
        let SecretRef::Env { key } = secret else {
            continue;
        };
        let key = key.as_deref().ok_or_else(|| SecretError::MissingEnvKey {
            target: target.to_string(),
            name: name.to_string(),
        })?;
        let value = env.var(key).ok_or_else(|| SecretError::MissingEnvVar {
            target: target.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        })?;
        secrets.insert(target, name, Value::String(value));
    }

    Ok(secrets)
}
