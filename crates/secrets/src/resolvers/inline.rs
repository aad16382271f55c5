//! Inline secret resolver

use crate::{ResolvedSecrets, SecretRef, SecretsSpec};

/// Collect the secrets written directly in the definition.
///
/// Every [`SecretRef::Literal`] is copied as-is; references are left to
/// the other resolvers.
#[must_use]
pub fn load_inline_secrets(spec: &SecretsSpec) -> ResolvedSecrets {
    let mut secrets = ResolvedSecrets::new();

    for (target, name, secret) in spec.iter() {
        if let SecretRef::Literal(value) = secret {
            secrets.insert(target, name, value.clone());
        }
    }

    secrets
}
