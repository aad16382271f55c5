//! Secrets definition and resolved secrets
//!
//! This module provides the two shapes that flow through secret loading:
//! - [`SecretsSpec`]: the declarative `secrets` block of an experiment,
//!   target name -> secret name -> [`SecretRef`]
//! - [`ResolvedSecrets`]: the same shape with every reference replaced by
//!   its concrete value

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Secret name -> resolved value, for a single target.
pub type TargetSecrets = BTreeMap<String, Value>;

/// A single entry of a secrets definition.
///
/// The variant is decided by the `type` field of a JSON object:
///
/// ```json
/// "api_url": "http://1.2.3.4"
/// "token":   {"type": "env", "key": "API_TOKEN"}
/// "db":      {"type": "vault", "path": "app/db", "key": "password"}
/// ```
#[derive(Clone, PartialEq)]
pub enum SecretRef {
    /// Inline value, used as-is
    Literal(Value),

    /// Reference to a process environment variable
    Env {
        /// Environment variable name, `None` when the reference omits it
        key: Option<String>,
    },

    /// Reference to a Vault KV secret
    Vault {
        /// Secret path below the KV mount
        path: Option<String>,
        /// Field within the secret payload; the whole payload when absent
        key: Option<VaultKey>,
    },
}

/// The `key` of a Vault reference
#[derive(Debug, Clone, PartialEq)]
pub enum VaultKey {
    /// Name of a field in the secret payload
    Field(String),
    /// A `key` that is set but is not a string. It never matches a field.
    Invalid(Value),
}

impl VaultKey {
    /// The field name, `None` for an invalid key
    #[must_use]
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Self::Field(name) => Some(name),
            Self::Invalid(_) => None,
        }
    }
}

impl std::fmt::Display for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Invalid(value) => write!(f, "{value}"),
        }
    }
}

impl SecretRef {
    /// Classify a raw JSON value from a secrets definition.
    ///
    /// Objects tagged with `"type": "env"` or `"type": "vault"` become
    /// references. Anything else, including objects carrying an unknown
    /// `type`, is kept as a literal. A misspelled tag therefore passes
    /// through verbatim rather than failing.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(fields) = value else {
            return Self::Literal(value);
        };

        match fields.get("type").and_then(Value::as_str) {
            Some("env") => Self::Env {
                key: string_field(&fields, "key"),
            },
            Some("vault") => Self::Vault {
                path: string_field(&fields, "path"),
                key: fields.get("key").map(|key| match key {
                    Value::String(name) => VaultKey::Field(name.clone()),
                    other => VaultKey::Invalid(other.clone()),
                }),
            },
            _ => Self::Literal(Value::Object(fields)),
        }
    }

    /// Create an environment variable reference
    #[must_use]
    pub fn env(key: impl Into<String>) -> Self {
        Self::Env {
            key: Some(key.into()),
        }
    }

    /// Create a Vault reference to a whole secret payload
    #[must_use]
    pub fn vault(path: impl Into<String>) -> Self {
        Self::Vault {
            path: Some(path.into()),
            key: None,
        }
    }

    /// Create a Vault reference to a single field of a secret
    #[must_use]
    pub fn vault_key(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Vault {
            path: Some(path.into()),
            key: Some(VaultKey::Field(key.into())),
        }
    }

    /// Convert back to the JSON shape used in experiment files
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Env { key } => {
                let mut fields = Map::new();
                fields.insert("type".to_string(), Value::from("env"));
                if let Some(key) = key {
                    fields.insert("key".to_string(), Value::from(key.as_str()));
                }
                Value::Object(fields)
            }
            Self::Vault { path, key } => {
                let mut fields = Map::new();
                fields.insert("type".to_string(), Value::from("vault"));
                if let Some(path) = path {
                    fields.insert("path".to_string(), Value::from(path.as_str()));
                }
                match key {
                    Some(VaultKey::Field(name)) => {
                        fields.insert("key".to_string(), Value::from(name.as_str()));
                    }
                    Some(VaultKey::Invalid(value)) => {
                        fields.insert("key".to_string(), value.clone());
                    }
                    None => {}
                }
                Value::Object(fields)
            }
        }
    }
}

/// Read a reference field; `null` is absent, other scalars use their JSON text.
///
/// Vault `key` fields are read separately, see [`VaultKey`].
fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl From<Value> for SecretRef {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl std::fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("Literal([REDACTED])"),
            Self::Env { key } => f.debug_struct("Env").field("key", key).finish(),
            Self::Vault { path, key } => f
                .debug_struct("Vault")
                .field("path", path)
                .field("key", key)
                .finish(),
        }
    }
}

impl Serialize for SecretRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// Declarative secrets definition: target -> secret name -> reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretsSpec {
    targets: BTreeMap<String, BTreeMap<String, SecretRef>>,
}

impl SecretsSpec {
    /// Create an empty definition
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a definition from the JSON `secrets` block of an experiment.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a mapping of mappings.
    pub fn from_value(value: Value) -> Result<Self, crate::SecretError> {
        serde_json::from_value(value).map_err(crate::SecretError::InvalidDefinition)
    }

    /// Add a secret reference under a target
    pub fn insert(
        &mut self,
        target: impl Into<String>,
        name: impl Into<String>,
        secret: impl Into<SecretRef>,
    ) {
        self.targets
            .entry(target.into())
            .or_default()
            .insert(name.into(), secret.into());
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with(
        mut self,
        target: impl Into<String>,
        name: impl Into<String>,
        secret: impl Into<SecretRef>,
    ) -> Self {
        self.insert(target, name, secret);
        self
    }

    /// Iterate over `(target, secret name, reference)` triples
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &SecretRef)> {
        self.targets.iter().flat_map(|(target, secrets)| {
            secrets
                .iter()
                .map(move |(name, secret)| (target.as_str(), name.as_str(), secret))
        })
    }

    /// Whether any entry is a Vault reference
    #[must_use]
    pub fn has_vault_refs(&self) -> bool {
        self.iter()
            .any(|(_, _, secret)| matches!(secret, SecretRef::Vault { .. }))
    }

    /// Number of targets
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if the definition has no targets
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Secrets resolved to concrete values, keyed by target.
///
/// A target is only present when at least one of its secrets resolved.
/// Values are strings for environment lookups and arbitrary JSON for
/// inline literals and Vault payloads.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedSecrets {
    targets: BTreeMap<String, TargetSecrets>,
}

impl ResolvedSecrets {
    /// Create empty resolved secrets
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a resolved value, creating the target on demand
    pub fn insert(&mut self, target: impl Into<String>, name: impl Into<String>, value: Value) {
        self.targets
            .entry(target.into())
            .or_default()
            .insert(name.into(), value);
    }

    /// Merge another result into this one.
    ///
    /// Targets are merged shallowly: secrets from `other` overwrite secrets
    /// with the same name in the same target, other secrets are kept.
    pub fn merge(&mut self, other: Self) {
        for (target, secrets) in other.targets {
            if secrets.is_empty() {
                continue;
            }
            self.targets.entry(target).or_default().extend(secrets);
        }
    }

    /// Get all secrets of a target
    #[must_use]
    pub fn get(&self, target: &str) -> Option<&TargetSecrets> {
        self.targets.get(target)
    }

    /// Get a single resolved secret
    #[must_use]
    pub fn get_secret(&self, target: &str, name: &str) -> Option<&Value> {
        self.targets.get(target)?.get(name)
    }

    /// Check if a target has any resolved secret
    #[must_use]
    pub fn contains_target(&self, target: &str) -> bool {
        self.targets.contains_key(target)
    }

    /// Iterate over target names
    pub fn targets(&self) -> impl Iterator<Item = &String> {
        self.targets.keys()
    }

    /// Number of targets
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if nothing was resolved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Take the underlying map.
    ///
    /// # Warning
    ///
    /// This exposes all secret values. Do not log the result.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, TargetSecrets> {
        self.targets
    }
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: BTreeMap<&String, Vec<&String>> = self
            .targets
            .iter()
            .map(|(target, secrets)| (target, secrets.keys().collect()))
            .collect();
        f.debug_struct("ResolvedSecrets")
            .field("targets", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_is_literal() {
        assert_eq!(
            SecretRef::from_value(json!("http://1.2.3.4")),
            SecretRef::Literal(json!("http://1.2.3.4"))
        );
        assert_eq!(
            SecretRef::from_value(json!(8090)),
            SecretRef::Literal(json!(8090))
        );
    }

    #[test]
    fn untagged_object_is_literal() {
        let value = json!({"host": "whatever", "port": 8090});
        assert_eq!(
            SecretRef::from_value(value.clone()),
            SecretRef::Literal(value)
        );
    }

    #[test]
    fn unknown_type_tag_is_literal() {
        let value = json!({"type": "vualt", "path": "foo/bar"});
        assert_eq!(
            SecretRef::from_value(value.clone()),
            SecretRef::Literal(value)
        );
    }

    #[test]
    fn env_tag() {
        let secret = SecretRef::from_value(json!({"type": "env", "key": "KUBE_API_URL"}));
        assert_eq!(secret, SecretRef::env("KUBE_API_URL"));
    }

    #[test]
    fn env_tag_without_key() {
        let secret = SecretRef::from_value(json!({"type": "env"}));
        assert_eq!(secret, SecretRef::Env { key: None });
    }

    #[test]
    fn vault_tag_with_and_without_key() {
        assert_eq!(
            SecretRef::from_value(json!({"type": "vault", "path": "foo/bar"})),
            SecretRef::vault("foo/bar")
        );
        assert_eq!(
            SecretRef::from_value(json!({"type": "vault", "path": "foo/bar", "key": "pw"})),
            SecretRef::vault_key("foo/bar", "pw")
        );
    }

    #[test]
    fn vault_tag_null_path_is_absent() {
        assert_eq!(
            SecretRef::from_value(json!({"type": "vault", "path": null})),
            SecretRef::Vault {
                path: None,
                key: None
            }
        );
    }

    #[test]
    fn vault_tag_non_string_key_is_invalid() {
        assert_eq!(
            SecretRef::from_value(json!({"type": "vault", "path": "p", "key": 3})),
            SecretRef::Vault {
                path: Some("p".to_string()),
                key: Some(VaultKey::Invalid(json!(3)))
            }
        );
        assert_eq!(
            SecretRef::from_value(json!({"type": "vault", "path": "p", "key": null})),
            SecretRef::Vault {
                path: Some("p".to_string()),
                key: Some(VaultKey::Invalid(Value::Null))
            }
        );
    }

    #[test]
    fn invalid_vault_key_serializes_unchanged() {
        let raw = json!({"type": "vault", "path": "p", "key": null});
        let json = serde_json::to_value(SecretRef::from_value(raw.clone())).unwrap();
        assert_eq!(json, raw);
    }

    #[test]
    fn secret_ref_serializes_to_experiment_shape() {
        let json = serde_json::to_value(SecretRef::vault_key("foo/bar", "pw")).unwrap();
        assert_eq!(json, json!({"type": "vault", "path": "foo/bar", "key": "pw"}));

        let json = serde_json::to_value(SecretRef::env("HOME")).unwrap();
        assert_eq!(json, json!({"type": "env", "key": "HOME"}));
    }

    #[test]
    fn literal_debug_is_redacted() {
        let secret = SecretRef::Literal(json!("my-super-secret-password"));
        let debug = format!("{secret:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("password"));
    }

    #[test]
    fn spec_from_experiment_block() {
        let spec = SecretsSpec::from_value(json!({
            "kubernetes": {
                "api_server_url": "http://1.2.3.4",
                "token": {"type": "env", "key": "KUBE_TOKEN"}
            },
            "db": {
                "password": {"type": "vault", "path": "app/db", "key": "password"}
            }
        }))
        .unwrap();

        assert_eq!(spec.len(), 2);
        assert!(spec.has_vault_refs());

        let entries: Vec<_> = spec.iter().collect();
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&("kubernetes", "token", &SecretRef::env("KUBE_TOKEN"))));
    }

    #[test]
    fn spec_rejects_non_mapping_target() {
        let result = SecretsSpec::from_value(json!({"kubernetes": "oops"}));
        assert!(matches!(
            result,
            Err(crate::SecretError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn spec_without_vault_refs() {
        let spec = SecretsSpec::new()
            .with("t1", "s1", json!("v1"))
            .with("t2", "s2", SecretRef::env("MYVAR"));
        assert!(!spec.has_vault_refs());
    }

    #[test]
    fn resolved_merge_is_shallow_per_target() {
        let mut first = ResolvedSecrets::new();
        first.insert("k8s", "user", json!("jane"));
        first.insert("k8s", "url", json!("inline"));

        let mut second = ResolvedSecrets::new();
        second.insert("k8s", "url", json!("from-env"));
        second.insert("db", "password", json!("shhh"));

        first.merge(second);

        assert_eq!(first.len(), 2);
        assert_eq!(first.get_secret("k8s", "user"), Some(&json!("jane")));
        assert_eq!(first.get_secret("k8s", "url"), Some(&json!("from-env")));
        assert_eq!(first.get_secret("db", "password"), Some(&json!("shhh")));
    }

    #[test]
    fn resolved_merge_skips_empty_targets() {
        let other: ResolvedSecrets =
            serde_json::from_value(json!({"empty": {}, "t": {"s": 1}})).unwrap();
        let mut resolved = ResolvedSecrets::new();
        resolved.merge(other);

        assert!(!resolved.contains_target("empty"));
        assert!(resolved.contains_target("t"));
    }

    #[test]
    fn resolved_debug_hides_values() {
        let mut resolved = ResolvedSecrets::new();
        resolved.insert("db", "password", json!("hunter2"));

        let debug = format!("{resolved:?}");
        assert!(debug.contains("db"));
        assert!(debug.contains("password"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn resolved_serializes_as_plain_map() {
        let mut resolved = ResolvedSecrets::new();
        resolved.insert("t1", "s1", json!("v1"));
        assert_eq!(
            serde_json::to_value(&resolved).unwrap(),
            json!({"t1": {"s1": "v1"}})
        );
    }
}
