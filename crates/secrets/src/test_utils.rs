//! In-memory Vault double for unit tests

use crate::vault::{VaultBackend, VaultConnector, VaultError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    addresses: Vec<Option<String>>,
    token: Option<String>,
    approle_token: Option<String>,
    approle_fails: bool,
    connect_fails: bool,
    approle_logins: Vec<(String, String, String)>,
    kv_v1: HashMap<String, Value>,
    kv_v2: HashMap<String, Value>,
    reads: Vec<(String, String, String)>,
}

/// Fake Vault: serves canned payloads and records every interaction.
///
/// Clones share state, so a test keeps one handle while the loader owns
/// the backend created from it.
#[derive(Debug, Clone, Default)]
pub struct FakeVault {
    state: Arc<Mutex<State>>,
}

impl FakeVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_kv_v1(self, path: &str, payload: Value) -> Self {
        self.state().kv_v1.insert(path.to_string(), payload);
        self
    }

    pub fn with_kv_v2(self, path: &str, payload: Value) -> Self {
        self.state().kv_v2.insert(path.to_string(), payload);
        self
    }

    pub fn with_approle_token(self, token: &str) -> Self {
        self.state().approle_token = Some(token.to_string());
        self
    }

    pub fn with_approle_failure(self) -> Self {
        self.state().approle_fails = true;
        self
    }

    pub fn with_connect_failure(self) -> Self {
        self.state().connect_fails = true;
        self
    }

    pub fn token(&self) -> Option<String> {
        self.state().token.clone()
    }

    pub fn addresses(&self) -> Vec<Option<String>> {
        self.state().addresses.clone()
    }

    pub fn approle_logins(&self) -> Vec<(String, String, String)> {
        self.state().approle_logins.clone()
    }

    /// `(engine, mount, path)` for each read, in order
    pub fn reads(&self) -> Vec<(String, String, String)> {
        self.state().reads.clone()
    }

    fn read(&self, engine: &str, mount: &str, path: &str) -> Result<Option<Value>, VaultError> {
        let mut state = self.state();
        state
            .reads
            .push((engine.to_string(), mount.to_string(), path.to_string()));
        if state.token.is_none() {
            return Err(VaultError::Api {
                status: 403,
                message: "permission denied".to_string(),
            });
        }
        let store = if engine == "v1" {
            &state.kv_v1
        } else {
            &state.kv_v2
        };
        Ok(store.get(path).cloned())
    }
}

impl VaultConnector for FakeVault {
    fn connect(&self, address: Option<&str>) -> Result<Box<dyn VaultBackend>, VaultError> {
        let mut state = self.state();
        state.addresses.push(address.map(str::to_string));
        if state.connect_fails {
            return Err(VaultError::Setup("invalid address".to_string()));
        }
        drop(state);
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl VaultBackend for FakeVault {
    fn set_token(&mut self, token: &SecretString) {
        self.state().token = Some(token.expose_secret().to_string());
    }

    async fn login_approle(
        &self,
        mount: &str,
        role_id: &str,
        secret_id: &SecretString,
    ) -> Result<SecretString, VaultError> {
        let mut state = self.state();
        state.approle_logins.push((
            mount.to_string(),
            role_id.to_string(),
            secret_id.expose_secret().to_string(),
        ));
        if state.approle_fails {
            return Err(VaultError::Api {
                status: 400,
                message: "invalid role or secret ID".to_string(),
            });
        }
        Ok(SecretString::from(
            state.approle_token.clone().unwrap_or_default(),
        ))
    }

    async fn read_kv_v1(&self, mount: &str, path: &str) -> Result<Option<Value>, VaultError> {
        self.read("v1", mount, path)
    }

    async fn read_kv_v2(&self, mount: &str, path: &str) -> Result<Option<Value>, VaultError> {
        self.read("v2", mount, path)
    }
}
