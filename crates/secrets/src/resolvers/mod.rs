//! Secret resolvers
//!
//! Each resolver walks the whole [`SecretsSpec`](crate::SecretsSpec) and
//! returns only the entries it understands:
//!
//! - [`load_inline_secrets`] - literal values
//! - [`load_secrets_from_env`] - environment variables
//! - [`load_secrets_from_vault`] - HashiCorp Vault KV secrets
//!
//! [`SecretLoader`](crate::SecretLoader) runs them in that order and merges
//! the results.

mod env;
mod inline;
mod vault;

pub use env::{EnvProvider, ProcessEnv, load_secrets_from_env};
pub use inline::load_inline_secrets;
pub use vault::load_secrets_from_vault;
