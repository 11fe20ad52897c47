//! Application state for the verifier service

use std::sync::Arc;

use anyhow::{Context, Result};
use persona_core::discovery::{LocalAuthority, Resolver};
use persona_core::keystore::FileKeyStore;
use persona_core::{PublicKey, SecretKey, Verifier, VerifierConfig};

use crate::config::Config;
use crate::fetcher::HttpFetcher;

/// Shared application state
pub struct AppState {
    /// The verification engine
    pub verifier: Verifier<HttpFetcher>,
    /// This host's name
    pub hostname: String,
    /// The local identity provider's key pair
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl AppState {
    /// Build the state from configuration: load (or provision) the local
    /// key pair, preload the shim table, and assemble the verifier.
    pub fn from_config(config: &Config) -> Result<Arc<Self>> {
        let store = FileKeyStore::with_name(&config.key_dir, config.key_name.as_str());
        let (secret_key, public_key) = store
            .load_or_generate()
            .with_context(|| format!("failed to load key pair from {}", config.key_dir))?;
        tracing::info!("Loaded key pair '{}' from {}", config.key_name, config.key_dir);

        let shim = config.load_shim_table()?;
        let resolver = Resolver::new(HttpFetcher::new())
            .with_shim_table(shim)
            .with_local_authority(LocalAuthority::new(
                config.hostname.clone(),
                public_key.clone(),
            ));

        let verifier = Verifier::new(
            resolver,
            VerifierConfig {
                master_idp: config.master_idp.clone(),
                local_hostname: Some(config.hostname.clone()),
            },
        );

        Ok(Arc::new(Self {
            verifier,
            hostname: config.hostname.clone(),
            secret_key,
            public_key,
        }))
    }
}
