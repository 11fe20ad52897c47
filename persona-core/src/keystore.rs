//! Local key-pair storage
//!
//! The locally hosted identity provider's key pair lives on disk as two
//! files: `<name>.secretkey` holds the serialized secret key and
//! `<name>.cert` a token whose payload carries the public key. The default
//! name is `root`.

use std::fs;
use std::path::PathBuf;

use serde_json::json;

use crate::jwt::Token;
use crate::keys::{PublicKey, SecretKey};
use crate::{Error, Result};

pub const DEFAULT_KEY_NAME: &str = "root";

/// Loads and provisions the local identity provider's key pair.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
    name: String,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_name(dir, DEFAULT_KEY_NAME)
    }

    pub fn with_name(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    fn secret_key_path(&self) -> PathBuf {
        self.dir.join(format!("{}.secretkey", self.name))
    }

    fn cert_path(&self) -> PathBuf {
        self.dir.join(format!("{}.cert", self.name))
    }

    pub fn exists(&self) -> bool {
        self.secret_key_path().exists() && self.cert_path().exists()
    }

    /// Load the secret key.
    pub fn secret_key(&self) -> Result<SecretKey> {
        let contents = fs::read_to_string(self.secret_key_path())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load the public key out of the stored certificate.
    pub fn public_key(&self) -> Result<PublicKey> {
        let contents = fs::read_to_string(self.cert_path())?;
        let token = Token::parse(contents.trim())?;
        let key = token
            .payload()
            .get("public-key")
            .ok_or_else(|| Error::InvalidKey("stored certificate has no public-key".into()))?;
        Ok(serde_json::from_value(key.clone())?)
    }

    /// Write a key pair: the secret key file plus a self-signed token
    /// carrying the public key.
    pub fn save(&self, secret: &SecretKey) -> Result<()> {
        fs::write(self.secret_key_path(), serde_json::to_string(secret)?)?;
        let cert = Token::sign(&json!({ "public-key": secret.public_key() }), secret)?;
        fs::write(self.cert_path(), cert.encoded())?;
        Ok(())
    }

    /// Load the key pair, generating and saving a fresh one if absent.
    pub fn load_or_generate(&self) -> Result<(SecretKey, PublicKey)> {
        if !self.exists() {
            let secret = SecretKey::generate_dsa(256)?;
            self.save(&secret)?;
        }
        let secret = self.secret_key()?;
        let public = self.public_key()?;
        Ok((secret, public))
    }
}
