//! Identity certificates
//!
//! A certificate is a token whose payload binds a user's public key to a
//! principal, signed by the issuing domain's key. Its payload carries both
//! temporal claims (its own validity window, its issuer) and the subject
//! binding.

use serde_json::json;

use crate::assertion::{Assertion, CertParams, Principal};
use crate::jwt::Token;
use crate::keys::{PublicKey, SecretKey};
use crate::Result;

/// An identity certificate binding a public key to an email address.
#[derive(Debug, Clone)]
pub struct Certificate {
    token: Token,
    assertion: Assertion,
    params: CertParams,
}

impl Certificate {
    /// Create and sign a new certificate.
    ///
    /// # Arguments
    /// * `issuer` - The domain issuing this certificate
    /// * `email` - The user's email address
    /// * `user_public_key` - The user's public key to certify
    /// * `iat`, `exp` - Validity window, in ms
    /// * `issuer_key` - The issuing domain's signing key
    pub fn create(
        issuer: &str,
        email: &str,
        user_public_key: &PublicKey,
        iat: i64,
        exp: i64,
        issuer_key: &SecretKey,
    ) -> Result<Self> {
        let payload = json!({
            "iss": issuer,
            "iat": iat,
            "exp": exp,
            "public-key": user_public_key,
            "principal": Principal::email(email),
        });
        Self::from_token(Token::sign(&payload, issuer_key)?)
    }

    /// Parse a certificate from its encoded form (does not verify signature).
    pub fn parse(encoded: &str) -> Result<Self> {
        Self::from_token(Token::parse(encoded)?)
    }

    fn from_token(token: Token) -> Result<Self> {
        let assertion = Assertion::from_payload(token.payload())?;
        let params = CertParams::from_payload(token.payload())?;
        Ok(Self {
            token,
            assertion,
            params,
        })
    }

    /// Verify the certificate signature against the issuer's public key.
    pub fn verify_signature(&self, issuer_public_key: &PublicKey) -> Result<()> {
        self.token.verify(issuer_public_key)
    }

    /// Check the certificate's validity window against `now` (ms).
    pub fn verify(&self, now: i64) -> Result<()> {
        self.assertion.verify(now)
    }

    /// The certificate's temporal claims
    pub fn assertion(&self) -> &Assertion {
        &self.assertion
    }

    /// The subject binding
    pub fn params(&self) -> &CertParams {
        &self.params
    }

    /// The certified public key
    pub fn public_key(&self) -> &PublicKey {
        &self.params.public_key
    }

    /// The certified email address
    pub fn email(&self) -> Option<&str> {
        self.params.principal.as_email()
    }

    /// The issuer domain
    pub fn issuer(&self) -> Option<&str> {
        self.assertion.iss.as_deref()
    }

    /// The encoded token
    pub fn encoded(&self) -> &str {
        self.token.encoded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn create_and_verify() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();

        let cert = Certificate::create(
            "idp.example",
            "alice@idp.example",
            &user_key.public_key(),
            1_000_000,
            2_000_000,
            &domain_key,
        )
        .unwrap();

        cert.verify_signature(&domain_key.public_key()).unwrap();
        cert.verify(1_500_000).unwrap();

        assert_eq!(cert.issuer(), Some("idp.example"));
        assert_eq!(cert.email(), Some("alice@idp.example"));
        assert_eq!(cert.public_key(), &user_key.public_key());
    }

    #[test]
    fn parse_roundtrip() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();

        let cert = Certificate::create(
            "idp.example",
            "alice@idp.example",
            &user_key.public_key(),
            1_000_000,
            2_000_000,
            &domain_key,
        )
        .unwrap();

        let parsed = Certificate::parse(cert.encoded()).unwrap();
        parsed.verify_signature(&domain_key.public_key()).unwrap();
        assert_eq!(parsed.email(), Some("alice@idp.example"));
    }

    #[test]
    fn wrong_key_rejected() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let wrong_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();

        let cert = Certificate::create(
            "idp.example",
            "alice@idp.example",
            &user_key.public_key(),
            1_000_000,
            2_000_000,
            &domain_key,
        )
        .unwrap();

        assert!(cert.verify_signature(&wrong_key.public_key()).is_err());
    }

    #[test]
    fn expired_window_rejected() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();

        let cert = Certificate::create(
            "idp.example",
            "alice@idp.example",
            &user_key.public_key(),
            1_000_000,
            2_000_000,
            &domain_key,
        )
        .unwrap();

        assert!(matches!(
            cert.verify(2_000_001),
            Err(Error::AssertionExpired)
        ));
    }
}
