//! Assertion and certificate-parameter claims
//!
//! Typed views over token payloads. All timestamps are integer milliseconds
//! since the Unix epoch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys::PublicKey;
use crate::{Error, Result};

/// Temporal and addressing claims of a token payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl Assertion {
    /// Read the claims out of a decoded payload. Other payload keys are
    /// ignored here.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        serde_json::from_value(payload.clone())
            .map_err(|_| Error::MalformedToken("malformed temporal claims".into()))
    }

    /// Check the validity window against `now`. `iat == now` and
    /// `exp == now` are both inside the window.
    pub fn verify(&self, now: i64) -> Result<()> {
        if let Some(iat) = self.iat {
            if iat > now {
                return Err(Error::AssertionFromFuture);
            }
        }
        if let Some(exp) = self.exp {
            if exp < now {
                return Err(Error::AssertionExpired);
            }
        }
        Ok(())
    }
}

/// Principal identifier in a certificate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Principal {
    /// Email address principal
    Email { email: String },
}

impl Principal {
    /// Create an email principal
    pub fn email(email: impl Into<String>) -> Self {
        Principal::Email {
            email: email.into(),
        }
    }

    /// Get the email address if this is an email principal
    pub fn as_email(&self) -> Option<&str> {
        match self {
            Principal::Email { email } => Some(email),
        }
    }

    /// Extract the domain from an email principal
    pub fn domain(&self) -> Option<&str> {
        self.as_email().and_then(|e| e.split('@').nth(1))
    }
}

/// The subject-binding claims of a certificate: the user's public key and
/// the principal it is certified for.
#[derive(Debug, Clone)]
pub struct CertParams {
    pub public_key: PublicKey,
    pub principal: Principal,
}

impl CertParams {
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let principal = payload
            .get("principal")
            .ok_or_else(|| Error::MalformedToken("certificate has no principal".into()))?;
        let principal: Principal = serde_json::from_value(principal.clone())
            .map_err(|_| Error::MalformedToken("malformed principal".into()))?;

        let email = principal
            .as_email()
            .ok_or_else(|| Error::MalformedToken("principal has no email".into()))?;
        if !email.contains('@') {
            return Err(Error::MalformedToken(
                "principal email is not an email address".into(),
            ));
        }

        let public_key = payload
            .get("public-key")
            .ok_or_else(|| Error::MalformedToken("certificate has no public-key".into()))?;
        let public_key: PublicKey = serde_json::from_value(public_key.clone())
            .map_err(|e| Error::InvalidKey(e.to_string()))?;

        Ok(Self {
            public_key,
            principal,
        })
    }
}
