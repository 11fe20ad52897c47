//! Verification facade
//!
//! The single entry point a relying-party service calls: unbundle, verify
//! the chain and assertion, match the audience, and enforce the
//! issuer-authorization policy tying an email's domain to its issuer.

use serde::Serialize;

use crate::audience;
use crate::bundle::CertBundle;
use crate::discovery::{domain_from_email, Resolver, WellKnownFetcher};
use crate::{Error, Result};

/// Certificate chains longer than this are rejected outright.
const MAX_CHAIN_LEN: usize = 1;

/// Which issuers are implicitly trusted for any email domain.
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    /// The configured fallback authority (historically `login.persona.org`)
    pub master_idp: Option<String>,
    /// This host's own name
    pub local_hostname: Option<String>,
}

/// A successfully verified identity.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedIdentity {
    pub email: String,
    pub audience: String,
    /// Assertion expiry in ms
    #[serde(rename = "valid-until", skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<i64>,
    pub issuer: String,
}

/// Verifies bundled assertions for relying parties.
pub struct Verifier<F> {
    resolver: Resolver<F>,
    config: VerifierConfig,
}

impl<F: WellKnownFetcher> Verifier<F> {
    pub fn new(resolver: Resolver<F>, config: VerifierConfig) -> Self {
        Self { resolver, config }
    }

    /// Verify a bundled assertion against the relying party's audience at
    /// time `now` (ms).
    pub fn verify(&self, assertion: &str, audience: &str, now: i64) -> Result<VerifiedIdentity> {
        let bundle = CertBundle::unbundle(assertion)?;
        let verified = bundle.verify(&self.resolver, now)?;

        if verified.cert_chain.len() > MAX_CHAIN_LEN {
            return Err(Error::ChainTooLong);
        }

        let want = verified
            .assertion
            .aud
            .as_deref()
            .ok_or_else(|| Error::MalformedToken("assertion has no audience".into()))?;
        audience::match_audience(audience, want)?;

        let leaf = verified
            .cert_chain
            .last()
            .ok_or_else(|| Error::MalformedToken("no certificates provided".into()))?;
        let email = leaf
            .email()
            .ok_or_else(|| Error::MalformedToken("certificate has no email".into()))?
            .to_string();
        let email_domain = domain_from_email(&email)
            .ok_or_else(|| Error::MalformedToken("certificate email has no domain".into()))?
            .to_string();
        let issuer = leaf
            .issuer()
            .ok_or_else(|| Error::MalformedToken("certificate has no issuer".into()))?
            .to_string();

        self.check_issuer_authority(&issuer, &email_domain)?;

        Ok(VerifiedIdentity {
            email,
            audience: want.to_string(),
            valid_until: verified.assertion.exp,
            issuer,
        })
    }

    /// The issuer-authorization ladder: the configured master IdP and this
    /// host are trusted for any email; a domain may speak for itself;
    /// anyone else needs an explicit delegation from the email's domain.
    fn check_issuer_authority(&self, issuer: &str, email_domain: &str) -> Result<()> {
        if self.config.master_idp.as_deref() == Some(issuer) {
            return Ok(());
        }
        if self.config.local_hostname.as_deref() == Some(issuer) {
            return Ok(());
        }
        if issuer == email_domain {
            return Ok(());
        }
        if self.resolver.delegates_authority(email_domain, issuer) {
            return Ok(());
        }
        Err(Error::IssuerNotAuthorized {
            issuer: issuer.to_string(),
            email_domain: email_domain.to_string(),
        })
    }

    pub fn resolver(&self) -> &Resolver<F> {
        &self.resolver
    }
}
