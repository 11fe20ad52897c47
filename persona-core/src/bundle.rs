//! Certificate bundles
//!
//! The wire form a relying party receives: `cert~cert~...~assertion`. The
//! chain starts at a certificate signed by its issuer's published key and
//! ends with an assertion signed by the key the last certificate certifies.

use serde_json::Value;

use crate::assertion::Assertion;
use crate::certificate::Certificate;
use crate::discovery::{Resolver, WellKnownFetcher};
use crate::jwt::Token;
use crate::{Error, Result};

/// A certificate chain with its trailing signed assertion.
#[derive(Debug, Clone)]
pub struct CertBundle {
    certificates: Vec<Certificate>,
    assertion_token: Token,
}

/// What a successfully verified bundle yields.
#[derive(Debug)]
pub struct VerifiedBundle<'a> {
    /// The verified chain, root first
    pub cert_chain: &'a [Certificate],
    /// The trailing assertion's full payload
    pub payload: &'a Value,
    /// The trailing assertion's temporal and addressing claims
    pub assertion: Assertion,
}

impl CertBundle {
    /// Build a bundle from parsed parts.
    pub fn new(certificates: Vec<Certificate>, assertion_token: Token) -> Self {
        Self {
            certificates,
            assertion_token,
        }
    }

    /// Split the wire form on `~`. The trailing segment is the assertion,
    /// every preceding segment a certificate; at least one certificate is
    /// required.
    pub fn unbundle(bundle: &str) -> Result<Self> {
        let parts: Vec<&str> = bundle.split('~').collect();
        if parts.len() < 2 {
            return Err(Error::MalformedToken("no certificates provided".into()));
        }

        let assertion_token = Token::parse(parts[parts.len() - 1])?;
        let certificates = parts[..parts.len() - 1]
            .iter()
            .map(|s| Certificate::parse(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            certificates,
            assertion_token,
        })
    }

    /// Encode to the `cert~cert~...~assertion` wire form.
    pub fn encode(&self) -> String {
        let mut parts: Vec<&str> = self.certificates.iter().map(|c| c.encoded()).collect();
        parts.push(self.assertion_token.encoded());
        parts.join("~")
    }

    /// Verify the certificate chain.
    ///
    /// The root certificate must verify under its issuer's published key
    /// (resolved through `resolver`); each subsequent certificate under the
    /// key its predecessor certifies. Temporal violations keep their own
    /// error names; every other failure collapses into the single chain
    /// error.
    pub fn verify_chain<F: WellKnownFetcher>(
        &self,
        resolver: &Resolver<F>,
        now: i64,
    ) -> Result<&[Certificate]> {
        let root = self
            .certificates
            .first()
            .ok_or_else(|| Error::MalformedToken("no certificates provided".into()))?;
        let root_issuer = root
            .issuer()
            .ok_or(Error::BadSignatureInChain { cause: None })?;

        let authority = resolver
            .resolve(root_issuer)
            .map_err(Error::into_chain_error)?;

        let mut signing_key = authority.public_key;
        for cert in &self.certificates {
            cert.verify_signature(&signing_key)
                .map_err(Error::into_chain_error)?;
            cert.verify(now).map_err(Error::into_chain_error)?;
            signing_key = cert.public_key().clone();
        }

        Ok(&self.certificates)
    }

    /// Verify the whole bundle: the chain, then the trailing assertion
    /// under the leaf certificate's key.
    pub fn verify<F: WellKnownFetcher>(
        &self,
        resolver: &Resolver<F>,
        now: i64,
    ) -> Result<VerifiedBundle<'_>> {
        let cert_chain = self.verify_chain(resolver, now)?;
        let leaf = cert_chain
            .last()
            .ok_or_else(|| Error::MalformedToken("no certificates provided".into()))?;

        self.assertion_token
            .verify(leaf.public_key())
            .map_err(|_| Error::AssertionSignatureInvalid)?;

        let assertion = Assertion::from_payload(self.assertion_token.payload())?;
        assertion.verify(now)?;

        Ok(VerifiedBundle {
            cert_chain,
            payload: self.assertion_token.payload(),
            assertion,
        })
    }

    /// The certificates in the chain, root first
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// The trailing assertion token
    pub fn assertion_token(&self) -> &Token {
        &self.assertion_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{ShimTable, SupportDocument};
    use crate::keys::SecretKey;
    use serde_json::json;

    // Bundle tests never hit the network; every issuer is preloaded
    // through the shim table.
    struct NoFetcher;

    impl WellKnownFetcher for NoFetcher {
        fn fetch(&self, domain: &str) -> Result<String> {
            Err(Error::NoSupportDocument(domain.to_string()))
        }
    }

    fn resolver_for(domain: &str, key: &SecretKey) -> Resolver<NoFetcher> {
        let doc = SupportDocument::basic(key.public_key(), "/auth", "/provision");
        let mut shim = ShimTable::new();
        shim.insert(
            domain,
            format!("https://{}", domain),
            serde_json::to_string(&doc).unwrap(),
        );
        Resolver::new(NoFetcher).with_shim_table(shim)
    }

    fn signed_assertion(user_key: &SecretKey, aud: &str, exp: i64) -> Token {
        Token::sign(&json!({"aud": aud, "exp": exp}), user_key).unwrap()
    }

    fn single_cert_bundle(
        domain_key: &SecretKey,
        user_key: &SecretKey,
        email: &str,
        exp: i64,
    ) -> CertBundle {
        let cert = Certificate::create(
            "idp.example",
            email,
            &user_key.public_key(),
            1_000_000,
            2_000_000,
            domain_key,
        )
        .unwrap();
        let assertion = signed_assertion(user_key, "https://rp.example", exp);
        CertBundle::new(vec![cert], assertion)
    }

    #[test]
    fn unbundle_rejects_missing_certificates() {
        let user_key = SecretKey::generate_dsa(128).unwrap();
        let assertion = signed_assertion(&user_key, "https://rp.example", 1_500_000);

        assert!(matches!(
            CertBundle::unbundle(assertion.encoded()),
            Err(Error::MalformedToken(_))
        ));
    }

    #[test]
    fn encode_unbundle_roundtrip() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();
        let bundle = single_cert_bundle(&domain_key, &user_key, "alice@idp.example", 1_500_000);

        let encoded = bundle.encode();
        assert!(encoded.contains('~'));

        let parsed = CertBundle::unbundle(&encoded).unwrap();
        assert_eq!(parsed.certificates().len(), 1);
        assert_eq!(parsed.encode(), encoded);
    }

    #[test]
    fn verify_accepts_valid_bundle() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();
        let bundle = single_cert_bundle(&domain_key, &user_key, "alice@idp.example", 1_500_000);

        let resolver = resolver_for("idp.example", &domain_key);
        let verified = bundle.verify(&resolver, 1_200_000).unwrap();

        assert_eq!(verified.cert_chain.len(), 1);
        assert_eq!(verified.assertion.aud.as_deref(), Some("https://rp.example"));
        assert_eq!(verified.payload["aud"], "https://rp.example");
    }

    #[test]
    fn verify_rejects_cert_signed_by_other_key() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let other_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();
        let bundle = single_cert_bundle(&other_key, &user_key, "alice@idp.example", 1_500_000);

        // idp.example publishes domain_key, but the cert was signed by other_key
        let resolver = resolver_for("idp.example", &domain_key);
        assert!(matches!(
            bundle.verify(&resolver, 1_200_000),
            Err(Error::BadSignatureInChain { .. })
        ));
    }

    #[test]
    fn verify_collapses_resolver_errors_into_chain_error() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();
        let bundle = single_cert_bundle(&domain_key, &user_key, "alice@idp.example", 1_500_000);

        // Resolver has no document for idp.example at all
        let resolver = Resolver::new(NoFetcher);
        let err = bundle.verify(&resolver, 1_200_000).unwrap_err();
        match err {
            Error::BadSignatureInChain { cause } => {
                assert!(matches!(*cause.unwrap(), Error::NoSupportDocument(_)));
            }
            other => panic!("expected chain error, got {:?}", other),
        }
    }

    #[test]
    fn verify_preserves_certificate_temporal_errors() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();
        let bundle = single_cert_bundle(&domain_key, &user_key, "alice@idp.example", 3_000_000);

        let resolver = resolver_for("idp.example", &domain_key);
        // now is past the certificate's exp of 2_000_000
        assert!(matches!(
            bundle.verify(&resolver, 2_500_000),
            Err(Error::AssertionExpired)
        ));
        // now is before the certificate's iat of 1_000_000
        assert!(matches!(
            bundle.verify(&resolver, 500_000),
            Err(Error::AssertionFromFuture)
        ));
    }

    #[test]
    fn verify_preserves_assertion_expiry() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();
        // Certificate valid until 2_000_000, assertion only until 1_100_000
        let bundle = single_cert_bundle(&domain_key, &user_key, "alice@idp.example", 1_100_000);

        let resolver = resolver_for("idp.example", &domain_key);
        assert!(matches!(
            bundle.verify(&resolver, 1_200_000),
            Err(Error::AssertionExpired)
        ));
    }

    #[test]
    fn verify_rejects_assertion_signed_by_wrong_key() {
        let domain_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();
        let wrong_key = SecretKey::generate_dsa(128).unwrap();

        let cert = Certificate::create(
            "idp.example",
            "alice@idp.example",
            &user_key.public_key(),
            1_000_000,
            2_000_000,
            &domain_key,
        )
        .unwrap();
        // Assertion signed by a key the certificate does not certify
        let assertion = signed_assertion(&wrong_key, "https://rp.example", 1_500_000);
        let bundle = CertBundle::new(vec![cert], assertion);

        let resolver = resolver_for("idp.example", &domain_key);
        assert!(matches!(
            bundle.verify(&resolver, 1_200_000),
            Err(Error::AssertionSignatureInvalid)
        ));
    }

    #[test]
    fn verify_walks_multi_certificate_chains() {
        let root_key = SecretKey::generate_dsa(128).unwrap();
        let intermediate_key = SecretKey::generate_dsa(128).unwrap();
        let user_key = SecretKey::generate_dsa(128).unwrap();

        let root_cert = Certificate::create(
            "idp.example",
            "ca@idp.example",
            &intermediate_key.public_key(),
            1_000_000,
            2_000_000,
            &root_key,
        )
        .unwrap();
        let leaf_cert = Certificate::create(
            "idp.example",
            "alice@idp.example",
            &user_key.public_key(),
            1_000_000,
            2_000_000,
            &intermediate_key,
        )
        .unwrap();
        let assertion = signed_assertion(&user_key, "https://rp.example", 1_500_000);

        let bundle = CertBundle::new(vec![root_cert, leaf_cert], assertion);
        let resolver = resolver_for("idp.example", &root_key);

        let verified = bundle.verify(&resolver, 1_200_000).unwrap();
        assert_eq!(verified.cert_chain.len(), 2);
        assert_eq!(
            verified.cert_chain[1].email(),
            Some("alice@idp.example")
        );
    }
}
