//! Identity-provider discovery
//!
//! Resolves the authoritative public key for a domain by fetching its
//! `/.well-known/browserid` support document and following `authority`
//! delegations until a key-bearing document is found.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::keys::PublicKey;
use crate::{Error, Result};

/// Delegation hop ceiling. Resolution visits at most this many domains.
const MAX_DELEGATIONS: usize = 6;

/// Trait for fetching raw support-document bodies
///
/// This allows different implementations:
/// - HTTPS fetcher (production)
/// - Mock fetcher (testing)
pub trait WellKnownFetcher {
    /// Fetch the body of `https://<domain>/.well-known/browserid`.
    fn fetch(&self, domain: &str) -> Result<String>;
}

/// Preloaded support documents, the only mechanism for resolving a domain
/// without HTTPS: domain -> (origin, document body).
#[derive(Debug, Clone, Default)]
pub struct ShimTable {
    entries: HashMap<String, ShimEntry>,
}

#[derive(Debug, Clone)]
struct ShimEntry {
    origin: String,
    body: String,
}

impl ShimTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preloaded document for `domain`. The origin replaces
    /// `https://<domain>` when forming URLs from the document's paths.
    pub fn insert(
        &mut self,
        domain: impl Into<String>,
        origin: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.entries.insert(
            domain.into(),
            ShimEntry {
                origin: origin.into(),
                body: body.into(),
            },
        );
    }

    fn get(&self, domain: &str) -> Option<&ShimEntry> {
        self.entries.get(domain)
    }
}

/// A domain's support document, published at `/.well-known/browserid`.
#[derive(Debug, Clone)]
pub enum SupportDocument {
    /// The domain vouches for its own users
    Basic {
        public_key: PublicKey,
        authentication: String,
        provisioning: String,
    },
    /// The domain delegates to another authority
    Delegated { authority: String },
}

impl SupportDocument {
    /// Create a key-bearing document with authentication and provisioning
    /// paths.
    pub fn basic(
        public_key: PublicKey,
        authentication: impl Into<String>,
        provisioning: impl Into<String>,
    ) -> Self {
        SupportDocument::Basic {
            public_key,
            authentication: authentication.into(),
            provisioning: provisioning.into(),
        }
    }

    /// Create a delegation document
    pub fn delegate(authority: impl Into<String>) -> Self {
        SupportDocument::Delegated {
            authority: authority.into(),
        }
    }

    /// Parse a document body. A document with an `authority` field is a
    /// delegation; otherwise `public-key`, `authentication`, and
    /// `provisioning` are all required.
    pub fn parse(domain: &str, body: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Raw {
            authority: Option<String>,
            #[serde(rename = "public-key")]
            public_key: Option<PublicKey>,
            authentication: Option<String>,
            provisioning: Option<String>,
        }

        let raw: Raw = serde_json::from_str(body).map_err(|e| Error::MalformedSupportDocument {
            domain: domain.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(authority) = raw.authority {
            return Ok(SupportDocument::Delegated { authority });
        }

        match (raw.public_key, raw.authentication, raw.provisioning) {
            (Some(public_key), Some(authentication), Some(provisioning)) => {
                Ok(SupportDocument::Basic {
                    public_key,
                    authentication,
                    provisioning,
                })
            }
            _ => Err(Error::MalformedSupportDocument {
                domain: domain.to_string(),
                reason: "requires public-key, authentication, and provisioning".into(),
            }),
        }
    }
}

impl Serialize for SupportDocument {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct RawBasic<'a> {
            #[serde(rename = "public-key")]
            public_key: &'a PublicKey,
            authentication: &'a str,
            provisioning: &'a str,
        }

        #[derive(Serialize)]
        struct RawDelegated<'a> {
            authority: &'a str,
        }

        match self {
            SupportDocument::Basic {
                public_key,
                authentication,
                provisioning,
            } => RawBasic {
                public_key,
                authentication,
                provisioning,
            }
            .serialize(serializer),
            SupportDocument::Delegated { authority } => {
                RawDelegated { authority }.serialize(serializer)
            }
        }
    }
}

/// The outcome of resolving a domain: the authoritative key and the
/// absolute endpoint URLs of the domain that answered.
#[derive(Debug, Clone)]
pub struct Authority {
    /// The domain at the end of the delegation chain
    pub domain: String,
    pub public_key: PublicKey,
    pub authentication: String,
    pub provisioning: String,
}

/// The locally hosted identity provider. Lookups for this hostname are
/// answered from the key store without a network call.
#[derive(Debug, Clone)]
pub struct LocalAuthority {
    pub hostname: String,
    pub public_key: PublicKey,
    pub authentication_path: String,
    pub provisioning_path: String,
}

impl LocalAuthority {
    pub fn new(hostname: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            hostname: hostname.into(),
            public_key,
            authentication_path: "/auth".into(),
            provisioning_path: "/provision".into(),
        }
    }
}

/// Resolves issuer domains to their authoritative public keys.
pub struct Resolver<F> {
    fetcher: F,
    shim: ShimTable,
    local: Option<LocalAuthority>,
}

impl<F: WellKnownFetcher> Resolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            shim: ShimTable::new(),
            local: None,
        }
    }

    /// Use preloaded documents for the domains in `shim`.
    pub fn with_shim_table(mut self, shim: ShimTable) -> Self {
        self.shim = shim;
        self
    }

    /// Answer lookups for the local hostname from `local` directly.
    pub fn with_local_authority(mut self, local: LocalAuthority) -> Self {
        self.local = Some(local);
        self
    }

    /// Resolve the authoritative public key for `domain`, following
    /// delegations.
    pub fn resolve(&self, domain: &str) -> Result<Authority> {
        let mut current = domain.to_string();
        let mut visited: HashSet<String> = HashSet::new();
        let mut chain: Vec<String> = Vec::new();

        loop {
            if let Some(local) = &self.local {
                if local.hostname == current {
                    let prefix = format!("https://{}", local.hostname);
                    return Ok(Authority {
                        domain: current,
                        public_key: local.public_key.clone(),
                        authentication: absolute_url(
                            &local.hostname,
                            &prefix,
                            &local.authentication_path,
                        )?,
                        provisioning: absolute_url(
                            &local.hostname,
                            &prefix,
                            &local.provisioning_path,
                        )?,
                    });
                }
            }

            if visited.contains(&current) {
                return Err(Error::DelegationCycle(format!(
                    "{} > {}",
                    chain.join(" > "),
                    current
                )));
            }
            visited.insert(current.clone());
            chain.push(current.clone());
            if visited.len() > MAX_DELEGATIONS {
                return Err(Error::TooManyDelegations(chain.join(" > ")));
            }

            let (url_prefix, body) = self.fetch_document(&current)?;
            match SupportDocument::parse(&current, &body)? {
                SupportDocument::Delegated { authority } => {
                    current = authority;
                }
                SupportDocument::Basic {
                    public_key,
                    authentication,
                    provisioning,
                } => {
                    return Ok(Authority {
                        public_key,
                        authentication: absolute_url(&current, &url_prefix, &authentication)?,
                        provisioning: absolute_url(&current, &url_prefix, &provisioning)?,
                        domain: current,
                    });
                }
            }
        }
    }

    /// True iff `email_domain`'s support document resolves to an authority
    /// whose authentication URL points at `issuing_domain`. Any lookup
    /// error means "no".
    pub fn delegates_authority(&self, email_domain: &str, issuing_domain: &str) -> bool {
        match self.resolve(email_domain) {
            Ok(authority) => match host_and_port(&authority.authentication) {
                Some(host) => host == issuing_domain,
                None => false,
            },
            Err(_) => false,
        }
    }

    fn fetch_document(&self, domain: &str) -> Result<(String, String)> {
        if let Some(entry) = self.shim.get(domain) {
            return Ok((entry.origin.clone(), entry.body.clone()));
        }
        let body = self.fetcher.fetch(domain)?;
        Ok((format!("https://{}", domain), body))
    }
}

/// Extract domain from an email address
pub fn domain_from_email(email: &str) -> Option<&str> {
    email.split('@').nth(1)
}

/// Build the well-known URL for a domain
pub fn well_known_url(domain: &str) -> String {
    format!("https://{}/.well-known/browserid", domain)
}

fn url_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^https?://[a-z0-9-]+(\.[a-z0-9-]+)*(:[0-9]+)?(/.*)?$")
            .expect("static regex")
    })
}

fn absolute_url(domain: &str, prefix: &str, path: &str) -> Result<String> {
    let url = format!("{}{}", prefix, path);
    if url_shape().is_match(&url) {
        Ok(url)
    } else {
        Err(Error::MalformedSupportDocument {
            domain: domain.to_string(),
            reason: format!("invalid endpoint URL: {}", url),
        })
    }
}

fn host_and_port(input: &str) -> Option<String> {
    let url = Url::parse(input).ok()?;
    let host = url.host_str()?.to_string();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
