//! Error types for persona-core

use std::fmt;

use thiserror::Error;

/// Which field of the audience failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudienceField {
    Scheme,
    Domain,
    Port,
}

impl fmt::Display for AudienceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudienceField::Scheme => write!(f, "scheme"),
            AudienceField::Domain => write!(f, "domain"),
            AudienceField::Port => write!(f, "port"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("assertion issued in the future")]
    AssertionFromFuture,

    #[error("assertion has expired")]
    AssertionExpired,

    #[error("assertion signature invalid")]
    AssertionSignatureInvalid,

    #[error("bad signature in chain")]
    BadSignatureInChain {
        #[source]
        cause: Option<Box<Error>>,
    },

    #[error("certificate chain too long")]
    ChainTooLong,

    #[error("audience {0} mismatch")]
    AudienceMismatch(AudienceField),

    #[error("issuer '{issuer}' is not authorized to issue certificates for '{email_domain}'")]
    IssuerNotAuthorized {
        issuer: String,
        email_domain: String,
    },

    #[error("no support document for {0}")]
    NoSupportDocument(String),

    #[error("malformed support document for {domain}: {reason}")]
    MalformedSupportDocument { domain: String, reason: String },

    #[error("circular reference in delegating authority: {0}")]
    DelegationCycle(String),

    #[error("too many hops while delegating authority: {0}")]
    TooManyDelegations(String),

    #[error("identity provider unreachable: {0}")]
    IdPUnreachable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a chain-internal failure in the single outward chain error,
    /// keeping the original as the source.
    pub(crate) fn into_chain_error(self) -> Error {
        match self {
            // Temporal violations keep their own names across the chain.
            Error::AssertionFromFuture | Error::AssertionExpired => self,
            other => Error::BadSignatureInChain {
                cause: Some(Box::new(other)),
            },
        }
    }
}
