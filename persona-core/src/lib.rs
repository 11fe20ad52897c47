//! Persona Core Library
//!
//! Implements the verification engine of the BrowserID/Persona protocol:
//! - Domains publish keys and sign certificates binding users' keys to emails
//! - Users bundle a certificate with a short-lived signed assertion
//! - Relying parties verify the bundle back to the issuing domain's key,
//!   discovered through the `/.well-known/browserid` document

pub mod keys;
pub mod jwt;
pub mod assertion;
pub mod certificate;
pub mod bundle;
pub mod discovery;
pub mod audience;
pub mod verifier;
pub mod keystore;
pub mod error;

pub use keys::{PublicKey, SecretKey};
pub use assertion::{Assertion, CertParams, Principal};
pub use certificate::Certificate;
pub use bundle::CertBundle;
pub use discovery::{Resolver, ShimTable, SupportDocument, WellKnownFetcher};
pub use verifier::{VerifiedIdentity, Verifier, VerifierConfig};
pub use error::Error;

/// Result type for persona-core operations
pub type Result<T> = std::result::Result<T, Error>;
