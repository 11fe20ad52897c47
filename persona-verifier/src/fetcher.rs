//! HTTPS support-document fetcher
//!
//! Ordinary TLS verification through the platform trust store; the shim
//! table in the core resolver is the only bypass.

use std::time::Duration;

use persona_core::discovery::{well_known_url, WellKnownFetcher};
use persona_core::Error as CoreError;
use reqwest::blocking::Client;

/// Deadline for each delegation hop.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches `/.well-known/browserid` bodies over HTTPS.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        // `reqwest::blocking::Client` spins up its own background runtime;
        // building it while the current thread is already inside a tokio
        // runtime (e.g. `#[tokio::main]`/`#[tokio::test]`) panics. Build it
        // on a plain OS thread to sidestep that nested-runtime restriction.
        let client = std::thread::spawn(|| {
            Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client")
        })
        .join()
        .expect("HTTP client builder thread panicked");
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WellKnownFetcher for HttpFetcher {
    fn fetch(&self, domain: &str) -> persona_core::Result<String> {
        let url = well_known_url(domain);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| CoreError::IdPUnreachable(format!("{}: {}", domain, e)))?;

        if !response.status().is_success() {
            return Err(CoreError::NoSupportDocument(domain.to_string()));
        }

        response
            .text()
            .map_err(|e| CoreError::IdPUnreachable(format!("{}: {}", domain, e)))
    }
}
