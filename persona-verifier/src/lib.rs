//! Persona Verifier Service
//!
//! The thin HTTP service around the core verification engine: it accepts
//! relying-party verification requests, publishes this host's own support
//! document, and performs the outbound well-known fetches the resolver
//! needs.

pub mod config;
pub mod fetcher;
pub mod routes;
pub mod state;

pub use config::Config;
pub use fetcher::HttpFetcher;
pub use state::AppState;
