//! HTTP routes for the verifier service

mod verify;
mod well_known;

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub use verify::{VerifyRequest, VerifyResponse};

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Relying parties call /verify cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/verify", post(verify::verify))
        .route(
            "/.well-known/browserid",
            get(well_known::get_support_document),
        )
        .layer(cors)
        .with_state(state)
}
