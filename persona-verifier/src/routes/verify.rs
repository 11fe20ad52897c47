//! Assertion verification endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::{Form, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use persona_core::VerifiedIdentity;

use crate::state::AppState;

/// Request body for verification
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// The bundled assertion (`cert~...~assertion` wire form)
    pub assertion: String,

    /// The expected audience (relying party origin)
    pub audience: String,
}

/// Response from the verification endpoint
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerifyResponse {
    Okay {
        #[serde(flatten)]
        identity: VerifiedIdentity,
    },
    Failure {
        reason: String,
    },
}

/// POST /verify
///
/// Verify a bundled identity assertion and return the verified email.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Form(req): Form<VerifyRequest>,
) -> Json<VerifyResponse> {
    let now = Utc::now().timestamp_millis();

    // The resolver's well-known fetches block; keep them off the async
    // runtime.
    let result =
        tokio::task::spawn_blocking(move || state.verifier.verify(&req.assertion, &req.audience, now))
            .await;

    let response = match result {
        Ok(Ok(identity)) => {
            tracing::info!("Verified {} (issuer {})", identity.email, identity.issuer);
            VerifyResponse::Okay { identity }
        }
        Ok(Err(err)) => {
            tracing::debug!("Verification failed: {}", err);
            VerifyResponse::Failure {
                reason: err.to_string(),
            }
        }
        Err(err) => {
            tracing::error!("Verification task failed: {}", err);
            VerifyResponse::Failure {
                reason: "internal error".to_string(),
            }
        }
    };

    Json(response)
}
