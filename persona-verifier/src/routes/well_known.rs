//! /.well-known/browserid endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use persona_core::discovery::SupportDocument;

use crate::state::AppState;

/// GET /.well-known/browserid
pub async fn get_support_document(State(state): State<Arc<AppState>>) -> Json<SupportDocument> {
    let doc = SupportDocument::basic(state.public_key.clone(), "/auth", "/provision");
    Json(doc)
}
