//! API Routes

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::application_service::AcceptResult;
use crate::error::Result;
use crate::state::AppState;
use crate::verification_service::{VerificationResult, VerifyRequest};

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Check-in
        .route("/verify-ticket", post(verify_ticket))
        // Applications
        .route("/join/accept/:id", put(accept_application))
        .with_state(state)
}

// ========================================
// Check-in Handlers
// ========================================

/// Verify a ticket identifier
///
/// An unknown identifier is a 200 with `registered: false`; a body
/// without an identifier is a 400 `INVALID_IDENTIFIER`.
async fn verify_ticket(
    State(state): State<AppState>,
    body: std::result::Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerificationResult>> {
    let Json(req) = body?;
    let result = state.verification.verify(&req.identifier).await?;
    Ok(Json(result))
}

// ========================================
// Application Handlers
// ========================================

/// Accept a pending application (idempotent)
async fn accept_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AcceptResult>> {
    let outcome = state.applications.accept(&id).await?;
    Ok(Json(AcceptResult::from(outcome)))
}
