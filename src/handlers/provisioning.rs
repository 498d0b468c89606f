use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;

pub const PROVISIONING_SIGNATURE_HEADER: &str = "X-Provisioning-Signature";

/// Identity-registration event delivered by the external identity provider.
#[derive(Debug, Deserialize)]
pub struct IdentityEventPayload {
    pub identity_id: Uuid,
}

/// Consume an identity-registration event and provision the matching
/// zero-balance account. Replays are harmless: provisioning is idempotent,
/// keyed on the identity id.
pub async fn identity_registered(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IdentityEventPayload>,
) -> Result<impl IntoResponse, AppError> {
    let sig = headers
        .get(PROVISIONING_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    if sig != Some(state.provisioning_secret.as_str()) {
        return Err(AppError::Unauthorized("invalid signature".to_string()));
    }

    let account = state.ledger.provision_account(payload.identity_id).await?;

    Ok((StatusCode::CREATED, Json(account)))
}
