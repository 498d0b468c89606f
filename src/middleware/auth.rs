//! Caller identity extraction.
//!
//! Authentication itself is delegated to the external identity layer; by the
//! time a request reaches this service the gateway has already verified the
//! caller and stamped the account id into the `X-Account-Id` header. Every
//! read and write still checks that id against the addressed account.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const ACCOUNT_ID_HEADER: &str = "X-Account-Id";

/// The already-authenticated account identity attached to a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACCOUNT_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("missing {} header", ACCOUNT_ID_HEADER))
            })?;

        let id = Uuid::parse_str(raw).map_err(|_| {
            AppError::Unauthorized(format!("malformed {} header", ACCOUNT_ID_HEADER))
        })?;

        Ok(Caller(id))
    }
}
