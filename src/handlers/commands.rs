use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::AppState;
use crate::domain::{Currency, TransactionKind};
use crate::error::AppError;
use crate::middleware::auth::Caller;
use crate::validation;

/// Deposit/withdrawal command as submitted by the dashboard. Fields arrive as
/// strings so rejections carry the taxonomy's messages instead of generic
/// deserialization errors.
#[derive(Debug, Deserialize)]
pub struct CommandPayload {
    pub kind: String,
    pub amount: String,
    pub currency: String,
}

pub async fn submit(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<CommandPayload>,
) -> Result<impl IntoResponse, AppError> {
    let kind = TransactionKind::from_str(&validation::sanitize_string(&payload.kind))
        .map_err(AppError::InvalidCommand)?;
    let currency = Currency::from_str(&validation::sanitize_string(&payload.currency))
        .map_err(AppError::BadRequest)?;
    let amount = validation::parse_amount(&payload.amount).map_err(AppError::from)?;

    let receipt = state
        .ledger
        .submit(caller, account_id, kind, amount, currency)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
