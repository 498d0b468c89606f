use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::Caller;

#[derive(Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub async fn get_balance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let balance = state.queries.balance(caller, account_id).await?;
    Ok(Json(balance))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(account_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .queries
        .recent_transactions(caller, account_id, pagination.limit, pagination.cursor)
        .await?;
    Ok(Json(page))
}
