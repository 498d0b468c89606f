pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::{LedgerService, QueryFacade};

#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerService,
    pub queries: QueryFacade,
    pub provisioning_secret: String,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/identity-events",
            post(handlers::provisioning::identity_registered),
        )
        .route("/accounts/:id/commands", post(handlers::commands::submit))
        .route("/accounts/:id/balance", get(handlers::accounts::get_balance))
        .route(
            "/accounts/:id/transactions",
            get(handlers::accounts::list_transactions),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
