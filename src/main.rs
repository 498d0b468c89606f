use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coinledger::adapters::{MemoryStore, PgStore};
use coinledger::config::Config;
use coinledger::ports::{AccountStore, TransactionLog};
use coinledger::services::{LedgerService, QueryFacade};
use coinledger::{AppState, create_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (accounts, log): (Arc<dyn AccountStore>, Arc<dyn TransactionLog>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;

                let migrator = Migrator::new(Path::new("./migrations")).await?;
                migrator.run(&pool).await?;
                tracing::info!("Database migrations completed");

                let store = Arc::new(PgStore::new(pool));
                (store.clone(), store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, running on the in-memory store");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let app_state = AppState {
        ledger: LedgerService::new(accounts.clone(), log.clone()),
        queries: QueryFacade::new(accounts, log),
        provisioning_secret: config.provisioning_secret.clone(),
    };

    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
