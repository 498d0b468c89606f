//! Store ports for the ledger.
//! The ledger service talks to storage only through these traits, so the
//! Postgres adapter and the in-memory adapter are interchangeable.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Account, Transaction, TransactionStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("account {0} not found")]
    NotFound(Uuid),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Position marker for restartable recent-transaction pagination.
/// Ordering key is (created_at, id), newest first.
pub type LogCursor = (DateTime<Utc>, Uuid);

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, account_id: Uuid) -> StoreResult<Account>;

    /// Provision a zero-balance account keyed on the external identity id.
    /// Idempotent: when the row already exists it is returned unchanged.
    async fn create_if_absent(&self, account_id: Uuid) -> StoreResult<Account>;

    /// Apply signed deltas to both balances as one atomic step. Rejects with
    /// `InsufficientFunds`, leaving state untouched, if either balance would
    /// end up negative. No intermediate negative balance is ever persisted.
    async fn apply_delta(
        &self,
        account_id: Uuid,
        btc_delta: &BigDecimal,
        usd_delta: &BigDecimal,
    ) -> StoreResult<Account>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Write-once append. The record keeps the id and timestamp it was
    /// created with.
    async fn append(&self, record: &Transaction) -> StoreResult<Transaction>;

    /// The single permitted in-place edit: pending -> terminal. Any other
    /// transition is a `Conflict`.
    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> StoreResult<Transaction>;

    /// Newest-first page of an account's transactions, restartable from
    /// `before`: only records strictly older than the cursor are returned.
    async fn list_recent(
        &self,
        account_id: Uuid,
        limit: i64,
        before: Option<LogCursor>,
    ) -> StoreResult<Vec<Transaction>>;
}
