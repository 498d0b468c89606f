//! Postgres-backed store.
//!
//! `apply_delta` is a single conditional UPDATE, so the non-negative balance
//! invariant holds even if callers race past the service-level lock. The
//! schema carries matching CHECK constraints as a second line.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Account, Currency, Transaction, TransactionKind, TransactionStatus};
use crate::ports::{AccountStore, LogCursor, StoreError, StoreResult, TransactionLog};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some("40001") => {
            StoreError::Conflict(err.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get(&self, account_id: Uuid) -> StoreResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row.map(AccountRow::into_domain)
            .ok_or(StoreError::NotFound(account_id))
    }

    async fn create_if_absent(&self, account_id: Uuid) -> StoreResult<Account> {
        let inserted = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (id, btc_balance, usd_balance, created_at, updated_at)
            VALUES ($1, 0, 0, NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match inserted {
            Some(row) => Ok(row.into_domain()),
            // Row already existed; the insert was a no-op
            None => self.get(account_id).await,
        }
    }

    async fn apply_delta(
        &self,
        account_id: Uuid,
        btc_delta: &BigDecimal,
        usd_delta: &BigDecimal,
    ) -> StoreResult<Account> {
        let updated = sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE accounts
            SET btc_balance = btc_balance + $2,
                usd_balance = usd_balance + $3,
                updated_at = NOW()
            WHERE id = $1
              AND btc_balance + $2 >= 0
              AND usd_balance + $3 >= 0
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(btc_delta)
        .bind(usd_delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match updated {
            Some(row) => Ok(row.into_domain()),
            // Condition failed: either the row is missing or a balance would
            // have gone negative. Disambiguate with a plain read.
            None => match self.get(account_id).await {
                Ok(_) => Err(StoreError::InsufficientFunds),
                Err(e) => Err(e),
            },
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_err)
    }
}

#[async_trait]
impl TransactionLog for PgStore {
    async fn append(&self, record: &Transaction) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (id, account_id, kind, amount, currency, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.account_id)
        .bind(record.kind.as_str())
        .bind(&record.amount)
        .bind(record.currency.as_str())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        row.into_domain()
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            Some(row) => row.into_domain(),
            None => {
                let exists = sqlx::query("SELECT 1 FROM transactions WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(store_err)?;
                match exists {
                    Some(_) => Err(StoreError::Conflict(format!(
                        "transaction {} is already terminal",
                        id
                    ))),
                    None => Err(StoreError::NotFound(id)),
                }
            }
        }
    }

    async fn list_recent(
        &self,
        account_id: Uuid,
        limit: i64,
        before: Option<LogCursor>,
    ) -> StoreResult<Vec<Transaction>> {
        let rows = match before {
            Some((ts, id)) => {
                sqlx::query_as::<_, TransactionRow>(
                    r#"
                    SELECT * FROM transactions
                    WHERE account_id = $1 AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(account_id)
                .bind(ts)
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, TransactionRow>(
                    r#"
                    SELECT * FROM transactions
                    WHERE account_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(account_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(store_err)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    btc_balance: BigDecimal,
    usd_balance: BigDecimal,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl AccountRow {
    fn into_domain(self) -> Account {
        Account {
            id: self.id,
            btc_balance: self.btc_balance,
            usd_balance: self.usd_balance,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    kind: String,
    amount: BigDecimal,
    currency: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let kind = TransactionKind::from_str(&self.kind)
            .map_err(|e| StoreError::Unavailable(format!("corrupt kind column: {}", e)))?;
        let currency = Currency::from_str(&self.currency)
            .map_err(|e| StoreError::Unavailable(format!("corrupt currency column: {}", e)))?;
        let status = TransactionStatus::from_str(&self.status)
            .map_err(|e| StoreError::Unavailable(format!("corrupt status column: {}", e)))?;

        Ok(Transaction {
            id: self.id,
            account_id: self.account_id,
            kind,
            amount: self.amount,
            currency,
            status,
            created_at: self.created_at,
        })
    }
}
