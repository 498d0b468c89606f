//! Read-only projections over the ledger: current balance and recent
//! transactions. Never takes the write lock, so reads do not block writes.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::ports::{AccountStore, TransactionLog};
use crate::services::ledger::BalanceView;
use crate::utils::cursor;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    /// Opaque token for the next page; absent when this page is not full.
    pub next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct QueryFacade {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
}

impl QueryFacade {
    pub fn new(accounts: Arc<dyn AccountStore>, log: Arc<dyn TransactionLog>) -> Self {
        Self { accounts, log }
    }

    fn authorize(caller: Uuid, account_id: Uuid) -> Result<(), AppError> {
        if caller != account_id {
            return Err(AppError::Forbidden(format!(
                "caller {} does not own account {}",
                caller, account_id
            )));
        }
        Ok(())
    }

    pub async fn balance(&self, caller: Uuid, account_id: Uuid) -> Result<BalanceView, AppError> {
        Self::authorize(caller, account_id)?;
        let account = self.accounts.get(account_id).await?;
        Ok(account.into())
    }

    pub async fn recent_transactions(
        &self,
        caller: Uuid,
        account_id: Uuid,
        limit: Option<i64>,
        cursor: Option<String>,
    ) -> Result<TransactionPage, AppError> {
        Self::authorize(caller, account_id)?;
        // The account must exist even when its log is empty
        self.accounts.get(account_id).await?;

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let before = cursor
            .as_deref()
            .map(cursor::decode)
            .transpose()
            .map_err(AppError::BadRequest)?;

        let transactions = self.log.list_recent(account_id, limit, before).await?;

        let next_cursor = if transactions.len() as i64 == limit {
            transactions
                .last()
                .map(|tx| cursor::encode(tx.created_at, tx.id))
        } else {
            None
        };

        Ok(TransactionPage {
            transactions,
            next_cursor,
        })
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.accounts.ping().await.map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::{Currency, TransactionKind};
    use crate::services::LedgerService;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn setup() -> (LedgerService, QueryFacade) {
        let store = Arc::new(MemoryStore::new());
        (
            LedgerService::new(store.clone(), store.clone()),
            QueryFacade::new(store.clone(), store),
        )
    }

    #[tokio::test]
    async fn balance_reflects_committed_writes() {
        let (ledger, queries) = setup();
        let id = Uuid::new_v4();
        ledger.provision_account(id).await.unwrap();
        ledger
            .submit(id, id, TransactionKind::Deposit, dec("2.5"), Currency::Btc)
            .await
            .unwrap();

        let balance = queries.balance(id, id).await.unwrap();
        assert_eq!(balance.btc, dec("2.5"));
        assert_eq!(balance.usd, dec("0"));
    }

    #[tokio::test]
    async fn balance_of_unknown_account_is_not_found() {
        let (_, queries) = setup();
        let id = Uuid::new_v4();
        let err = queries.balance(id, id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn reads_are_ownership_checked() {
        let (ledger, queries) = setup();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        ledger.provision_account(theirs).await.unwrap();

        let err = queries.balance(mine, theirs).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = queries
            .recent_transactions(mine, theirs, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn default_page_is_ten_newest_first() {
        let (ledger, queries) = setup();
        let id = Uuid::new_v4();
        ledger.provision_account(id).await.unwrap();
        for i in 1..=12 {
            ledger
                .submit(
                    id,
                    id,
                    TransactionKind::Deposit,
                    BigDecimal::from(i),
                    Currency::Usd,
                )
                .await
                .unwrap();
        }

        let page = queries
            .recent_transactions(id, id, None, None)
            .await
            .unwrap();
        assert_eq!(page.transactions.len(), 10);
        assert!(page.next_cursor.is_some());
        for pair in page.transactions.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[tokio::test]
    async fn pagination_restarts_from_the_cursor_without_overlap() {
        let (ledger, queries) = setup();
        let id = Uuid::new_v4();
        ledger.provision_account(id).await.unwrap();
        for i in 1..=7 {
            ledger
                .submit(
                    id,
                    id,
                    TransactionKind::Deposit,
                    BigDecimal::from(i),
                    Currency::Btc,
                )
                .await
                .unwrap();
        }

        let first = queries
            .recent_transactions(id, id, Some(4), None)
            .await
            .unwrap();
        assert_eq!(first.transactions.len(), 4);
        let second = queries
            .recent_transactions(id, id, Some(4), first.next_cursor.clone())
            .await
            .unwrap();
        assert_eq!(second.transactions.len(), 3);
        assert!(second.next_cursor.is_none());

        let mut seen: Vec<Uuid> = first
            .transactions
            .iter()
            .chain(second.transactions.iter())
            .map(|tx| tx.id)
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn malformed_cursor_is_a_bad_request() {
        let (ledger, queries) = setup();
        let id = Uuid::new_v4();
        ledger.provision_account(id).await.unwrap();

        let err = queries
            .recent_transactions(id, id, None, Some("not-base64!!".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
