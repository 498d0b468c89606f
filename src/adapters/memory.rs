//! In-memory store. Backs tests and DB-less runs.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Account, Transaction, TransactionStatus};
use crate::ports::{AccountStore, LogCursor, StoreError, StoreResult, TransactionLog};

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    log: RwLock<Vec<Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn accounts_read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<Uuid, Account>>> {
        self.accounts
            .read()
            .map_err(|e| StoreError::Unavailable(format!("account map poisoned: {}", e)))
    }

    fn accounts_write(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Account>>> {
        self.accounts
            .write()
            .map_err(|e| StoreError::Unavailable(format!("account map poisoned: {}", e)))
    }

    fn log_read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Vec<Transaction>>> {
        self.log
            .read()
            .map_err(|e| StoreError::Unavailable(format!("log poisoned: {}", e)))
    }

    fn log_write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Vec<Transaction>>> {
        self.log
            .write()
            .map_err(|e| StoreError::Unavailable(format!("log poisoned: {}", e)))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, account_id: Uuid) -> StoreResult<Account> {
        self.accounts_read()?
            .get(&account_id)
            .cloned()
            .ok_or(StoreError::NotFound(account_id))
    }

    async fn create_if_absent(&self, account_id: Uuid) -> StoreResult<Account> {
        let mut accounts = self.accounts_write()?;
        let account = accounts
            .entry(account_id)
            .or_insert_with(|| Account::provisioned(account_id));
        Ok(account.clone())
    }

    async fn apply_delta(
        &self,
        account_id: Uuid,
        btc_delta: &BigDecimal,
        usd_delta: &BigDecimal,
    ) -> StoreResult<Account> {
        let mut accounts = self.accounts_write()?;
        let account = accounts
            .get_mut(&account_id)
            .ok_or(StoreError::NotFound(account_id))?;

        let new_btc = &account.btc_balance + btc_delta;
        let new_usd = &account.usd_balance + usd_delta;
        if new_btc < BigDecimal::from(0) || new_usd < BigDecimal::from(0) {
            return Err(StoreError::InsufficientFunds);
        }

        account.btc_balance = new_btc;
        account.usd_balance = new_usd;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.accounts_read().map(|_| ())
    }
}

#[async_trait]
impl TransactionLog for MemoryStore {
    async fn append(&self, record: &Transaction) -> StoreResult<Transaction> {
        let mut log = self.log_write()?;
        if log.iter().any(|tx| tx.id == record.id) {
            return Err(StoreError::Conflict(format!(
                "transaction {} already appended",
                record.id
            )));
        }
        log.push(record.clone());
        Ok(record.clone())
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> StoreResult<Transaction> {
        let mut log = self.log_write()?;
        let record = log
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or(StoreError::NotFound(id))?;

        if !record.status.can_transition_to(status) {
            return Err(StoreError::Conflict(format!(
                "transaction {} is {}, cannot become {}",
                id, record.status, status
            )));
        }

        record.status = status;
        Ok(record.clone())
    }

    async fn list_recent(
        &self,
        account_id: Uuid,
        limit: i64,
        before: Option<LogCursor>,
    ) -> StoreResult<Vec<Transaction>> {
        let log = self.log_read()?;
        let mut matching: Vec<Transaction> = log
            .iter()
            .filter(|tx| tx.account_id == account_id)
            .filter(|tx| match before {
                Some((ts, id)) => (tx.created_at, tx.id) < (ts, id),
                None => true,
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, TransactionKind};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn provisioning_is_idempotent() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        let first = store.create_if_absent(id).await.unwrap();
        store
            .apply_delta(id, &dec("1"), &dec("0"))
            .await
            .unwrap();
        let second = store.create_if_absent(id).await.unwrap();

        assert_eq!(first.id, second.id);
        // Re-provisioning must not reset the balance
        assert_eq!(second.btc_balance, dec("1"));
    }

    #[tokio::test]
    async fn apply_delta_rejects_negative_without_mutation() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.create_if_absent(id).await.unwrap();
        store.apply_delta(id, &dec("0.5"), &dec("0")).await.unwrap();

        let err = store
            .apply_delta(id, &dec("-1.0"), &dec("0"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds));

        let account = store.get(id).await.unwrap();
        assert_eq!(account.btc_balance, dec("0.5"));
        assert_eq!(account.usd_balance, dec("0"));
    }

    #[tokio::test]
    async fn apply_delta_unknown_account_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .apply_delta(Uuid::new_v4(), &dec("1"), &dec("0"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn status_update_is_one_way() {
        let store = MemoryStore::new();
        let account_id = Uuid::new_v4();
        let tx = Transaction::pending(account_id, TransactionKind::Deposit, dec("1"), Currency::Btc);
        store.append(&tx).await.unwrap();

        let updated = store
            .update_status(tx.id, TransactionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Completed);

        let err = store
            .update_status(tx.id, TransactionStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_append_is_rejected() {
        let store = MemoryStore::new();
        let tx = Transaction::pending(
            Uuid::new_v4(),
            TransactionKind::Deposit,
            dec("1"),
            Currency::Usd,
        );
        store.append(&tx).await.unwrap();
        let err = store.append(&tx).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first_and_paginates() {
        let store = MemoryStore::new();
        let account_id = Uuid::new_v4();

        let mut ids = Vec::new();
        for i in 0..5 {
            let mut tx = Transaction::pending(
                account_id,
                TransactionKind::Deposit,
                dec("1"),
                Currency::Usd,
            );
            // Distinct timestamps so the ordering is unambiguous
            tx.created_at = chrono::Utc::now() + chrono::Duration::seconds(i);
            store.append(&tx).await.unwrap();
            ids.push(tx.id);
        }

        let page = store.list_recent(account_id, 3, None).await.unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].id, ids[4]);
        assert_eq!(page[1].id, ids[3]);
        assert_eq!(page[2].id, ids[2]);

        let cursor = (page[2].created_at, page[2].id);
        let rest = store
            .list_recent(account_id, 10, Some(cursor))
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].id, ids[1]);
        assert_eq!(rest[1].id, ids[0]);
    }

    #[tokio::test]
    async fn list_recent_is_scoped_to_the_account() {
        let store = MemoryStore::new();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();

        store
            .append(&Transaction::pending(
                mine,
                TransactionKind::Deposit,
                dec("1"),
                Currency::Btc,
            ))
            .await
            .unwrap();
        store
            .append(&Transaction::pending(
                theirs,
                TransactionKind::Deposit,
                dec("2"),
                Currency::Btc,
            ))
            .await
            .unwrap();

        let page = store.list_recent(mine, 10, None).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].account_id, mine);
    }
}
