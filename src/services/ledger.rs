//! Ledger service: the only writer of account and transaction state.
//!
//! A submit call validates the command, takes the per-account write lock,
//! appends a pending transaction record, applies the signed balance delta,
//! and marks the record terminal before returning. Calls against different
//! accounts proceed in parallel; calls against the same account serialize.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Account, Currency, Transaction, TransactionKind, TransactionStatus};
use crate::error::AppError;
use crate::ports::{AccountStore, StoreError, TransactionLog};
use crate::validation;

/// Transient store failures get this many additional attempts before the
/// error is surfaced.
const STORE_RETRIES: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceView {
    pub btc: BigDecimal,
    pub usd: BigDecimal,
}

impl From<Account> for BalanceView {
    fn from(account: Account) -> Self {
        Self {
            btc: account.btc_balance,
            usd: account.usd_balance,
        }
    }
}

/// Outcome of an accepted command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_id: Uuid,
    pub balance: BalanceView,
}

#[derive(Clone)]
pub struct LedgerService {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
    write_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl LedgerService {
    pub fn new(accounts: Arc<dyn AccountStore>, log: Arc<dyn TransactionLog>) -> Self {
        Self {
            accounts,
            log,
            write_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn write_lock(&self, account_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Handle an external identity-registration event: create exactly one
    /// zero-balance account for the identity. Safe to replay.
    pub async fn provision_account(&self, identity_id: Uuid) -> Result<Account, AppError> {
        let account = self.accounts.create_if_absent(identity_id).await?;
        tracing::info!(account_id = %account.id, "account provisioned");
        Ok(account)
    }

    /// Validate and apply a balance-affecting command, returning the new
    /// balance together with the logged transaction id.
    pub async fn submit(
        &self,
        caller: Uuid,
        account_id: Uuid,
        kind: TransactionKind,
        amount: BigDecimal,
        currency: Currency,
    ) -> Result<Receipt, AppError> {
        if caller != account_id {
            return Err(AppError::Forbidden(format!(
                "caller {} does not own account {}",
                caller, account_id
            )));
        }

        if kind == TransactionKind::Trade {
            return Err(AppError::InvalidCommand(
                "trade commands are not accepted".to_string(),
            ));
        }

        validation::validate_positive_amount(&amount)?;

        let lock = self.write_lock(account_id).await;
        let _guard = lock.lock().await;

        let account = self.accounts.get(account_id).await?;

        if kind == TransactionKind::Withdrawal && &amount > account.balance(currency) {
            // Rejected withdrawals still leave an audit record
            self.record_failure(account_id, kind, amount.clone(), currency)
                .await;
            return Err(AppError::InsufficientFunds(format!(
                "withdrawal of {} {} exceeds balance {}",
                amount,
                currency,
                account.balance(currency)
            )));
        }

        let record = Transaction::pending(account_id, kind, amount.clone(), currency);
        self.log.append(&record).await?;

        let signed = match kind {
            TransactionKind::Deposit => amount.clone(),
            TransactionKind::Withdrawal => -amount.clone(),
            TransactionKind::Trade => unreachable!("rejected above"),
        };
        let (btc_delta, usd_delta) = match currency {
            Currency::Btc => (signed, BigDecimal::from(0)),
            Currency::Usd => (BigDecimal::from(0), signed),
        };

        let updated = match self
            .apply_with_retry(account_id, &btc_delta, &usd_delta)
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                self.mark_failed(record.id).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self
            .update_status_with_retry(record.id, TransactionStatus::Completed)
            .await
        {
            // Delta is already applied; undo it so the rejection is clean,
            // and make sure the record still reaches a terminal status
            tracing::error!(transaction_id = %record.id, error = %err, "failed to complete transaction, reversing delta");
            if let Err(reverse_err) = self
                .accounts
                .apply_delta(account_id, &-btc_delta, &-usd_delta)
                .await
            {
                tracing::error!(account_id = %account_id, error = %reverse_err, "failed to reverse applied delta");
            }
            self.mark_failed(record.id).await;
            return Err(err.into());
        }

        tracing::info!(
            transaction_id = %record.id,
            account_id = %account_id,
            kind = %kind,
            %currency,
            "command applied"
        );

        Ok(Receipt {
            transaction_id: record.id,
            balance: updated.into(),
        })
    }

    async fn apply_with_retry(
        &self,
        account_id: Uuid,
        btc_delta: &BigDecimal,
        usd_delta: &BigDecimal,
    ) -> Result<Account, StoreError> {
        let mut attempt = 0;
        loop {
            match self
                .accounts
                .apply_delta(account_id, btc_delta, usd_delta)
                .await
            {
                Err(err @ (StoreError::Conflict(_) | StoreError::Unavailable(_)))
                    if attempt < STORE_RETRIES =>
                {
                    attempt += 1;
                    tracing::warn!(
                        account_id = %account_id,
                        error = %err,
                        attempt,
                        "transient store failure, retrying delta"
                    );
                }
                other => return other,
            }
        }
    }

    async fn update_status_with_retry(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<Transaction, StoreError> {
        let mut attempt = 0;
        loop {
            match self.log.update_status(transaction_id, status).await {
                Err(err @ (StoreError::Conflict(_) | StoreError::Unavailable(_)))
                    if attempt < STORE_RETRIES =>
                {
                    attempt += 1;
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        error = %err,
                        attempt,
                        "transient store failure, retrying status update"
                    );
                }
                other => return other,
            }
        }
    }

    /// Best-effort failed-record logging for rejected withdrawals. The
    /// rejection itself is the caller-visible outcome either way.
    async fn record_failure(
        &self,
        account_id: Uuid,
        kind: TransactionKind,
        amount: BigDecimal,
        currency: Currency,
    ) {
        let record = Transaction::pending(account_id, kind, amount, currency);
        match self.log.append(&record).await {
            Ok(_) => self.mark_failed(record.id).await,
            Err(err) => {
                tracing::error!(account_id = %account_id, error = %err, "failed to log rejected withdrawal")
            }
        }
    }

    async fn mark_failed(&self, transaction_id: Uuid) {
        if let Err(err) = self
            .log
            .update_status(transaction_id, TransactionStatus::Failed)
            .await
        {
            tracing::error!(transaction_id = %transaction_id, error = %err, "failed to mark transaction failed");
        }
    }
}
