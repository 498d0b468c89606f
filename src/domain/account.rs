//! Account domain entity.
//! One balance record per external identity, BTC and USD denominated.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::Currency;

/// Balance-holding entity. The account id is the external identity id, so
/// provisioning is naturally keyed one-to-one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub btc_balance: BigDecimal,
    pub usd_balance: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A freshly provisioned account: both balances zero.
    pub fn provisioned(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            btc_balance: BigDecimal::from(0),
            usd_balance: BigDecimal::from(0),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balance(&self, currency: Currency) -> &BigDecimal {
        match currency {
            Currency::Btc => &self.btc_balance,
            Currency::Usd => &self.usd_balance,
        }
    }
}
