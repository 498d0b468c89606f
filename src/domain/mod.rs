pub mod account;
pub mod transaction;

pub use account::Account;
pub use transaction::{Currency, Transaction, TransactionKind, TransactionStatus};
