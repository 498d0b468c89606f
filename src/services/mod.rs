pub mod ledger;
pub mod query;

pub use ledger::LedgerService;
pub use query::QueryFacade;
