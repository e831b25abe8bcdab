//! Infrastructure layer: ledger services, stores, and configuration.
//!
//! - [`AccountDirectory`]: chart of accounts and the balance write path.
//! - [`LedgerEngine`]: journal entry lifecycle.
//! - [`store`]: the transactional boundary, with in-memory and Postgres
//!   implementations.

pub mod config;
pub mod directory;
pub mod engine;
pub mod store;

pub use config::{ConfigError, LedgerConfig};
pub use directory::AccountDirectory;
pub use engine::LedgerEngine;
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerTx, PostgresLedgerStore};
