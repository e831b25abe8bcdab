//! Accounting module (double-entry ledger core).
//!
//! Pure domain logic only: no IO, no logging, no persistence concerns.
//! The infra crate drives these types inside store transactions.

pub mod account;
pub mod chart;
pub mod error;
pub mod journal;
pub mod numbering;
pub mod tree;

pub use account::{classify, required_text, Account, AccountCategory, AccountPatch, AccountType, NewAccount};
pub use chart::{next_account_code, ChartTemplate, DEFAULT_CHART};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use journal::{
    referenced_accounts, validate_lines, JournalEntry, JournalEntryFilter, JournalEntryLine, JournalEntryPatch,
    JournalStats, JournalStatus, LineInput, LineTotals, NewJournalEntry, VoidEffect,
};
pub use numbering::EntryNumbering;
pub use tree::{
    build_account_tree, ensure_no_cycle, rolled_up_balance, rolled_up_balances, AccountNode, ChildIndex,
};
