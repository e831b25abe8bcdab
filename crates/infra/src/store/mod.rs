//! Transactional store boundary for the ledger.
//!
//! The services in this crate never talk to a database directly; they open a
//! [`LedgerTx`] from a [`LedgerStore`], do all reads and writes through it, and
//! commit. Dropping a transaction without committing rolls it back.
//!
//! ## Soft deletes
//!
//! Deleted accounts and entries are filtered here, at the boundary: no read
//! method ever returns a row whose `is_deleted` flag is set, so the ledger
//! logic above never repeats that filter.
//!
//! ## Tenant isolation
//!
//! Every method takes the tenant explicitly and only sees that tenant's rows.
//! A row owned by another tenant is indistinguishable from a missing one.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;

use ledgerkit_accounting::{Account, JournalEntry, JournalEntryFilter, JournalEntryLine, JournalStats, LedgerResult};
use ledgerkit_core::{AccountId, JournalEntryId, TenantId};

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

/// Factory for ledger transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    /// Start a transaction.
    async fn begin(&self) -> LedgerResult<Self::Tx>;
}

/// One atomic unit of work against the ledger tables.
#[async_trait]
pub trait LedgerTx: Send {
    // -- accounts ---------------------------------------------------------

    async fn get_account(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>>;

    /// Like [`get_account`](Self::get_account), but holds a row lock until the
    /// transaction ends.
    async fn get_account_for_update(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>>;

    /// Like [`get_account`](Self::get_account), but holds a shared row lock
    /// until the transaction ends. Writers that only need the account to stay
    /// live (new lines, new children) use this; a concurrent delete waits.
    async fn get_account_for_share(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>>;

    async fn find_account_by_code(&mut self, tenant_id: TenantId, code: &str) -> LedgerResult<Option<Account>>;

    async fn list_accounts(&mut self, tenant_id: TenantId) -> LedgerResult<Vec<Account>>;

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Persist everything except `balance`, which only
    /// [`add_to_balance`](Self::add_to_balance) may change.
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Atomically add `delta` to an account balance; returns the new balance.
    ///
    /// A result outside the decimal range fails with `AmountOverflow` and
    /// leaves the balance untouched.
    async fn add_to_balance(&mut self, tenant_id: TenantId, id: AccountId, delta: Decimal) -> LedgerResult<Decimal>;

    async fn count_children(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<u64>;

    /// Lines that reference the account, soft-deleted entries included.
    async fn count_line_references(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<u64>;

    // -- journal entries --------------------------------------------------

    async fn get_entry(&mut self, tenant_id: TenantId, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>>;

    /// Like [`get_entry`](Self::get_entry), but holds a row lock until the
    /// transaction ends, so status checks and status writes cannot interleave.
    async fn get_entry_for_update(&mut self, tenant_id: TenantId, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>>;

    /// Ordered by transaction date, then entry number, both descending.
    async fn list_entries(&mut self, tenant_id: TenantId, filter: &JournalEntryFilter) -> LedgerResult<Vec<JournalEntry>>;

    /// Highest entry number made of `prefix` followed only by digits (deleted
    /// entries included, numbers are never reused). Numbers that do not
    /// follow that shape are ignored.
    ///
    /// Serializes numbering for the tenant until the transaction ends.
    async fn highest_entry_number(&mut self, tenant_id: TenantId, prefix: &str) -> LedgerResult<Option<String>>;

    /// Insert an entry together with its lines.
    async fn insert_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Persist header fields, status, timestamps, and the delete flag.
    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Delete the entry's current lines and insert `lines`.
    async fn replace_entry_lines(
        &mut self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        lines: &[JournalEntryLine],
    ) -> LedgerResult<()>;

    async fn entry_stats(&mut self, tenant_id: TenantId) -> LedgerResult<JournalStats>;

    // -- lifecycle --------------------------------------------------------

    async fn commit(self) -> LedgerResult<()>;
}
