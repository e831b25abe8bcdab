use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use ledgerkit_accounting::{
    Account, JournalEntry, JournalEntryFilter, JournalEntryLine, JournalStats, LedgerError, LedgerResult,
};
use ledgerkit_core::{AccountId, JournalEntryId, TenantId};

use super::{LedgerStore, LedgerTx};

#[derive(Debug, Default, Clone)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    entries: HashMap<JournalEntryId, JournalEntry>,
}

impl LedgerState {
    fn live_account(&self, tenant_id: TenantId, id: AccountId) -> Option<&Account> {
        self.accounts
            .get(&id)
            .filter(|a| a.tenant_id == tenant_id && !a.is_deleted)
    }

    fn live_entry(&self, tenant_id: TenantId, id: JournalEntryId) -> Option<&JournalEntry> {
        self.entries
            .get(&id)
            .filter(|e| e.tenant_id == tenant_id && !e.is_deleted)
    }

    fn live_entries(&self, tenant_id: TenantId) -> impl Iterator<Item = &JournalEntry> {
        self.entries
            .values()
            .filter(move |e| e.tenant_id == tenant_id && !e.is_deleted)
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Not optimized for performance: a transaction holds
/// one store-wide lock for its whole lifetime and works on a private copy of
/// the state, which replaces the shared state on commit. That makes every
/// transaction serializable and a dropped transaction a clean rollback.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> LedgerResult<InMemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx { guard, working })
    }
}

/// Transaction over [`InMemoryLedgerStore`].
pub struct InMemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn get_account(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.working.live_account(tenant_id, id).cloned())
    }

    async fn get_account_for_update(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>> {
        // The store-wide lock already serializes writers.
        self.get_account(tenant_id, id).await
    }

    async fn get_account_for_share(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>> {
        self.get_account(tenant_id, id).await
    }

    async fn find_account_by_code(&mut self, tenant_id: TenantId, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self
            .working
            .accounts
            .values()
            .find(|a| a.tenant_id == tenant_id && !a.is_deleted && a.code == code)
            .cloned())
    }

    async fn list_accounts(&mut self, tenant_id: TenantId) -> LedgerResult<Vec<Account>> {
        Ok(self
            .working
            .accounts
            .values()
            .filter(|a| a.tenant_id == tenant_id && !a.is_deleted)
            .cloned()
            .collect())
    }

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        let duplicate = self.working.accounts.values().any(|a| {
            a.tenant_id == account.tenant_id && !a.is_deleted && a.code == account.code
        });
        if duplicate || self.working.accounts.contains_key(&account.id) {
            return Err(LedgerError::conflict(format!(
                "unique violation on account code '{}'",
                account.code
            )));
        }
        self.working.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let clash = self.working.accounts.values().any(|a| {
            a.id != account.id
                && a.tenant_id == account.tenant_id
                && !a.is_deleted
                && !account.is_deleted
                && a.code == account.code
        });
        if clash {
            return Err(LedgerError::conflict(format!(
                "unique violation on account code '{}'",
                account.code
            )));
        }
        match self.working.accounts.get_mut(&account.id) {
            Some(existing) if existing.tenant_id == account.tenant_id => {
                let balance = existing.balance;
                *existing = account.clone();
                existing.balance = balance;
                Ok(())
            }
            _ => Err(LedgerError::AccountNotFound(account.id)),
        }
    }

    async fn add_to_balance(&mut self, tenant_id: TenantId, id: AccountId, delta: Decimal) -> LedgerResult<Decimal> {
        match self.working.accounts.get_mut(&id) {
            Some(a) if a.tenant_id == tenant_id && !a.is_deleted => {
                a.balance = a
                    .balance
                    .checked_add(delta)
                    .ok_or(LedgerError::AmountOverflow("account balance"))?;
                Ok(a.balance)
            }
            _ => Err(LedgerError::AccountNotFound(id)),
        }
    }

    async fn count_children(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<u64> {
        Ok(self
            .working
            .accounts
            .values()
            .filter(|a| a.tenant_id == tenant_id && !a.is_deleted && a.parent_id == Some(id))
            .count() as u64)
    }

    async fn count_line_references(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<u64> {
        Ok(self
            .working
            .entries
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .flat_map(|e| e.lines.iter())
            .filter(|l| l.account_id == id)
            .count() as u64)
    }

    async fn get_entry(&mut self, tenant_id: TenantId, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.working.live_entry(tenant_id, id).cloned())
    }

    async fn get_entry_for_update(&mut self, tenant_id: TenantId, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        self.get_entry(tenant_id, id).await
    }

    async fn list_entries(&mut self, tenant_id: TenantId, filter: &JournalEntryFilter) -> LedgerResult<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self
            .working
            .live_entries(tenant_id)
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            (b.transaction_date, b.entry_number.len(), &b.entry_number)
                .cmp(&(a.transaction_date, a.entry_number.len(), &a.entry_number))
        });
        Ok(entries)
    }

    async fn highest_entry_number(&mut self, tenant_id: TenantId, prefix: &str) -> LedgerResult<Option<String>> {
        Ok(self
            .working
            .entries
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .map(|e| e.entry_number.as_str())
            .filter(|number| {
                number
                    .strip_prefix(prefix)
                    .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            })
            .max_by(|a, b| (a.len(), *a).cmp(&(b.len(), *b)))
            .map(str::to_string))
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        let duplicate = self
            .working
            .entries
            .values()
            .any(|e| e.tenant_id == entry.tenant_id && e.entry_number == entry.entry_number);
        if duplicate || self.working.entries.contains_key(&entry.id) {
            return Err(LedgerError::conflict(format!(
                "unique violation on entry number '{}'",
                entry.entry_number
            )));
        }
        self.working.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        match self.working.entries.get_mut(&entry.id) {
            Some(existing) if existing.tenant_id == entry.tenant_id => {
                let lines = std::mem::take(&mut existing.lines);
                *existing = entry.clone();
                existing.lines = lines;
                Ok(())
            }
            _ => Err(LedgerError::EntryNotFound(entry.id)),
        }
    }

    async fn replace_entry_lines(
        &mut self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        lines: &[JournalEntryLine],
    ) -> LedgerResult<()> {
        match self.working.entries.get_mut(&entry_id) {
            Some(existing) if existing.tenant_id == tenant_id && !existing.is_deleted => {
                existing.lines = lines.to_vec();
                Ok(())
            }
            _ => Err(LedgerError::EntryNotFound(entry_id)),
        }
    }

    async fn entry_stats(&mut self, tenant_id: TenantId) -> LedgerResult<JournalStats> {
        JournalStats::from_entries(self.working.live_entries(tenant_id))
    }

    async fn commit(self) -> LedgerResult<()> {
        let InMemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
