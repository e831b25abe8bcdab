//! Ledger engine: journal entry lifecycle.
//!
//! ```text
//! create ──► DRAFT ──post──► POSTED ──void──► VOIDED
//!              │                                 ▲
//!              └──────────────void───────────────┘
//! ```
//!
//! Every operation runs in one store transaction. Posting applies each line
//! to its account through the account directory; voiding a posted entry
//! applies the exact inverse, once. Voiding a draft touches no balance.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use ledgerkit_accounting::{
    referenced_accounts, validate_lines, EntryNumbering, JournalEntry, JournalEntryFilter, JournalEntryPatch,
    JournalStats, LedgerError, LedgerResult, LineInput, NewJournalEntry, VoidEffect,
};
use ledgerkit_accounting::journal::MIN_LINES;
use ledgerkit_core::{JournalEntryId, RequestContext, TenantId};

use crate::directory::AccountDirectory;
use crate::store::{LedgerStore, LedgerTx};

pub struct LedgerEngine<S: LedgerStore> {
    store: Arc<S>,
    numbering: EntryNumbering,
}

impl<S: LedgerStore> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            numbering: self.numbering.clone(),
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            numbering: EntryNumbering::default(),
        }
    }

    pub fn with_numbering(mut self, numbering: EntryNumbering) -> Self {
        self.numbering = numbering;
        self
    }

    /// Validate and persist a new DRAFT entry. No balance changes.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id(), lines = request.lines.len()), err)]
    pub async fn create_journal_entry(&self, ctx: &RequestContext, request: NewJournalEntry) -> LedgerResult<JournalEntry> {
        validate_lines(&request.lines)?;

        let tenant_id = ctx.tenant_id();
        let mut tx = self.store.begin().await?;
        ensure_accounts_exist(&mut tx, tenant_id, &request.lines).await?;

        let now = Utc::now();
        let highest = tx.highest_entry_number(tenant_id, self.numbering.prefix()).await?;
        let entry_number = self.numbering.next_after(highest.as_deref(), now);

        let entry = JournalEntry::draft(tenant_id, entry_number, &request, ctx.user_id(), now);
        tx.insert_entry(&entry).await?;
        tx.commit().await?;

        info!(entry_id = %entry.id, entry_number = %entry.entry_number, "journal entry created");
        Ok(entry)
    }

    /// Patch a DRAFT entry. Supplied lines replace the whole line set.
    #[instrument(skip(self, ctx, patch), fields(tenant_id = %ctx.tenant_id(), entry_id = %id), err)]
    pub async fn update_journal_entry(
        &self,
        ctx: &RequestContext,
        id: JournalEntryId,
        patch: JournalEntryPatch,
    ) -> LedgerResult<JournalEntry> {
        let tenant_id = ctx.tenant_id();
        let mut tx = self.store.begin().await?;
        let mut entry = lock_entry(&mut tx, tenant_id, id).await?;
        entry.ensure_draft()?;

        if let Some(lines) = &patch.lines {
            validate_lines(lines)?;
            ensure_accounts_exist(&mut tx, tenant_id, lines).await?;
        }

        entry.apply_header_patch(&patch, ctx.user_id(), Utc::now())?;
        if let Some(lines) = &patch.lines {
            entry.replace_lines(lines)?;
            tx.replace_entry_lines(tenant_id, id, &entry.lines).await?;
        }
        tx.update_entry(&entry).await?;
        tx.commit().await?;

        info!("journal entry updated");
        Ok(entry)
    }

    pub async fn get_journal_entry(&self, ctx: &RequestContext, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin().await?;
        tx.get_entry(ctx.tenant_id(), id)
            .await?
            .ok_or(LedgerError::EntryNotFound(id))
    }

    /// Entries matching `filter`, newest transaction date first.
    pub async fn list_journal_entries(
        &self,
        ctx: &RequestContext,
        filter: JournalEntryFilter,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let mut tx = self.store.begin().await?;
        tx.list_entries(ctx.tenant_id(), &filter).await
    }

    /// DRAFT → POSTED, applying every line to its account.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id(), entry_id = %id), err)]
    pub async fn post_journal_entry(&self, ctx: &RequestContext, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        let tenant_id = ctx.tenant_id();
        let mut tx = self.store.begin().await?;
        let mut entry = lock_entry(&mut tx, tenant_id, id).await?;
        entry.post(ctx.user_id(), Utc::now())?;

        // Stored lines were validated on write; refuse to post if that no longer holds.
        let totals = entry.totals()?;
        if entry.lines.len() < MIN_LINES {
            return Err(LedgerError::InsufficientLines { found: entry.lines.len() });
        }
        if totals.debits != totals.credits {
            return Err(LedgerError::UnbalancedEntry {
                debits: totals.debits,
                credits: totals.credits,
            });
        }

        for line in entry.lines_in_lock_order() {
            AccountDirectory::<S>::apply_mutation(&mut tx, tenant_id, line.account_id, line.debit, line.credit).await?;
        }
        tx.update_entry(&entry).await?;
        tx.commit().await?;

        info!(entry_number = %entry.entry_number, amount = %totals.debits, "journal entry posted");
        Ok(entry)
    }

    /// POSTED or DRAFT → VOIDED. A posted entry's balance effects are reversed.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id(), entry_id = %id), err)]
    pub async fn void_journal_entry(&self, ctx: &RequestContext, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        let tenant_id = ctx.tenant_id();
        let mut tx = self.store.begin().await?;
        let mut entry = lock_entry(&mut tx, tenant_id, id).await?;
        let effect = entry.void(ctx.user_id(), Utc::now())?;

        if effect == VoidEffect::ReverseBalances {
            for line in entry.lines_in_lock_order() {
                AccountDirectory::<S>::reverse_mutation(&mut tx, tenant_id, line.account_id, line.debit, line.credit)
                    .await?;
            }
        }
        tx.update_entry(&entry).await?;
        tx.commit().await?;

        info!(entry_number = %entry.entry_number, ?effect, "journal entry voided");
        Ok(entry)
    }

    /// Soft-delete a DRAFT or VOIDED entry.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id(), entry_id = %id), err)]
    pub async fn delete_journal_entry(&self, ctx: &RequestContext, id: JournalEntryId) -> LedgerResult<()> {
        let tenant_id = ctx.tenant_id();
        let mut tx = self.store.begin().await?;
        let mut entry = lock_entry(&mut tx, tenant_id, id).await?;
        entry.mark_deleted(ctx.user_id(), Utc::now())?;
        tx.update_entry(&entry).await?;
        tx.commit().await?;

        info!("journal entry deleted");
        Ok(())
    }

    pub async fn get_journal_entry_stats(&self, ctx: &RequestContext) -> LedgerResult<JournalStats> {
        let mut tx = self.store.begin().await?;
        tx.entry_stats(ctx.tenant_id()).await
    }
}

async fn lock_entry<T: LedgerTx>(tx: &mut T, tenant_id: TenantId, id: JournalEntryId) -> LedgerResult<JournalEntry> {
    tx.get_entry_for_update(tenant_id, id)
        .await?
        .ok_or(LedgerError::EntryNotFound(id))
}

async fn ensure_accounts_exist<T: LedgerTx>(tx: &mut T, tenant_id: TenantId, lines: &[LineInput]) -> LedgerResult<()> {
    for account_id in referenced_accounts(lines) {
        if tx.get_account_for_share(tenant_id, account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
    }
    Ok(())
}
