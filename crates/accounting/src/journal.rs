//! Journal entries: balanced line sets and their DRAFT → POSTED → VOIDED
//! lifecycle.
//!
//! Pure domain logic only. Balance effects are applied by the caller through
//! the account directory; this module only decides *whether* they apply.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerkit_core::{AccountId, JournalEntryId, JournalLineId, TenantId, UserId};

use crate::error::{LedgerError, LedgerResult};

/// Minimum number of lines in a journal entry.
pub const MIN_LINES: usize = 2;

/// Journal entry lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalStatus {
    Draft,
    Posted,
    Voided,
}

impl JournalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JournalStatus::Draft => "DRAFT",
            JournalStatus::Posted => "POSTED",
            JournalStatus::Voided => "VOIDED",
        }
    }
}

impl fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JournalStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::account::normalize_enum_input(s).as_str() {
            "DRAFT" => Ok(JournalStatus::Draft),
            "POSTED" => Ok(JournalStatus::Posted),
            "VOIDED" => Ok(JournalStatus::Voided),
            _ => Err(LedgerError::invalid_enum("journal status", s)),
        }
    }
}

/// Requested line of a journal entry (before persistence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub account_id: AccountId,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: Option<String>,
    pub reference: Option<String>,
}

impl LineInput {
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
            reference: None,
        }
    }

    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
            description: None,
            reference: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Persisted journal entry line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub id: JournalLineId,
    pub entry_id: JournalEntryId,
    pub account_id: AccountId,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: Option<String>,
    pub reference: Option<String>,
    /// Display order within the entry (0-based).
    pub position: u32,
}

impl JournalEntryLine {
    /// Materialize validated inputs as lines of `entry_id`, keeping input order.
    pub fn from_inputs(entry_id: JournalEntryId, inputs: &[LineInput]) -> Vec<JournalEntryLine> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, l)| JournalEntryLine {
                id: JournalLineId::new(),
                entry_id,
                account_id: l.account_id,
                debit: l.debit,
                credit: l.credit,
                description: l.description.clone(),
                reference: l.reference.clone(),
                position: i as u32,
            })
            .collect()
    }
}

/// Request to create a journal entry (always created as DRAFT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub reference: Option<String>,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub lines: Vec<LineInput>,
}

/// Partial update of a DRAFT entry.
///
/// `None` leaves a field unchanged; `Some(None)` clears a nullable field.
/// `lines`, when present, replaces the whole line set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryPatch {
    pub reference: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub transaction_date: Option<NaiveDate>,
    pub lines: Option<Vec<LineInput>>,
}

/// Debit / credit totals of a line set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub debits: Decimal,
    pub credits: Decimal,
}

impl LineTotals {
    /// Add one line's amounts; fails instead of leaving the decimal range.
    pub fn checked_add(self, debit: Decimal, credit: Decimal) -> LedgerResult<Self> {
        Ok(Self {
            debits: self
                .debits
                .checked_add(debit)
                .ok_or(LedgerError::AmountOverflow("debit total"))?,
            credits: self
                .credits
                .checked_add(credit)
                .ok_or(LedgerError::AmountOverflow("credit total"))?,
        })
    }
}

/// Check the structural invariants of a line set:
///
/// 1. at least [`MIN_LINES`] lines;
/// 2. each line carries exactly one positive side;
/// 3. debits equal credits exactly.
///
/// Totals that leave the decimal range fail with
/// [`LedgerError::AmountOverflow`].
///
/// Account existence is checked against the store by the caller.
pub fn validate_lines(lines: &[LineInput]) -> LedgerResult<LineTotals> {
    if lines.len() < MIN_LINES {
        return Err(LedgerError::InsufficientLines { found: lines.len() });
    }

    let mut totals = LineTotals::default();
    for (idx, line) in lines.iter().enumerate() {
        let n = idx + 1;
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            return Err(LedgerError::invalid_line(n, "amounts must not be negative"));
        }
        match (line.debit > Decimal::ZERO, line.credit > Decimal::ZERO) {
            (true, true) => {
                return Err(LedgerError::invalid_line(n, "debit and credit cannot both be set"));
            }
            (false, false) => {
                return Err(LedgerError::invalid_line(n, "either debit or credit must be positive"));
            }
            _ => {}
        }
        totals = totals.checked_add(line.debit, line.credit)?;
    }

    if totals.debits != totals.credits {
        return Err(LedgerError::UnbalancedEntry {
            debits: totals.debits,
            credits: totals.credits,
        });
    }

    Ok(totals)
}

/// Distinct accounts referenced by a line set.
pub fn referenced_accounts(lines: &[LineInput]) -> BTreeSet<AccountId> {
    lines.iter().map(|l| l.account_id).collect()
}

/// What a void transition does to account balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoidEffect {
    /// The entry was posted; every line's mutation must be reversed once.
    ReverseBalances,
    /// The entry was a draft; nothing was ever applied.
    NoBalanceEffect,
}

/// One balanced accounting transaction with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub tenant_id: TenantId,
    /// Tenant-scoped human readable number, e.g. `JE-000042`.
    pub entry_number: String,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub status: JournalStatus,
    pub lines: Vec<JournalEntryLine>,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub is_deleted: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Build a fresh DRAFT entry from a validated request.
    pub fn draft(
        tenant_id: TenantId,
        entry_number: String,
        request: &NewJournalEntry,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        let id = JournalEntryId::new();
        Self {
            id,
            tenant_id,
            entry_number,
            reference: request.reference.clone(),
            description: request.description.clone(),
            transaction_date: request.transaction_date,
            status: JournalStatus::Draft,
            lines: JournalEntryLine::from_inputs(id, &request.lines),
            created_by,
            updated_by: created_by,
            is_deleted: false,
            posted_at: None,
            voided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn totals(&self) -> LedgerResult<LineTotals> {
        self.lines
            .iter()
            .try_fold(LineTotals::default(), |t, l| t.checked_add(l.debit, l.credit))
    }

    /// Lines sorted by account id, then position.
    ///
    /// Balance mutations for post and void run in this order, so two entries
    /// over the same accounts lock their rows in the same sequence.
    pub fn lines_in_lock_order(&self) -> Vec<&JournalEntryLine> {
        let mut lines: Vec<&JournalEntryLine> = self.lines.iter().collect();
        lines.sort_by_key(|l| (l.account_id, l.position));
        lines
    }

    /// Invariant: only DRAFT entries may change.
    pub fn ensure_draft(&self) -> LedgerResult<()> {
        if self.status != JournalStatus::Draft {
            return Err(LedgerError::NotDraft { status: self.status });
        }
        Ok(())
    }

    /// Apply header fields of a patch. Lines are replaced separately, after
    /// they have been validated.
    pub fn apply_header_patch(&mut self, patch: &JournalEntryPatch, by: UserId, now: DateTime<Utc>) -> LedgerResult<()> {
        self.ensure_draft()?;
        if let Some(reference) = &patch.reference {
            self.reference = reference.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(date) = patch.transaction_date {
            self.transaction_date = date;
        }
        self.updated_by = by;
        self.updated_at = now;
        Ok(())
    }

    /// Replace the whole line set of a DRAFT entry.
    pub fn replace_lines(&mut self, inputs: &[LineInput]) -> LedgerResult<()> {
        self.ensure_draft()?;
        self.lines = JournalEntryLine::from_inputs(self.id, inputs);
        Ok(())
    }

    /// DRAFT → POSTED.
    pub fn post(&mut self, by: UserId, now: DateTime<Utc>) -> LedgerResult<()> {
        self.ensure_draft()?;
        self.status = JournalStatus::Posted;
        self.posted_at = Some(now);
        self.updated_by = by;
        self.updated_at = now;
        Ok(())
    }

    /// POSTED → VOIDED or DRAFT → VOIDED.
    ///
    /// The returned effect tells the caller whether balances must be reversed.
    pub fn void(&mut self, by: UserId, now: DateTime<Utc>) -> LedgerResult<VoidEffect> {
        let effect = match self.status {
            JournalStatus::Voided => return Err(LedgerError::AlreadyVoided),
            JournalStatus::Posted => VoidEffect::ReverseBalances,
            JournalStatus::Draft => VoidEffect::NoBalanceEffect,
        };
        self.status = JournalStatus::Voided;
        self.voided_at = Some(now);
        self.updated_by = by;
        self.updated_at = now;
        Ok(effect)
    }

    /// Soft-delete a DRAFT or VOIDED entry.
    pub fn mark_deleted(&mut self, by: UserId, now: DateTime<Utc>) -> LedgerResult<()> {
        if self.status == JournalStatus::Posted {
            return Err(LedgerError::CannotDeletePosted);
        }
        self.is_deleted = true;
        self.updated_by = by;
        self.updated_at = now;
        Ok(())
    }
}

/// Filters for listing journal entries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryFilter {
    pub status: Option<JournalStatus>,
    /// Inclusive lower bound on the transaction date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the transaction date.
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive substring of the entry reference.
    pub reference: Option<String>,
    /// Entries with at least one line on this account.
    pub account_id: Option<AccountId>,
}

impl JournalEntryFilter {
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        if self.status.is_some_and(|s| s != entry.status) {
            return false;
        }
        if self.date_from.is_some_and(|d| entry.transaction_date < d) {
            return false;
        }
        if self.date_to.is_some_and(|d| entry.transaction_date > d) {
            return false;
        }
        if let Some(needle) = &self.reference {
            let needle = needle.to_lowercase();
            let hit = entry
                .reference
                .as_deref()
                .is_some_and(|r| r.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(account) = self.account_id {
            if !entry.lines.iter().any(|l| l.account_id == account) {
                return false;
            }
        }
        true
    }
}

/// Per-tenant journal statistics.
///
/// Debit/credit totals only count POSTED entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalStats {
    pub total: u64,
    pub draft: u64,
    pub posted: u64,
    pub voided: u64,
    pub posted_debits: Decimal,
    pub posted_credits: Decimal,
}

impl JournalStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> LedgerResult<Self> {
        let mut stats = JournalStats::default();
        for e in entries {
            stats.total += 1;
            match e.status {
                JournalStatus::Draft => stats.draft += 1,
                JournalStatus::Voided => stats.voided += 1,
                JournalStatus::Posted => {
                    stats.posted += 1;
                    let t = e.totals()?;
                    stats.posted_debits = stats
                        .posted_debits
                        .checked_add(t.debits)
                        .ok_or(LedgerError::AmountOverflow("posted debits"))?;
                    stats.posted_credits = stats
                        .posted_credits
                        .checked_add(t.credits)
                        .ok_or(LedgerError::AmountOverflow("posted credits"))?;
                }
            }
        }
        Ok(stats)
    }
}
