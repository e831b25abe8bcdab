//! Ledger error taxonomy.

use rust_decimal::Decimal;
use thiserror::Error;

use ledgerkit_core::{AccountId, JournalEntryId};

use crate::journal::JournalStatus;

/// Result type used across the ledger crates.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Coarse classification of a [`LedgerError`], for callers that branch on
/// behavior (retry, show a form error, offer "void" instead of "edit", ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-correctable input problem, reported before any write.
    Validation,
    /// A referenced record does not exist in the caller's tenant.
    Reference,
    /// A lifecycle transition was attempted from an illegal state.
    State,
    /// The chart-of-accounts structure would be broken.
    Integrity,
    /// Store-level failure; the whole operation may be retried.
    Transient,
}

/// Ledger-level error.
///
/// Every variant aborts the enclosing transaction. No variant is ever
/// downgraded to a warning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("journal entry is unbalanced: debits ({debits}) != credits ({credits})")]
    UnbalancedEntry { debits: Decimal, credits: Decimal },

    #[error("journal entry needs at least 2 lines, found {found}")]
    InsufficientLines { found: usize },

    #[error("line {line}: {reason}")]
    InvalidLineAmounts { line: usize, reason: String },

    #[error("invalid {field}: '{value}'")]
    InvalidEnum { field: &'static str, value: String },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A sum of amounts left the representable decimal range.
    #[error("amount overflow in {0}")]
    AmountOverflow(&'static str),

    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Parent account missing, owned by another tenant, or soft-deleted.
    #[error("parent account not found: {0}")]
    InvalidParent(AccountId),

    #[error("journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    #[error("journal entry is {status}, expected DRAFT")]
    NotDraft { status: JournalStatus },

    #[error("journal entry is already voided")]
    AlreadyVoided,

    #[error("posted journal entries cannot be deleted; void it first")]
    CannotDeletePosted,

    #[error("account code '{0}' already exists")]
    DuplicateCode(String),

    #[error("setting parent {parent} on account {account} would create a cycle")]
    CircularReference { account: AccountId, parent: AccountId },

    #[error("account {0} has child accounts")]
    HasChildren(AccountId),

    #[error("account {account} is referenced by {lines} journal entry line(s)")]
    HasLedgerReferences { account: AccountId, lines: u64 },

    /// Lost race on a uniqueness constraint or serialization failure.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Connection loss, timeout, or other storage failure.
    #[error("store error: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn invalid_line(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidLineAmounts {
            line,
            reason: reason.into(),
        }
    }

    pub fn invalid_enum(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidEnum {
            field,
            value: value.into(),
        }
    }

    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::UnbalancedEntry { .. }
            | LedgerError::InsufficientLines { .. }
            | LedgerError::InvalidLineAmounts { .. }
            | LedgerError::InvalidEnum { .. }
            | LedgerError::InvalidField { .. }
            | LedgerError::AmountOverflow(_) => ErrorKind::Validation,
            LedgerError::AccountNotFound(_)
            | LedgerError::InvalidParent(_)
            | LedgerError::EntryNotFound(_) => ErrorKind::Reference,
            LedgerError::NotDraft { .. }
            | LedgerError::AlreadyVoided
            | LedgerError::CannotDeletePosted => ErrorKind::State,
            LedgerError::DuplicateCode(_)
            | LedgerError::CircularReference { .. }
            | LedgerError::HasChildren(_)
            | LedgerError::HasLedgerReferences { .. } => ErrorKind::Integrity,
            LedgerError::Conflict(_) | LedgerError::Store(_) => ErrorKind::Transient,
        }
    }

    /// Whether re-running the whole (atomic) operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
