//! `ledgerkit-core`: shared building blocks for the ledger crates.
//!
//! Identifiers and request context only (no infrastructure concerns).

pub mod context;
pub mod id;

pub use context::RequestContext;
pub use id::{AccountId, IdParseError, JournalEntryId, JournalLineId, TenantId, UserId};
