//! Process-wide tracing setup shared by ledgerkit binaries.

/// Tracing configuration (filters, formatting).
pub mod tracing;

pub use self::tracing::{init, init_with_default};
