//! Tenant-scoped journal entry numbers (`JE-000001`, `JE-000002`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numbering pattern: a fixed prefix followed by a zero-padded counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryNumbering {
    prefix: String,
    width: usize,
}

impl Default for EntryNumbering {
    fn default() -> Self {
        Self::new("JE-", 6)
    }
}

impl EntryNumbering {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width: width.max(1),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn format(&self, n: u64) -> String {
        format!("{}{:0width$}", self.prefix, n, width = self.width)
    }

    /// Counter value of `number`, if it follows this pattern.
    pub fn parse(&self, number: &str) -> Option<u64> {
        let digits = number.strip_prefix(&self.prefix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Next number after the tenant's highest existing one.
    ///
    /// Stores only report numbers of the `prefix` + digits shape. When that
    /// number still cannot be incremented (more digits than a `u64` holds),
    /// a timestamp-derived counter keeps numbering moving forward instead of
    /// failing.
    pub fn next_after(&self, highest: Option<&str>, now: DateTime<Utc>) -> String {
        match highest {
            None => self.format(1),
            Some(last) => match self.parse(last).and_then(|n| n.checked_add(1)) {
                Some(next) => self.format(next),
                None => self.format(now.timestamp_millis().unsigned_abs()),
            },
        }
    }
}
