//! Environment-driven configuration.

use ledgerkit_accounting::EntryNumbering;
use thiserror::Error;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS: &str = "LEDGER_DB_MAX_CONNECTIONS";
pub const ENTRY_PREFIX: &str = "LEDGER_ENTRY_PREFIX";
pub const ENTRY_PAD: &str = "LEDGER_ENTRY_PAD";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub numbering: EntryNumbering,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            numbering: EntryNumbering::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let max_connections = match get(MAX_CONNECTIONS) {
            None => defaults.max_connections,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: MAX_CONNECTIONS,
                        value: raw,
                        reason: "expected a positive integer",
                    });
                }
            },
        };

        let width = match get(ENTRY_PAD) {
            None => defaults.numbering.width(),
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if (1..=18).contains(&n) => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENTRY_PAD,
                        value: raw,
                        reason: "expected an integer between 1 and 18",
                    });
                }
            },
        };

        // The prefix is not trimmed: trailing separators are meaningful.
        let prefix = lookup(ENTRY_PREFIX)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| defaults.numbering.prefix().to_string());

        Ok(Self {
            database_url: get(DATABASE_URL),
            max_connections,
            numbering: EntryNumbering::new(prefix, width),
        })
    }
}
