#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use ledgerkit_accounting::{Account, AccountCategory, AccountType, LineInput, NewAccount, NewJournalEntry};
use ledgerkit_core::{AccountId, RequestContext, TenantId, UserId};
use ledgerkit_infra::{AccountDirectory, InMemoryLedgerStore, LedgerEngine};

pub struct Ledger {
    pub store: Arc<InMemoryLedgerStore>,
    pub directory: AccountDirectory<InMemoryLedgerStore>,
    pub engine: LedgerEngine<InMemoryLedgerStore>,
    pub ctx: RequestContext,
}

pub fn ledger() -> Ledger {
    let store = Arc::new(InMemoryLedgerStore::new());
    Ledger {
        directory: AccountDirectory::new(Arc::clone(&store)),
        engine: LedgerEngine::new(Arc::clone(&store)),
        store,
        ctx: RequestContext::new(TenantId::new(), UserId::new()),
    }
}

impl Ledger {
    /// Same store, different tenant.
    pub fn other_tenant(&self) -> RequestContext {
        RequestContext::new(TenantId::new(), UserId::new())
    }

    pub async fn account(&self, code: &str, name: &str, t: AccountType, c: AccountCategory) -> Account {
        self.directory
            .create_account(&self.ctx, NewAccount::new(code, name, t, c))
            .await
            .unwrap()
    }

    pub async fn cash(&self) -> Account {
        self.account("1010", "Cash", AccountType::Asset, AccountCategory::CurrentAssets).await
    }

    pub async fn sales(&self) -> Account {
        self.account("4100", "Sales", AccountType::Revenue, AccountCategory::OperatingRevenue).await
    }

    pub async fn balance(&self, id: AccountId) -> Decimal {
        self.directory.get_account(&self.ctx, id).await.unwrap().balance
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Debit `debit_account`, credit `credit_account`, same amount.
pub fn simple_entry(debit_account: AccountId, credit_account: AccountId, amount: Decimal) -> NewJournalEntry {
    NewJournalEntry {
        reference: None,
        description: None,
        transaction_date: date(2024, 1, 15),
        lines: vec![
            LineInput::debit(debit_account, amount),
            LineInput::credit(credit_account, amount),
        ],
    }
}
