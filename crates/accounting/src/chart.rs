//! Starter chart of accounts and account-code allocation.

use crate::account::{AccountCategory, AccountType, NewAccount};

/// Width of each type's code block (1000-1999, 2000-2999, ...).
const CODE_BLOCK_SIZE: u32 = 1000;

/// Gap between generated codes, leaving room for manual inserts.
pub const CODE_STEP: u32 = 10;

/// One account of the starter chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartTemplate {
    pub code: &'static str,
    pub name: &'static str,
    pub account_type: AccountType,
    pub category: AccountCategory,
    pub parent_code: Option<&'static str>,
}

impl ChartTemplate {
    pub fn to_new_account(&self) -> NewAccount {
        NewAccount::new(self.code, self.name, self.account_type, self.category)
    }
}

macro_rules! tpl {
    ($code:literal, $name:literal, $t:ident, $c:ident) => {
        ChartTemplate {
            code: $code,
            name: $name,
            account_type: AccountType::$t,
            category: AccountCategory::$c,
            parent_code: None,
        }
    };
    ($code:literal, $name:literal, $t:ident, $c:ident, $parent:literal) => {
        ChartTemplate {
            code: $code,
            name: $name,
            account_type: AccountType::$t,
            category: AccountCategory::$c,
            parent_code: Some($parent),
        }
    };
}

/// Default chart for a new tenant. Parents always precede their children.
pub const DEFAULT_CHART: &[ChartTemplate] = &[
    tpl!("1000", "Assets", Asset, CurrentAssets),
    tpl!("1010", "Cash", Asset, CurrentAssets, "1000"),
    tpl!("1020", "Bank Accounts", Asset, CurrentAssets, "1000"),
    tpl!("1100", "Accounts Receivable", Asset, CurrentAssets, "1000"),
    tpl!("1200", "Inventory", Asset, CurrentAssets, "1000"),
    tpl!("1500", "Property and Equipment", Asset, FixedAssets, "1000"),
    tpl!("2000", "Liabilities", Liability, CurrentLiabilities),
    tpl!("2100", "Accounts Payable", Liability, CurrentLiabilities, "2000"),
    tpl!("2200", "Sales Tax Payable", Liability, CurrentLiabilities, "2000"),
    tpl!("2500", "Long-term Loans", Liability, LongTermLiabilities, "2000"),
    tpl!("3000", "Equity", Equity, OwnersEquity),
    tpl!("3100", "Owner's Capital", Equity, OwnersEquity, "3000"),
    tpl!("3200", "Retained Earnings", Equity, RetainedEarnings, "3000"),
    tpl!("4000", "Revenue", Revenue, OperatingRevenue),
    tpl!("4100", "Sales", Revenue, OperatingRevenue, "4000"),
    tpl!("4900", "Other Income", Revenue, OtherRevenue, "4000"),
    tpl!("5000", "Expenses", Expense, OperatingExpenses),
    tpl!("5100", "Cost of Goods Sold", Expense, CostOfGoodsSold, "5000"),
    tpl!("5200", "Salaries and Wages", Expense, OperatingExpenses, "5000"),
    tpl!("5300", "Rent", Expense, OperatingExpenses, "5000"),
    tpl!("5900", "Other Expenses", Expense, OtherExpenses, "5000"),
];

/// Next free code in `account_type`'s block, given the tenant's existing codes.
///
/// Non-numeric codes and codes outside the block are ignored. Returns `None`
/// once the block is exhausted.
pub fn next_account_code<'a>(
    account_type: AccountType,
    existing: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let start = account_type.code_block_start();
    let end = start + CODE_BLOCK_SIZE - 1;

    let highest = existing
        .into_iter()
        .filter_map(|c| c.trim().parse::<u32>().ok())
        .filter(|c| (start..=end).contains(c))
        .max();

    let next = match highest {
        None => start,
        Some(h) => (h / CODE_STEP + 1) * CODE_STEP,
    };

    (next <= end).then(|| next.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_chart_is_consistent() {
        let mut seen = HashSet::new();
        for t in DEFAULT_CHART {
            assert!(t.account_type.categories().contains(&t.category), "{}", t.code);
            if let Some(parent) = t.parent_code {
                assert!(seen.contains(parent), "parent of {} must come first", t.code);
            }
            assert!(seen.insert(t.code), "duplicate code {}", t.code);
        }
    }

    #[test]
    fn first_code_is_block_start() {
        assert_eq!(next_account_code(AccountType::Revenue, []), Some("4000".into()));
    }

    #[test]
    fn steps_past_highest_code_in_block() {
        let codes = ["1000", "1010", "1234", "2000", "CASH-1"];
        assert_eq!(next_account_code(AccountType::Asset, codes), Some("1240".into()));
        assert_eq!(next_account_code(AccountType::Liability, codes), Some("2010".into()));
    }

    #[test]
    fn exhausted_block_yields_none() {
        assert_eq!(next_account_code(AccountType::Expense, ["5995"]), None);
    }
}
