//! Chart-of-accounts records, classification, and the balance sign convention.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerkit_core::{AccountId, TenantId, UserId};

use crate::error::{LedgerError, LedgerResult};

/// High-level account type (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Revenue => "REVENUE",
            AccountType::Expense => "EXPENSE",
        }
    }

    /// ASSET and EXPENSE accounts grow with debits; the rest grow with credits.
    pub fn is_debit_normal(self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Signed change to a stored balance for a (debit, credit) pair.
    ///
    /// This is the only place the sign convention lives. Swapping the
    /// arguments yields the exact inverse.
    pub fn balance_delta(self, debit: Decimal, credit: Decimal) -> Decimal {
        if self.is_debit_normal() {
            debit - credit
        } else {
            credit - debit
        }
    }

    /// Categories a caller may pick for this type.
    pub fn categories(self) -> &'static [AccountCategory] {
        use AccountCategory::*;
        match self {
            AccountType::Asset => &[CurrentAssets, FixedAssets, OtherAssets],
            AccountType::Liability => &[CurrentLiabilities, LongTermLiabilities],
            AccountType::Equity => &[OwnersEquity, RetainedEarnings],
            AccountType::Revenue => &[OperatingRevenue, OtherRevenue],
            AccountType::Expense => &[CostOfGoodsSold, OperatingExpenses, OtherExpenses],
        }
    }

    /// First code of the numeric block reserved for this type (1000, 2000, ...).
    pub fn code_block_start(self) -> u32 {
        match self {
            AccountType::Asset => 1000,
            AccountType::Liability => 2000,
            AccountType::Equity => 3000,
            AccountType::Revenue => 4000,
            AccountType::Expense => 5000,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_enum_input(s);
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| LedgerError::invalid_enum("account type", s))
    }
}

/// Sub-classification of an account within its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountCategory {
    CurrentAssets,
    FixedAssets,
    OtherAssets,
    CurrentLiabilities,
    LongTermLiabilities,
    OwnersEquity,
    RetainedEarnings,
    OperatingRevenue,
    OtherRevenue,
    CostOfGoodsSold,
    OperatingExpenses,
    OtherExpenses,
}

impl AccountCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountCategory::CurrentAssets => "CURRENT_ASSETS",
            AccountCategory::FixedAssets => "FIXED_ASSETS",
            AccountCategory::OtherAssets => "OTHER_ASSETS",
            AccountCategory::CurrentLiabilities => "CURRENT_LIABILITIES",
            AccountCategory::LongTermLiabilities => "LONG_TERM_LIABILITIES",
            AccountCategory::OwnersEquity => "OWNERS_EQUITY",
            AccountCategory::RetainedEarnings => "RETAINED_EARNINGS",
            AccountCategory::OperatingRevenue => "OPERATING_REVENUE",
            AccountCategory::OtherRevenue => "OTHER_REVENUE",
            AccountCategory::CostOfGoodsSold => "COST_OF_GOODS_SOLD",
            AccountCategory::OperatingExpenses => "OPERATING_EXPENSES",
            AccountCategory::OtherExpenses => "OTHER_EXPENSES",
        }
    }

    /// The type this category belongs to.
    pub fn account_type(self) -> AccountType {
        use AccountCategory::*;
        match self {
            CurrentAssets | FixedAssets | OtherAssets => AccountType::Asset,
            CurrentLiabilities | LongTermLiabilities => AccountType::Liability,
            OwnersEquity | RetainedEarnings => AccountType::Equity,
            OperatingRevenue | OtherRevenue => AccountType::Revenue,
            CostOfGoodsSold | OperatingExpenses | OtherExpenses => AccountType::Expense,
        }
    }
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountCategory {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_enum_input(s);
        AccountType::ALL
            .iter()
            .flat_map(|t| t.categories().iter().copied())
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| LedgerError::invalid_enum("account category", s))
    }
}

/// Trim, uppercase, and collapse runs of spaces / hyphens / underscores into `_`.
///
/// `" current-assets "` and `"Current Assets"` both become `CURRENT_ASSETS`.
pub fn normalize_enum_input(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(ch.to_uppercase());
    }
    out
}

/// Parse and cross-check a (type, category) pair from caller input.
pub fn classify(account_type: &str, category: &str) -> LedgerResult<(AccountType, AccountCategory)> {
    let t: AccountType = account_type.parse()?;
    let c: AccountCategory = category.parse()?;
    if !t.categories().contains(&c) {
        return Err(LedgerError::invalid_enum("account category", category));
    }
    Ok((t, c))
}

/// One node in a tenant's chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub category: AccountCategory,
    pub description: Option<String>,
    pub parent_id: Option<AccountId>,
    /// Running balance in the account's normal direction.
    pub balance: Decimal,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create an account.
///
/// `account_type` and `category` are raw caller text; they are normalized by
/// [`classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: String,
    pub category: String,
    pub description: Option<String>,
    pub parent_id: Option<AccountId>,
}

impl NewAccount {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        category: AccountCategory,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type: account_type.as_str().to_string(),
            category: category.as_str().to_string(),
            description: None,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate text fields and classification; does not touch the store.
    pub fn validate(&self) -> LedgerResult<(String, String, AccountType, AccountCategory)> {
        let code = required_text("code", &self.code)?;
        let name = required_text("name", &self.name)?;
        let (t, c) = classify(&self.account_type, &self.category)?;
        Ok((code, name, t, c))
    }
}

/// Partial account update.
///
/// `None` leaves a field unchanged. For nullable fields the outer `Option`
/// is presence and the inner one is the value: `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub account_type: Option<String>,
    pub category: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<AccountId>>,
    pub is_active: Option<bool>,
}

impl AccountPatch {
    /// Resolve the patched classification against the account's current one.
    ///
    /// Changing only the type keeps the current category, which must then be
    /// valid for the new type.
    pub fn resolve_classification(
        &self,
        current: &Account,
    ) -> LedgerResult<(AccountType, AccountCategory)> {
        let t = match &self.account_type {
            Some(raw) => raw.parse()?,
            None => current.account_type,
        };
        let c = match &self.category {
            Some(raw) => raw.parse()?,
            None => current.category,
        };
        if !t.categories().contains(&c) {
            let raw = self.category.clone().unwrap_or_else(|| c.as_str().to_string());
            return Err(LedgerError::invalid_enum("account category", raw));
        }
        Ok((t, c))
    }
}

/// Trim a required text field (code, name), rejecting blanks.
pub fn required_text(field: &'static str, raw: &str) -> LedgerResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::invalid_field(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn normalizes_case_and_separators() {
        assert_eq!(normalize_enum_input("  current assets "), "CURRENT_ASSETS");
        assert_eq!(normalize_enum_input("Long-Term  Liabilities"), "LONG_TERM_LIABILITIES");
        assert_eq!(normalize_enum_input("asset"), "ASSET");
    }

    #[test]
    fn classify_accepts_loose_input() {
        let (t, c) = classify(" revenue", "operating revenue").unwrap();
        assert_eq!(t, AccountType::Revenue);
        assert_eq!(c, AccountCategory::OperatingRevenue);
    }

    #[test]
    fn classify_rejects_unknown_type() {
        let err = classify("ASSETS", "CURRENT_ASSETS").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidEnum { field: "account type", .. }));
    }

    #[test]
    fn classify_rejects_category_of_another_type() {
        let err = classify("ASSET", "OPERATING_EXPENSES").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidEnum { field: "account category", .. }));
    }

    #[test]
    fn every_category_maps_back_to_its_type() {
        for t in AccountType::ALL {
            for c in t.categories() {
                assert_eq!(c.account_type(), t);
            }
        }
    }

    #[test]
    fn debit_normal_types_grow_with_debits() {
        assert_eq!(AccountType::Asset.balance_delta(dec!(100.00), dec!(0)), dec!(100.00));
        assert_eq!(AccountType::Expense.balance_delta(dec!(5), dec!(2)), dec!(3));
    }

    #[test]
    fn credit_normal_types_grow_with_credits() {
        assert_eq!(AccountType::Revenue.balance_delta(dec!(0), dec!(100.00)), dec!(100.00));
        assert_eq!(AccountType::Liability.balance_delta(dec!(10), dec!(0)), dec!(-10));
        assert_eq!(AccountType::Equity.balance_delta(dec!(1), dec!(4)), dec!(3));
    }

    #[test]
    fn new_account_validation_trims_text() {
        let req = NewAccount::new(" 1000 ", " Cash ", AccountType::Asset, AccountCategory::CurrentAssets);
        let (code, name, _, _) = req.validate().unwrap();
        assert_eq!(code, "1000");
        assert_eq!(name, "Cash");

        let blank = NewAccount::new("  ", "Cash", AccountType::Asset, AccountCategory::CurrentAssets);
        assert!(matches!(blank.validate(), Err(LedgerError::InvalidField { field: "code", .. })));
    }

    proptest! {
        /// Property: a mutation followed by its swapped counterpart is a no-op.
        #[test]
        fn swapped_delta_is_exact_inverse(
            debit_cents in 0i64..10_000_000_000i64,
            credit_cents in 0i64..10_000_000_000i64,
            start_cents in -10_000_000_000i64..10_000_000_000i64,
            type_idx in 0usize..5,
        ) {
            let t = AccountType::ALL[type_idx];
            let debit = Decimal::new(debit_cents, 2);
            let credit = Decimal::new(credit_cents, 2);
            let start = Decimal::new(start_cents, 2);

            let after = start + t.balance_delta(debit, credit);
            let restored = after + t.balance_delta(credit, debit);
            prop_assert_eq!(restored, start);
        }
    }
}
