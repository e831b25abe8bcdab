//! Account directory: the chart-of-accounts service.
//!
//! Owns account CRUD, hierarchy rules, and the only write path to account
//! balances. The ledger engine reaches balances exclusively through
//! [`AccountDirectory::apply_mutation`] and [`AccountDirectory::reverse_mutation`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use ledgerkit_accounting::{
    build_account_tree, ensure_no_cycle, next_account_code, required_text, rolled_up_balance, rolled_up_balances,
    Account, AccountNode, AccountPatch, AccountType, LedgerError, LedgerResult, NewAccount, DEFAULT_CHART,
};
use ledgerkit_core::{AccountId, RequestContext, TenantId};

use crate::store::{LedgerStore, LedgerTx};

pub struct AccountDirectory<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for AccountDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> AccountDirectory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id(), code = %request.code), err)]
    pub async fn create_account(&self, ctx: &RequestContext, request: NewAccount) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        let account = Self::create_in_tx(&mut tx, ctx, &request).await?;
        tx.commit().await?;

        info!(account_id = %account.id, account_type = %account.account_type, "account created");
        Ok(account)
    }

    #[instrument(skip(self, ctx, patch), fields(tenant_id = %ctx.tenant_id(), account_id = %id), err)]
    pub async fn update_account(&self, ctx: &RequestContext, id: AccountId, patch: AccountPatch) -> LedgerResult<Account> {
        let tenant_id = ctx.tenant_id();
        let mut tx = self.store.begin().await?;
        let mut account = tx
            .get_account_for_update(tenant_id, id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;

        if let Some(raw) = &patch.code {
            let code = required_text("code", raw)?;
            if code != account.code {
                ensure_code_free(&mut tx, tenant_id, &code, Some(id)).await?;
                account.code = code;
            }
        }
        if let Some(raw) = &patch.name {
            account.name = required_text("name", raw)?;
        }

        let (account_type, category) = patch.resolve_classification(&account)?;
        if account_type != account.account_type {
            // The stored balance was accumulated under the old sign convention.
            let lines = tx.count_line_references(tenant_id, id).await?;
            if lines > 0 {
                return Err(LedgerError::HasLedgerReferences { account: id, lines });
            }
        }
        account.account_type = account_type;
        account.category = category;

        if let Some(description) = &patch.description {
            account.description = optional_text(description.as_deref());
        }

        if let Some(parent) = patch.parent_id {
            if let Some(parent_id) = parent {
                if parent_id == id {
                    return Err(LedgerError::CircularReference { account: id, parent: id });
                }
                tx.get_account_for_share(tenant_id, parent_id)
                    .await?
                    .ok_or(LedgerError::InvalidParent(parent_id))?;

                let parents: HashMap<AccountId, Option<AccountId>> = tx
                    .list_accounts(tenant_id)
                    .await?
                    .into_iter()
                    .map(|a| (a.id, a.parent_id))
                    .collect();
                ensure_no_cycle(id, parent_id, |a| parents.get(&a).copied().flatten())?;
            }
            account.parent_id = parent;
        }

        if let Some(active) = patch.is_active {
            account.is_active = active;
        }

        account.updated_by = ctx.user_id();
        account.updated_at = Utc::now();
        tx.update_account(&account).await?;
        tx.commit().await?;

        info!("account updated");
        Ok(account)
    }

    pub async fn get_account(&self, ctx: &RequestContext, id: AccountId) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;
        tx.get_account(ctx.tenant_id(), id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// All live accounts of the tenant, sorted by (code, name).
    pub async fn list_accounts(&self, ctx: &RequestContext) -> LedgerResult<Vec<Account>> {
        let mut tx = self.store.begin().await?;
        let mut accounts = tx.list_accounts(ctx.tenant_id()).await?;
        accounts.sort_by(|a, b| (a.code.as_str(), a.name.as_str()).cmp(&(b.code.as_str(), b.name.as_str())));
        Ok(accounts)
    }

    /// Active accounts as a forest.
    pub async fn get_account_tree(&self, ctx: &RequestContext) -> LedgerResult<Vec<AccountNode>> {
        let accounts = self.list_accounts(ctx).await?;
        Ok(build_account_tree(accounts))
    }

    /// Own balance plus every strict descendant's balance.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id(), account_id = %id), err)]
    pub async fn get_account_balance(&self, ctx: &RequestContext, id: AccountId) -> LedgerResult<Decimal> {
        let accounts = self.list_accounts(ctx).await?;
        rolled_up_balance(&accounts, id)
    }

    /// Rolled-up balance of every live account.
    pub async fn get_account_balances(&self, ctx: &RequestContext) -> LedgerResult<HashMap<AccountId, Decimal>> {
        let accounts = self.list_accounts(ctx).await?;
        rolled_up_balances(&accounts)
    }

    /// Apply a (debit, credit) pair to one account in its own transaction.
    ///
    /// `mutate_balance(id, c, d)` exactly undoes `mutate_balance(id, d, c)`.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id(), account_id = %id), err)]
    pub async fn mutate_balance(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        debit: Decimal,
        credit: Decimal,
    ) -> LedgerResult<Decimal> {
        if debit < Decimal::ZERO || credit < Decimal::ZERO {
            return Err(LedgerError::invalid_field("amount", "must not be negative"));
        }
        let mut tx = self.store.begin().await?;
        let balance = Self::apply_mutation(&mut tx, ctx.tenant_id(), id, debit, credit).await?;
        tx.commit().await?;
        Ok(balance)
    }

    /// In-transaction balance mutation; returns the new balance.
    ///
    /// Locks the account row, so concurrent mutations of the same account
    /// serialize instead of losing updates.
    pub async fn apply_mutation(
        tx: &mut S::Tx,
        tenant_id: TenantId,
        id: AccountId,
        debit: Decimal,
        credit: Decimal,
    ) -> LedgerResult<Decimal> {
        let account = tx
            .get_account_for_update(tenant_id, id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        let delta = account.account_type.balance_delta(debit, credit);
        // The row is locked, so the balance read above is the one being changed.
        if account.balance.checked_add(delta).is_none() {
            return Err(LedgerError::AmountOverflow("account balance"));
        }
        let balance = tx.add_to_balance(tenant_id, id, delta).await?;

        debug!(account_id = %id, %delta, %balance, "balance mutated");
        Ok(balance)
    }

    /// Exact inverse of [`apply_mutation`](Self::apply_mutation) with the same arguments.
    pub async fn reverse_mutation(
        tx: &mut S::Tx,
        tenant_id: TenantId,
        id: AccountId,
        debit: Decimal,
        credit: Decimal,
    ) -> LedgerResult<Decimal> {
        Self::apply_mutation(tx, tenant_id, id, credit, debit).await
    }

    /// Soft-delete a leaf account that no journal line references.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id(), account_id = %id), err)]
    pub async fn delete_account(&self, ctx: &RequestContext, id: AccountId) -> LedgerResult<()> {
        let tenant_id = ctx.tenant_id();
        let mut tx = self.store.begin().await?;
        let mut account = tx
            .get_account_for_update(tenant_id, id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;

        if tx.count_children(tenant_id, id).await? > 0 {
            return Err(LedgerError::HasChildren(id));
        }
        let lines = tx.count_line_references(tenant_id, id).await?;
        if lines > 0 {
            return Err(LedgerError::HasLedgerReferences { account: id, lines });
        }

        account.is_deleted = true;
        account.updated_by = ctx.user_id();
        account.updated_at = Utc::now();
        tx.update_account(&account).await?;
        tx.commit().await?;

        info!("account deleted");
        Ok(())
    }

    /// Next free code in the numeric block of `account_type`.
    pub async fn next_account_code(&self, ctx: &RequestContext, account_type: AccountType) -> LedgerResult<String> {
        let accounts = self.list_accounts(ctx).await?;
        next_account_code(account_type, accounts.iter().map(|a| a.code.as_str())).ok_or_else(|| {
            LedgerError::invalid_field("code", format!("no free code left in the {account_type} range"))
        })
    }

    /// Seed the starter chart for a tenant without accounts.
    ///
    /// A tenant that already has accounts is left alone and its current
    /// accounts are returned.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()), err)]
    pub async fn bootstrap_default_chart(&self, ctx: &RequestContext) -> LedgerResult<Vec<Account>> {
        let tenant_id = ctx.tenant_id();
        let mut tx = self.store.begin().await?;

        let existing = tx.list_accounts(tenant_id).await?;
        if !existing.is_empty() {
            debug!(accounts = existing.len(), "tenant already has a chart");
            return Ok(existing);
        }

        let mut by_code: HashMap<&'static str, AccountId> = HashMap::new();
        let mut created = Vec::with_capacity(DEFAULT_CHART.len());
        for template in DEFAULT_CHART {
            let mut request = template.to_new_account();
            if let Some(parent_code) = template.parent_code {
                let parent_id = by_code
                    .get(parent_code)
                    .copied()
                    .ok_or_else(|| LedgerError::store(format!("chart template parent {parent_code} missing")))?;
                request = request.with_parent(parent_id);
            }
            let account = Self::create_in_tx(&mut tx, ctx, &request).await?;
            by_code.insert(template.code, account.id);
            created.push(account);
        }
        tx.commit().await?;

        info!(accounts = created.len(), "default chart created");
        Ok(created)
    }

    async fn create_in_tx(tx: &mut S::Tx, ctx: &RequestContext, request: &NewAccount) -> LedgerResult<Account> {
        let tenant_id = ctx.tenant_id();
        let (code, name, account_type, category) = request.validate()?;

        ensure_code_free(tx, tenant_id, &code, None).await?;
        if let Some(parent_id) = request.parent_id {
            tx.get_account_for_share(tenant_id, parent_id)
                .await?
                .ok_or(LedgerError::InvalidParent(parent_id))?;
        }

        let now = Utc::now();
        let account = Account {
            id: AccountId::new(),
            tenant_id,
            code,
            name,
            account_type,
            category,
            description: optional_text(request.description.as_deref()),
            parent_id: request.parent_id,
            balance: Decimal::ZERO,
            is_active: true,
            is_deleted: false,
            created_by: ctx.user_id(),
            updated_by: ctx.user_id(),
            created_at: now,
            updated_at: now,
        };
        tx.insert_account(&account).await?;
        Ok(account)
    }
}

async fn ensure_code_free<T: LedgerTx>(
    tx: &mut T,
    tenant_id: TenantId,
    code: &str,
    owner: Option<AccountId>,
) -> LedgerResult<()> {
    match tx.find_account_by_code(tenant_id, code).await? {
        Some(other) if Some(other.id) != owner => Err(LedgerError::DuplicateCode(code.to_string())),
        _ => Ok(()),
    }
}

fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
