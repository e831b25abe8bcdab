//! Chart-of-accounts hierarchy: forest assembly, cycle checks, and
//! descendant balance roll-ups.
//!
//! All walks are iterative and carry a visited set, so a corrupted parent
//! chain in storage can never loop forever or blow the stack.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerkit_core::AccountId;

use crate::account::Account;
use crate::error::{LedgerError, LedgerResult};

/// One account plus its (ordered) children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountNode {
    pub account: Account,
    pub children: Vec<AccountNode>,
}

impl AccountNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(AccountNode::subtree_size).sum::<usize>()
    }
}

/// Assemble the active-account forest.
///
/// Accounts are sorted by (code, name) first, so every children list comes
/// out in that order too. An account whose parent is not in the active set
/// is promoted to a root.
pub fn build_account_tree(accounts: impl IntoIterator<Item = Account>) -> Vec<AccountNode> {
    let mut accounts: Vec<Account> = accounts
        .into_iter()
        .filter(|a| a.is_active && !a.is_deleted)
        .collect();
    accounts.sort_by(|a, b| (a.code.as_str(), a.name.as_str()).cmp(&(b.code.as_str(), b.name.as_str())));

    let n = accounts.len();
    let index: HashMap<AccountId, usize> = accounts.iter().enumerate().map(|(i, a)| (a.id, i)).collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for (i, a) in accounts.iter().enumerate() {
        match a.parent_id.and_then(|p| index.get(&p)) {
            Some(&p) if p != i => children[p].push(i),
            _ => roots.push(i),
        }
    }

    let mut pending: Vec<Option<Account>> = accounts.into_iter().map(Some).collect();
    let mut built: Vec<Option<AccountNode>> = (0..n).map(|_| None).collect();
    let mut visited = vec![false; n];
    let mut forest = Vec::with_capacity(roots.len());

    for root in roots {
        // Post-order: children are finished before their parent is assembled.
        let mut stack = vec![(root, false)];
        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                let kids = children[idx].iter().filter_map(|&c| built[c].take()).collect();
                if let Some(account) = pending[idx].take() {
                    built[idx] = Some(AccountNode { account, children: kids });
                }
                continue;
            }
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.push((idx, true));
            for &c in children[idx].iter().rev() {
                stack.push((c, false));
            }
        }
        if let Some(node) = built[root].take() {
            forest.push(node);
        }
    }

    forest
}

/// Reject `proposed_parent` for `account` if it is the account itself or one
/// of its descendants.
///
/// Walks up from the proposed parent to a root using `parent_of`. A chain
/// that revisits a node without reaching `account` is already corrupt and is
/// rejected the same way.
pub fn ensure_no_cycle<F>(account: AccountId, proposed_parent: AccountId, parent_of: F) -> LedgerResult<()>
where
    F: Fn(AccountId) -> Option<AccountId>,
{
    let cycle = || LedgerError::CircularReference {
        account,
        parent: proposed_parent,
    };

    let mut visited = HashSet::new();
    let mut current = Some(proposed_parent);
    while let Some(id) = current {
        if id == account || !visited.insert(id) {
            return Err(cycle());
        }
        current = parent_of(id);
    }
    Ok(())
}

/// Parent → children adjacency for one tenant's accounts.
#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    children: HashMap<AccountId, Vec<AccountId>>,
}

impl ChildIndex {
    /// Build from a single scan of `(id, parent_id)` pairs.
    pub fn new<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut children: HashMap<AccountId, Vec<AccountId>> = HashMap::new();
        for a in accounts {
            if let Some(p) = a.parent_id {
                children.entry(p).or_default().push(a.id);
            }
        }
        Self { children }
    }

    pub fn children_of(&self, id: AccountId) -> &[AccountId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All strict descendants of `root`, breadth-first.
    pub fn descendant_ids(&self, root: AccountId) -> Vec<AccountId> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut queue = std::collections::VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            for &child in self.children_of(id) {
                if seen.insert(child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }
}

fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> LedgerResult<Decimal> {
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, x| {
        acc.checked_add(x).ok_or(LedgerError::AmountOverflow("rolled-up balance"))
    })
}

/// Own balance plus the balances of every strict descendant of `root`.
pub fn rolled_up_balance(accounts: &[Account], root: AccountId) -> LedgerResult<Decimal> {
    let balances: HashMap<AccountId, Decimal> = accounts.iter().map(|a| (a.id, a.balance)).collect();
    let own = *balances.get(&root).ok_or(LedgerError::AccountNotFound(root))?;
    let index = ChildIndex::new(accounts);
    let descendants = index.descendant_ids(root);
    checked_sum(
        std::iter::once(own).chain(descendants.iter().filter_map(|id| balances.get(id)).copied()),
    )
}

/// Rolled-up balance of every account, computed in one memoized pass.
pub fn rolled_up_balances(accounts: &[Account]) -> LedgerResult<HashMap<AccountId, Decimal>> {
    let own: HashMap<AccountId, Decimal> = accounts.iter().map(|a| (a.id, a.balance)).collect();
    let index = ChildIndex::new(accounts);
    let mut totals: HashMap<AccountId, Decimal> = HashMap::with_capacity(accounts.len());
    let mut in_progress: HashSet<AccountId> = HashSet::new();

    for a in accounts {
        if totals.contains_key(&a.id) {
            continue;
        }
        let mut stack = vec![(a.id, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                let own_balance = own.get(&id).copied().unwrap_or_default();
                let children = index.children_of(id).iter().filter_map(|c| totals.get(c)).copied();
                let total = checked_sum(std::iter::once(own_balance).chain(children))?;
                totals.insert(id, total);
                continue;
            }
            if totals.contains_key(&id) || !in_progress.insert(id) {
                continue;
            }
            stack.push((id, true));
            for &c in index.children_of(id) {
                stack.push((c, false));
            }
        }
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountCategory, AccountType};
    use chrono::Utc;
    use ledgerkit_core::{TenantId, UserId};
    use rust_decimal_macros::dec;

    fn account(code: &str, name: &str, parent: Option<AccountId>, balance: Decimal) -> Account {
        let now = Utc::now();
        let user = UserId::new();
        Account {
            id: AccountId::new(),
            tenant_id: TenantId::new(),
            code: code.to_string(),
            name: name.to_string(),
            account_type: AccountType::Asset,
            category: AccountCategory::CurrentAssets,
            description: None,
            parent_id: parent,
            balance,
            is_active: true,
            is_deleted: false,
            created_by: user,
            updated_by: user,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn builds_sorted_forest() {
        let assets = account("1000", "Assets", None, dec!(0));
        let bank = account("1200", "Bank", Some(assets.id), dec!(0));
        let cash = account("1100", "Cash", Some(assets.id), dec!(0));
        let equity = account("3000", "Equity", None, dec!(0));

        let forest = build_account_tree(vec![equity.clone(), bank.clone(), assets.clone(), cash.clone()]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].account.code, "1000");
        assert_eq!(forest[1].account.code, "3000");
        let kids: Vec<_> = forest[0].children.iter().map(|n| n.account.code.as_str()).collect();
        assert_eq!(kids, vec!["1100", "1200"]);
        assert_eq!(forest[0].subtree_size(), 3);
    }

    #[test]
    fn inactive_parent_promotes_children_to_roots() {
        let mut parent = account("1000", "Assets", None, dec!(0));
        parent.is_active = false;
        let child = account("1100", "Cash", Some(parent.id), dec!(0));

        let forest = build_account_tree(vec![parent, child.clone()]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].account.id, child.id);
    }

    #[test]
    fn corrupted_cycle_does_not_hang_tree_assembly() {
        let mut a = account("1000", "A", None, dec!(0));
        let b = account("1100", "B", Some(a.id), dec!(0));
        a.parent_id = Some(b.id);
        let root = account("2000", "Root", None, dec!(0));

        let forest = build_account_tree(vec![a, b, root.clone()]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].account.id, root.id);
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let id = AccountId::new();
        let err = ensure_no_cycle(id, id, |_| None).unwrap_err();
        assert!(matches!(err, LedgerError::CircularReference { .. }));
    }

    #[test]
    fn deep_descendant_parent_is_a_cycle() {
        // chain[0] <- chain[1] <- ... <- chain[199]
        let chain: Vec<AccountId> = (0..200).map(|_| AccountId::new()).collect();
        let parents: HashMap<AccountId, AccountId> = chain.windows(2).map(|w| (w[1], w[0])).collect();

        let err = ensure_no_cycle(chain[0], chain[199], |id| parents.get(&id).copied()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::CircularReference {
                account: chain[0],
                parent: chain[199]
            }
        );
    }

    #[test]
    fn unrelated_parent_is_accepted() {
        let a = AccountId::new();
        let b = AccountId::new();
        let root = AccountId::new();
        let parents = HashMap::from([(b, root)]);
        assert!(ensure_no_cycle(a, b, |id| parents.get(&id).copied()).is_ok());
    }

    #[test]
    fn corrupted_chain_is_rejected_instead_of_looping() {
        let a = AccountId::new();
        let x = AccountId::new();
        let y = AccountId::new();
        let parents = HashMap::from([(x, y), (y, x)]);
        assert!(ensure_no_cycle(a, x, |id| parents.get(&id).copied()).is_err());
    }

    #[test]
    fn rolls_up_descendant_balances() {
        let root = account("1000", "Assets", None, dec!(10.00));
        let mid = account("1100", "Current", Some(root.id), dec!(5.50));
        let leaf = account("1110", "Cash", Some(mid.id), dec!(2.25));
        let other = account("2000", "Other", None, dec!(100));
        let all = vec![root.clone(), mid.clone(), leaf.clone(), other.clone()];

        assert_eq!(rolled_up_balance(&all, root.id), Ok(dec!(17.75)));
        assert_eq!(rolled_up_balance(&all, mid.id), Ok(dec!(7.75)));
        let missing = AccountId::new();
        assert_eq!(rolled_up_balance(&all, missing), Err(LedgerError::AccountNotFound(missing)));

        let totals = rolled_up_balances(&all).unwrap();
        assert_eq!(totals[&root.id], dec!(17.75));
        assert_eq!(totals[&mid.id], dec!(7.75));
        assert_eq!(totals[&leaf.id], dec!(2.25));
        assert_eq!(totals[&other.id], dec!(100));
    }

    #[test]
    fn roll_up_overflow_is_an_error() {
        let root = account("1000", "Assets", None, Decimal::MAX);
        let child = account("1100", "Cash", Some(root.id), dec!(1));
        let all = vec![root.clone(), child.clone()];

        assert_eq!(
            rolled_up_balance(&all, root.id),
            Err(LedgerError::AmountOverflow("rolled-up balance"))
        );
        assert_eq!(rolled_up_balance(&all, child.id), Ok(dec!(1)));
        assert!(rolled_up_balances(&all).is_err());
    }

    #[test]
    fn descendant_ids_are_strict() {
        let root = account("1000", "Assets", None, dec!(0));
        let child = account("1100", "Cash", Some(root.id), dec!(0));
        let all = vec![root.clone(), child.clone()];
        let index = ChildIndex::new(&all);
        assert_eq!(index.descendant_ids(root.id), vec![child.id]);
        assert!(index.descendant_ids(child.id).is_empty());
    }
}
