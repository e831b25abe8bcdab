//! Account directory behaviour against the in-memory store.

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ledgerkit_accounting::{
    AccountCategory, AccountPatch, AccountType, LedgerError, NewAccount, DEFAULT_CHART,
};
use ledgerkit_core::AccountId;

use common::{ledger, simple_entry};

#[tokio::test]
async fn create_normalizes_input_and_starts_at_zero() {
    let l = ledger();
    let request = NewAccount {
        code: " 1010 ".into(),
        name: " Petty Cash ".into(),
        account_type: "asset".into(),
        category: "current assets".into(),
        description: Some("   ".into()),
        parent_id: None,
    };
    let account = l.directory.create_account(&l.ctx, request).await.unwrap();

    assert_eq!(account.code, "1010");
    assert_eq!(account.name, "Petty Cash");
    assert_eq!(account.account_type, AccountType::Asset);
    assert_eq!(account.category, AccountCategory::CurrentAssets);
    assert_eq!(account.description, None);
    assert_eq!(account.balance, Decimal::ZERO);
    assert!(account.is_active);
    assert_eq!(account.created_by, l.ctx.user_id());
}

#[tokio::test]
async fn create_rejects_bad_classification() {
    let l = ledger();
    let mut request = NewAccount::new("1010", "Cash", AccountType::Asset, AccountCategory::CurrentAssets);
    request.category = "operating expenses".into();

    let err = l.directory.create_account(&l.ctx, request).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidEnum { field: "account category", .. }));
}

#[tokio::test]
async fn codes_are_unique_per_tenant() {
    let l = ledger();
    l.cash().await;

    let err = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("1010", "Cash again", AccountType::Asset, AccountCategory::CurrentAssets),
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::DuplicateCode("1010".into()));

    // Another tenant may reuse the code.
    l.directory
        .create_account(
            &l.other_tenant(),
            NewAccount::new("1010", "Cash", AccountType::Asset, AccountCategory::CurrentAssets),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn parent_must_exist_in_the_same_tenant() {
    let l = ledger();
    let missing = AccountId::new();
    let request =
        NewAccount::new("1010", "Cash", AccountType::Asset, AccountCategory::CurrentAssets).with_parent(missing);
    assert_eq!(
        l.directory.create_account(&l.ctx, request).await.unwrap_err(),
        LedgerError::InvalidParent(missing)
    );

    let foreign_parent = l
        .directory
        .create_account(
            &l.other_tenant(),
            NewAccount::new("1000", "Assets", AccountType::Asset, AccountCategory::CurrentAssets),
        )
        .await
        .unwrap();
    let request = NewAccount::new("1010", "Cash", AccountType::Asset, AccountCategory::CurrentAssets)
        .with_parent(foreign_parent.id);
    assert_eq!(
        l.directory.create_account(&l.ctx, request).await.unwrap_err(),
        LedgerError::InvalidParent(foreign_parent.id)
    );
}

#[tokio::test]
async fn reparenting_onto_a_descendant_is_a_cycle() {
    let l = ledger();
    let a = l.account("1000", "A", AccountType::Asset, AccountCategory::CurrentAssets).await;
    let b = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("1100", "B", AccountType::Asset, AccountCategory::CurrentAssets).with_parent(a.id),
        )
        .await
        .unwrap();
    let c = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("1110", "C", AccountType::Asset, AccountCategory::CurrentAssets).with_parent(b.id),
        )
        .await
        .unwrap();

    let patch = AccountPatch {
        parent_id: Some(Some(c.id)),
        ..Default::default()
    };
    let err = l.directory.update_account(&l.ctx, a.id, patch).await.unwrap_err();
    assert_eq!(err, LedgerError::CircularReference { account: a.id, parent: c.id });

    let own = AccountPatch {
        parent_id: Some(Some(a.id)),
        ..Default::default()
    };
    assert!(matches!(
        l.directory.update_account(&l.ctx, a.id, own).await,
        Err(LedgerError::CircularReference { .. })
    ));

    // Moving a leaf elsewhere is fine.
    let detach = AccountPatch {
        parent_id: Some(None),
        ..Default::default()
    };
    let c = l.directory.update_account(&l.ctx, c.id, detach).await.unwrap();
    assert_eq!(c.parent_id, None);
}

#[tokio::test]
async fn deep_chains_are_checked_to_the_root() {
    let l = ledger();
    let root = l.account("1000", "L0", AccountType::Asset, AccountCategory::CurrentAssets).await;
    let mut parent = root.id;
    for depth in 1..200u32 {
        let code = format!("{}", 1000 + depth);
        let child = l
            .directory
            .create_account(
                &l.ctx,
                NewAccount::new(code, format!("L{depth}"), AccountType::Asset, AccountCategory::CurrentAssets)
                    .with_parent(parent),
            )
            .await
            .unwrap();
        parent = child.id;
    }

    let patch = AccountPatch {
        parent_id: Some(Some(parent)),
        ..Default::default()
    };
    let err = l.directory.update_account(&l.ctx, root.id, patch).await.unwrap_err();
    assert!(matches!(err, LedgerError::CircularReference { .. }));
}

#[tokio::test]
async fn update_applies_only_supplied_fields() {
    let l = ledger();
    let cash = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("1010", "Cash", AccountType::Asset, AccountCategory::CurrentAssets)
                .with_description("drawer"),
        )
        .await
        .unwrap();

    let patch = AccountPatch {
        name: Some("Cash on Hand".into()),
        is_active: Some(false),
        ..Default::default()
    };
    let updated = l.directory.update_account(&l.ctx, cash.id, patch).await.unwrap();
    assert_eq!(updated.name, "Cash on Hand");
    assert_eq!(updated.code, "1010");
    assert_eq!(updated.description.as_deref(), Some("drawer"));
    assert!(!updated.is_active);

    let clear = AccountPatch {
        description: Some(None),
        ..Default::default()
    };
    let updated = l.directory.update_account(&l.ctx, cash.id, clear).await.unwrap();
    assert_eq!(updated.description, None);
}

#[tokio::test]
async fn update_rejects_a_taken_code() {
    let l = ledger();
    let cash = l.cash().await;
    l.account("1020", "Bank", AccountType::Asset, AccountCategory::CurrentAssets).await;

    let patch = AccountPatch {
        code: Some("1020".into()),
        ..Default::default()
    };
    assert_eq!(
        l.directory.update_account(&l.ctx, cash.id, patch).await.unwrap_err(),
        LedgerError::DuplicateCode("1020".into())
    );

    // Re-submitting its own code is not a conflict.
    let same = AccountPatch {
        code: Some("1010".into()),
        ..Default::default()
    };
    l.directory.update_account(&l.ctx, cash.id, same).await.unwrap();
}

#[tokio::test]
async fn type_change_is_blocked_once_lines_reference_the_account() {
    let l = ledger();
    let cash = l.cash().await;
    let sales = l.sales().await;

    let reclassify = AccountPatch {
        account_type: Some("EXPENSE".into()),
        category: Some("OPERATING_EXPENSES".into()),
        ..Default::default()
    };
    let spare = l
        .account("1900", "Spare", AccountType::Asset, AccountCategory::OtherAssets)
        .await;
    let moved = l
        .directory
        .update_account(&l.ctx, spare.id, reclassify.clone())
        .await
        .unwrap();
    assert_eq!(moved.account_type, AccountType::Expense);

    l.engine
        .create_journal_entry(&l.ctx, simple_entry(cash.id, sales.id, dec!(1)))
        .await
        .unwrap();
    let err = l.directory.update_account(&l.ctx, cash.id, reclassify).await.unwrap_err();
    assert_eq!(err, LedgerError::HasLedgerReferences { account: cash.id, lines: 1 });
}

#[tokio::test]
async fn delete_requires_a_leaf() {
    let l = ledger();
    let parent = l.account("1000", "Assets", AccountType::Asset, AccountCategory::CurrentAssets).await;
    let child = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("1010", "Cash", AccountType::Asset, AccountCategory::CurrentAssets).with_parent(parent.id),
        )
        .await
        .unwrap();

    assert_eq!(
        l.directory.delete_account(&l.ctx, parent.id).await.unwrap_err(),
        LedgerError::HasChildren(parent.id)
    );

    l.directory.delete_account(&l.ctx, child.id).await.unwrap();
    assert_eq!(
        l.directory.get_account(&l.ctx, child.id).await.unwrap_err(),
        LedgerError::AccountNotFound(child.id)
    );
    l.directory.delete_account(&l.ctx, parent.id).await.unwrap();

    // The code is free again once the holder is deleted.
    l.account("1000", "Assets", AccountType::Asset, AccountCategory::CurrentAssets).await;
}

#[tokio::test]
async fn deleted_accounts_cannot_be_parents_or_posted_to() {
    let l = ledger();
    let sales = l.sales().await;
    let old = l.account("1000", "Assets", AccountType::Asset, AccountCategory::CurrentAssets).await;
    let cash = l.cash().await;
    l.directory.delete_account(&l.ctx, old.id).await.unwrap();

    let err = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("1020", "Bank", AccountType::Asset, AccountCategory::CurrentAssets).with_parent(old.id),
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::InvalidParent(old.id));

    let reparent = AccountPatch {
        parent_id: Some(Some(old.id)),
        ..Default::default()
    };
    let err = l.directory.update_account(&l.ctx, cash.id, reparent).await.unwrap_err();
    assert_eq!(err, LedgerError::InvalidParent(old.id));

    let err = l
        .engine
        .create_journal_entry(&l.ctx, simple_entry(old.id, sales.id, dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::AccountNotFound(old.id));
}

#[tokio::test]
async fn lines_of_deleted_entries_still_block_a_type_change() {
    let l = ledger();
    let cash = l.cash().await;
    let sales = l.sales().await;

    let entry = l
        .engine
        .create_journal_entry(&l.ctx, simple_entry(cash.id, sales.id, dec!(1)))
        .await
        .unwrap();
    l.engine.delete_journal_entry(&l.ctx, entry.id).await.unwrap();

    let reclassify = AccountPatch {
        account_type: Some("EXPENSE".into()),
        category: Some("OPERATING_EXPENSES".into()),
        ..Default::default()
    };
    let err = l.directory.update_account(&l.ctx, cash.id, reclassify).await.unwrap_err();
    assert_eq!(err, LedgerError::HasLedgerReferences { account: cash.id, lines: 1 });
}

#[tokio::test]
async fn tree_is_ordered_and_skips_inactive_accounts() {
    let l = ledger();
    let assets = l.account("1000", "Assets", AccountType::Asset, AccountCategory::CurrentAssets).await;
    let liabilities = l
        .account("2000", "Liabilities", AccountType::Liability, AccountCategory::CurrentLiabilities)
        .await;
    for (code, name) in [("1020", "Bank"), ("1010", "Cash")] {
        l.directory
            .create_account(
                &l.ctx,
                NewAccount::new(code, name, AccountType::Asset, AccountCategory::CurrentAssets).with_parent(assets.id),
            )
            .await
            .unwrap();
    }
    let hidden = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("2100", "Old AP", AccountType::Liability, AccountCategory::CurrentLiabilities)
                .with_parent(liabilities.id),
        )
        .await
        .unwrap();
    l.directory
        .update_account(
            &l.ctx,
            hidden.id,
            AccountPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let forest = l.directory.get_account_tree(&l.ctx).await.unwrap();
    let roots: Vec<&str> = forest.iter().map(|n| n.account.code.as_str()).collect();
    assert_eq!(roots, ["1000", "2000"]);
    let children: Vec<&str> = forest[0].children.iter().map(|n| n.account.code.as_str()).collect();
    assert_eq!(children, ["1010", "1020"]);
    assert!(forest[1].children.is_empty());
}

#[tokio::test]
async fn balances_roll_up_through_descendants() {
    let l = ledger();
    let assets = l.account("1000", "Assets", AccountType::Asset, AccountCategory::CurrentAssets).await;
    let cash = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("1010", "Cash", AccountType::Asset, AccountCategory::CurrentAssets).with_parent(assets.id),
        )
        .await
        .unwrap();
    let drawer = l
        .directory
        .create_account(
            &l.ctx,
            NewAccount::new("1011", "Drawer", AccountType::Asset, AccountCategory::CurrentAssets).with_parent(cash.id),
        )
        .await
        .unwrap();

    l.directory.mutate_balance(&l.ctx, assets.id, dec!(1), dec!(0)).await.unwrap();
    l.directory.mutate_balance(&l.ctx, cash.id, dec!(10), dec!(0)).await.unwrap();
    l.directory.mutate_balance(&l.ctx, drawer.id, dec!(100), dec!(0)).await.unwrap();

    assert_eq!(l.directory.get_account_balance(&l.ctx, assets.id).await.unwrap(), dec!(111));
    assert_eq!(l.directory.get_account_balance(&l.ctx, cash.id).await.unwrap(), dec!(110));
    assert_eq!(l.directory.get_account_balance(&l.ctx, drawer.id).await.unwrap(), dec!(100));

    let all = l.directory.get_account_balances(&l.ctx).await.unwrap();
    assert_eq!(all[&assets.id], dec!(111));
    assert_eq!(all[&cash.id], dec!(110));

    let missing = AccountId::new();
    assert_eq!(
        l.directory.get_account_balance(&l.ctx, missing).await.unwrap_err(),
        LedgerError::AccountNotFound(missing)
    );
}

#[tokio::test]
async fn mutate_balance_follows_the_normal_side() {
    let l = ledger();
    let cash = l.cash().await;
    let sales = l.sales().await;

    assert_eq!(l.directory.mutate_balance(&l.ctx, cash.id, dec!(30), dec!(0)).await.unwrap(), dec!(30));
    assert_eq!(l.directory.mutate_balance(&l.ctx, cash.id, dec!(0), dec!(45)).await.unwrap(), dec!(-15));
    assert_eq!(l.directory.mutate_balance(&l.ctx, sales.id, dec!(0), dec!(30)).await.unwrap(), dec!(30));

    // The swapped call is the exact inverse.
    l.directory.mutate_balance(&l.ctx, cash.id, dec!(45), dec!(0)).await.unwrap();
    assert_eq!(l.balance(cash.id).await, dec!(30));

    assert!(matches!(
        l.directory.mutate_balance(&l.ctx, cash.id, dec!(-1), dec!(0)).await,
        Err(LedgerError::InvalidField { field: "amount", .. })
    ));
}

#[tokio::test]
async fn next_code_steps_within_the_type_block() {
    let l = ledger();
    assert_eq!(l.directory.next_account_code(&l.ctx, AccountType::Asset).await.unwrap(), "1000");

    l.cash().await;
    l.account("1234", "Misc", AccountType::Asset, AccountCategory::OtherAssets).await;
    assert_eq!(l.directory.next_account_code(&l.ctx, AccountType::Asset).await.unwrap(), "1240");
    assert_eq!(l.directory.next_account_code(&l.ctx, AccountType::Revenue).await.unwrap(), "4000");
}

#[tokio::test]
async fn bootstrap_seeds_once() {
    let l = ledger();
    let created = l.directory.bootstrap_default_chart(&l.ctx).await.unwrap();
    assert_eq!(created.len(), DEFAULT_CHART.len());

    let forest = l.directory.get_account_tree(&l.ctx).await.unwrap();
    let roots: Vec<&str> = forest.iter().map(|n| n.account.code.as_str()).collect();
    assert_eq!(roots, ["1000", "2000", "3000", "4000", "5000"]);
    let total: usize = forest.iter().map(|n| n.subtree_size()).sum();
    assert_eq!(total, DEFAULT_CHART.len());

    let again = l.directory.bootstrap_default_chart(&l.ctx).await.unwrap();
    assert_eq!(again.len(), DEFAULT_CHART.len());
    assert_eq!(l.directory.list_accounts(&l.ctx).await.unwrap().len(), DEFAULT_CHART.len());
}
