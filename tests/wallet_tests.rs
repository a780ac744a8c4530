//! Wallet ledger tests over the in-memory store.

mod test_helpers;

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use parimutuel_settlement::config::LedgerConfig;
use parimutuel_settlement::db::models::{TxDirection, TxReason, WalletOwner};
use parimutuel_settlement::events::EventBus;
use parimutuel_settlement::store::memory::MemStore;
use parimutuel_settlement::wallet::{Page, WalletLedger};
use parimutuel_settlement::SettlementError;

use test_helpers::harness;

#[tokio::test]
async fn ensure_wallet_converges_on_one_row() {
    let h = harness(dec!(0.10));
    let a = h.ledger.ensure_wallet(WalletOwner::User(7)).await.unwrap();
    let b = h.ledger.ensure_wallet(WalletOwner::User(7)).await.unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.balance, Decimal::ZERO);

    let house = h.ledger.ensure_wallet(WalletOwner::House).await.unwrap();
    let house_again = h.ledger.ensure_wallet(WalletOwner::House).await.unwrap();
    assert_eq!(house.id, house_again.id);
    assert_ne!(house.id, a.id);
}

#[tokio::test]
async fn credit_and_debit_update_balance_and_journal() {
    let h = harness(dec!(0.10));
    let wallet = h.ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();

    let (w, tx) = h
        .ledger
        .credit(wallet.id, dec!(50), TxReason::Adjustment, None)
        .await
        .unwrap();
    assert_eq!(w.balance, dec!(50));
    assert_eq!(tx.direction, TxDirection::Credit);
    assert_eq!(tx.balance, dec!(50));

    let (w, tx) = h
        .ledger
        .debit(wallet.id, dec!(20), TxReason::Purchase, None)
        .await
        .unwrap();
    assert_eq!(w.balance, dec!(30));
    assert_eq!(tx.balance, dec!(30));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let h = harness(dec!(0.10));
    let wallet = h.ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();

    for amount in [Decimal::ZERO, dec!(-5)] {
        let err = h
            .ledger
            .credit(wallet.id, amount, TxReason::Adjustment, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidAmount(_)));

        let err = h
            .ledger
            .debit(wallet.id, amount, TxReason::Adjustment, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidAmount(_)));
    }
}

#[tokio::test]
async fn overdraft_fails_without_touching_the_journal() {
    let h = harness(dec!(0.10));
    let wallet = h.ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();
    h.ledger
        .credit(wallet.id, dec!(25), TxReason::Adjustment, None)
        .await
        .unwrap();

    let err = h
        .ledger
        .debit(wallet.id, dec!(30), TxReason::Purchase, None)
        .await
        .unwrap_err();
    match err {
        SettlementError::InsufficientFunds {
            balance, requested, ..
        } => {
            assert_eq!(balance, dec!(25));
            assert_eq!(requested, dec!(30));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let current = h.ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();
    assert_eq!(current.balance, dec!(25));
    let history = h.ledger.history(wallet.id, Page::new(10, 0)).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn concurrent_credits_serialize_with_consistent_snapshots() {
    let store = Arc::new(MemStore::new());
    let bus = Arc::new(EventBus::new(64));
    let ledger = Arc::new(WalletLedger::new(
        store.clone(),
        &LedgerConfig::default(),
        bus,
    ));
    let wallet = ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();
    ledger
        .credit(wallet.id, dec!(100), TxReason::Adjustment, None)
        .await
        .unwrap();

    let l1 = ledger.clone();
    let l2 = ledger.clone();
    let id = wallet.id;
    let t1 =
        tokio::spawn(async move { l1.credit(id, dec!(10), TxReason::Payout, None).await });
    let t2 =
        tokio::spawn(async move { l2.credit(id, dec!(15), TxReason::Payout, None).await });
    t1.await.unwrap().unwrap();
    t2.await.unwrap().unwrap();

    let current = ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();
    assert_eq!(current.balance, dec!(125));

    // exactly two new rows, each snapshot internally consistent either order
    let history = ledger.history(wallet.id, Page::new(10, 0)).await.unwrap();
    assert_eq!(history.len(), 3);
    let snapshots: Vec<Decimal> = history.iter().map(|t| t.balance).collect();
    assert_eq!(snapshots[0], dec!(125));
    assert!(snapshots[1] == dec!(110) || snapshots[1] == dec!(115));
}

#[tokio::test]
async fn journal_fold_reproduces_every_snapshot() {
    let h = harness(dec!(0.10));
    let wallet = h.ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();

    let ops: [(TxDirection, Decimal); 5] = [
        (TxDirection::Credit, dec!(40)),
        (TxDirection::Debit, dec!(12.50)),
        (TxDirection::Credit, dec!(3.33)),
        (TxDirection::Debit, dec!(0.83)),
        (TxDirection::Credit, dec!(70)),
    ];
    for (direction, amount) in ops {
        match direction {
            TxDirection::Credit => h
                .ledger
                .credit(wallet.id, amount, TxReason::Adjustment, None)
                .await
                .map(|_| ())
                .unwrap(),
            TxDirection::Debit => h
                .ledger
                .debit(wallet.id, amount, TxReason::Adjustment, None)
                .await
                .map(|_| ())
                .unwrap(),
        }
    }

    let mut history = h.ledger.history(wallet.id, Page::new(50, 0)).await.unwrap();
    history.reverse(); // creation order

    let mut balance = Decimal::ZERO;
    for tx in &history {
        balance = match tx.direction {
            TxDirection::Credit => balance + tx.amount,
            TxDirection::Debit => balance - tx.amount,
        };
        assert_eq!(tx.balance, balance);
        assert!(balance >= Decimal::ZERO);
    }

    let current = h.ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();
    assert_eq!(current.balance, balance);
}

#[tokio::test]
async fn history_is_newest_first_and_caps_page_size() {
    let store = Arc::new(MemStore::new());
    let bus = Arc::new(EventBus::new(64));
    let config = LedgerConfig {
        max_page_size: 5,
        default_page_size: 3,
    };
    let ledger = WalletLedger::new(store.clone(), &config, bus);
    let wallet = ledger.ensure_wallet(WalletOwner::User(1)).await.unwrap();

    for i in 1..=10 {
        ledger
            .credit(wallet.id, Decimal::from(i), TxReason::Adjustment, None)
            .await
            .unwrap();
    }

    // asking for more than the cap returns the cap
    let page = ledger.history(wallet.id, Page::new(50, 0)).await.unwrap();
    assert_eq!(page.len(), 5);
    assert_eq!(page[0].amount, dec!(10));
    assert_eq!(page[4].amount, dec!(6));

    // non-positive limit selects the server default
    let page = ledger.history(wallet.id, Page::new(0, 0)).await.unwrap();
    assert_eq!(page.len(), 3);

    // offset pages through older entries
    let page = ledger.history(wallet.id, Page::new(5, 5)).await.unwrap();
    assert_eq!(page[0].amount, dec!(5));

    let err = ledger.history(999_999, Page::new(5, 0)).await.unwrap_err();
    assert!(matches!(err, SettlementError::NotFound { .. }));
}
