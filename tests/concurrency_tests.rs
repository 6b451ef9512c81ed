mod common;

use cardpay::application::engine::TransferEngine;
use cardpay::domain::card::Amount;
use cardpay::domain::commission::CommissionConfig;
use cardpay::domain::ports::LedgerStore;
use cardpay::domain::transaction::{HistoryScope, PageRequest, TransferRequest};
use cardpay::error::TransferError;
use common::{balance_of, card, ledger_with, number};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn request(from: u64, to: u64, amount: Decimal) -> TransferRequest {
    TransferRequest::new(from, number(to), Amount::new(amount).unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_opposing_transfers_do_not_deadlock() {
    let ledger = ledger_with(vec![card(1, 10, dec!(50.00)), card(2, 20, dec!(50.00))]).await;
    let engine = Arc::new(TransferEngine::new(
        Box::new(ledger.clone()),
        CommissionConfig::disabled(),
    ));

    // A -> B and B -> A of equal amounts, concurrently, many rounds.
    let mut handles = Vec::new();
    for _ in 0..50 {
        let e = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            e.transfer(10, request(1, 2, dec!(1.00))).await
        }));
        let e = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            e.transfer(20, request(2, 1, dec!(1.00))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Net effect is zero on both sides.
    assert_eq!(balance_of(&ledger, 1).await, dec!(50.00));
    assert_eq!(balance_of(&ledger, 2).await, dec!(50.00));
    let history = ledger
        .transaction_history(HistoryScope::All, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(history.total, 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_debits_cannot_overdraw() {
    // Balance covers exactly one of the two simultaneous transfers.
    let ledger = ledger_with(vec![
        card(1, 10, dec!(10.00)),
        card(2, 20, dec!(0.00)),
        card(3, 30, dec!(0.00)),
    ])
    .await;
    let engine = Arc::new(TransferEngine::new(
        Box::new(ledger.clone()),
        CommissionConfig::disabled(),
    ));

    let a = {
        let e = Arc::clone(&engine);
        tokio::spawn(async move { e.transfer(10, request(1, 2, dec!(10.00))).await })
    };
    let b = {
        let e = Arc::clone(&engine);
        tokio::spawn(async move { e.transfer(10, request(1, 3, dec!(10.00))).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(TransferError::InsufficientBalance)))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 1);

    assert_eq!(balance_of(&ledger, 1).await, dec!(0.00));
    assert_eq!(
        balance_of(&ledger, 2).await + balance_of(&ledger, 3).await,
        dec!(10.00)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_random_transfers_conserve_total_balance() {
    let cards: Vec<_> = (1..=8u64).map(|id| card(id, id, dec!(100.00))).collect();
    let initial_total = dec!(800.00);
    let ledger = ledger_with(cards).await;
    let engine = Arc::new(TransferEngine::new(
        Box::new(ledger.clone()),
        CommissionConfig::disabled(),
    ));

    let mut rng = rand::thread_rng();
    let mut handles = Vec::new();
    for _ in 0..200 {
        let from = rng.gen_range(1..=8u64);
        let mut to = rng.gen_range(1..=8u64);
        if to == from {
            to = from % 8 + 1;
        }
        let cents = rng.gen_range(1..=5000i64);
        let amount = Decimal::new(cents, 2);
        let e = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            e.transfer(from, request(from, to, amount)).await
        }));
    }
    for handle in handles {
        // Individual transfers may be rejected for insufficient balance;
        // that must never corrupt the totals.
        let _ = handle.await.unwrap();
    }

    let mut total = Decimal::ZERO;
    for id in 1..=8u64 {
        let balance = balance_of(&ledger, id).await;
        assert!(balance >= Decimal::ZERO);
        total += balance;
    }
    assert_eq!(total, initial_total);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_contention_error_is_retryable() {
    let ledger = ledger_with(vec![card(1, 10, dec!(100.00)), card(2, 20, dec!(0.00))]).await;
    let engine = TransferEngine::new(Box::new(ledger.clone()), CommissionConfig::disabled())
        .with_lock_timeout(std::time::Duration::from_millis(50));

    // Park a foreign lock on the source card so the engine times out.
    let held = ledger
        .lock_cards(&[1], std::time::Duration::from_secs(1))
        .await
        .unwrap();
    let err = engine
        .transfer(10, request(1, 2, dec!(10.00)))
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Contention));
    assert!(err.is_retryable());
    drop(held);

    // Same request succeeds once the lock is free.
    engine
        .transfer(10, request(1, 2, dec!(10.00)))
        .await
        .unwrap();
    assert_eq!(balance_of(&ledger, 1).await, dec!(90.00));
}
