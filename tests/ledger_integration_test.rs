//! SeaORM ledger store against SQLite in-memory.

#![cfg(feature = "database")]

use std::sync::Arc;

use dogai_billing::billing::{
    AdViewOutcome, AllowedBy, NewPaymentOrder, OrderManager, OrderStatus, OrderStore,
    PaymentMethod, Plan, QuotaDecision, QuotaLedger, QuotaStore, AD_UNLOCK_PER_VIEW,
    FREE_PREDICTIONS, MAX_AD_VIEWS,
};
use dogai_billing::database::{rollback_migration, run_migrations, Migrator};
use dogai_billing::testing::TestDb;
use dogai_billing::{test_db, LedgerError};

fn new_order(order_id: &str, user_id: i64, plan: Plan) -> NewPaymentOrder {
    NewPaymentOrder {
        order_id: order_id.to_string(),
        user_id,
        plan,
        payment_method: PaymentMethod::Qr,
        amount_vnd: plan.price_vnd(),
    }
}

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let db = test_db!();
    let store = db.store();

    assert!(store.get_quota(1).await.unwrap().is_none());

    let first = store.get_or_create_quota(1).await.unwrap();
    assert_eq!(first.plan, Plan::Free);
    assert_eq!(first.ad_views_used, 0);
    assert_eq!(first.ad_unlocks_remaining, 0);

    let second = store.get_or_create_quota(1).await.unwrap();
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_ad_views_are_capped() {
    let db = test_db!();
    let ledger = QuotaLedger::new(db.store());

    for watched in 1..=MAX_AD_VIEWS {
        let record = ledger.mark_ad_watched(5).await.unwrap().unwrap();
        assert_eq!(record.ad_views_used, watched);
        assert_eq!(record.ad_unlocks_remaining, watched * AD_UNLOCK_PER_VIEW);
    }

    assert!(ledger.mark_ad_watched(5).await.unwrap().is_none());
    let record = ledger.get_or_create(5).await.unwrap();
    assert_eq!(record.ad_views_used, MAX_AD_VIEWS);
    assert_eq!(record.ad_unlocks_remaining, 9);
}

#[tokio::test]
async fn test_concurrent_consume_never_overspends() {
    let db = test_db!();
    let ledger = Arc::new(QuotaLedger::new(db.store()));
    ledger.mark_ad_watched(9).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(
            async move { ledger.consume_ad_unlock(9).await },
        ));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, AD_UNLOCK_PER_VIEW);
    let record = ledger.get_or_create(9).await.unwrap();
    assert_eq!(record.ad_unlocks_remaining, 0);
}

#[tokio::test]
async fn test_set_plan_keeps_counters() {
    let db = test_db!();
    let ledger = QuotaLedger::new(db.store());

    ledger.mark_ad_watched(3).await.unwrap();
    ledger.set_plan(3, Plan::Pro).await.unwrap();

    let record = ledger.get_or_create(3).await.unwrap();
    assert_eq!(record.plan, Plan::Pro);
    assert_eq!(record.ad_views_used, 1);
    assert_eq!(record.ad_unlocks_remaining, AD_UNLOCK_PER_VIEW);

    // Upsert creates a missing record
    ledger.set_plan(4, Plan::Enterprise).await.unwrap();
    assert_eq!(ledger.get_or_create(4).await.unwrap().plan, Plan::Enterprise);
}

#[tokio::test]
async fn test_quota_decisions_over_sqlite() {
    let db = test_db!();
    let ledger = QuotaLedger::new(db.store());
    let spent = u64::from(FREE_PREDICTIONS);

    assert_eq!(
        ledger.check_quota(2, 0).await.unwrap(),
        QuotaDecision::Allowed(AllowedBy::FreeTier)
    );
    assert_eq!(
        ledger.check_quota(2, spent).await.unwrap(),
        QuotaDecision::NeedAdView
    );

    assert!(matches!(
        ledger.watch_ad(2).await.unwrap(),
        AdViewOutcome::Unlocked(_)
    ));
    assert_eq!(
        ledger.check_quota(2, spent).await.unwrap(),
        QuotaDecision::Allowed(AllowedBy::AdUnlock)
    );

    ledger.refund_ad_unlock(2).await.unwrap();
    let summary = ledger.summary(2, spent).await.unwrap();
    assert_eq!(summary.ad_unlocks_remaining, AD_UNLOCK_PER_VIEW);
    assert_eq!(summary.remaining_free, 0);
}

#[tokio::test]
async fn test_refund_without_record_is_not_found() {
    let db = test_db!();
    let ledger = QuotaLedger::new(db.store());

    let err = ledger.refund_ad_unlock(77).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn test_duplicate_order_rejected() {
    let db = test_db!();
    let store = db.store();

    store.insert_order(&new_order("dup0001", 1, Plan::Basic)).await.unwrap();
    let err = store
        .insert_order(&new_order("dup0001", 2, Plan::Pro))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ValidationFailed(_)));

    let order = store.get_order("dup0001").await.unwrap().unwrap();
    assert_eq!(order.user_id, 1);
}

#[tokio::test]
async fn test_mark_paid_twice() {
    let db = test_db!();
    let orders = OrderManager::new(db.store());

    let created = orders
        .create_order("pay0001", 1, Plan::Pro, PaymentMethod::Vnpay, 99_000)
        .await
        .unwrap();
    assert_eq!(created.status, OrderStatus::Pending);
    assert!(created.confirmed_at.is_none());

    assert!(orders.mark_paid("pay0001").await.unwrap());
    let paid = orders.get_by_order_id("pay0001").await.unwrap();
    assert!(paid.is_paid());
    assert!(paid.confirmed_at.is_some());

    assert!(!orders.mark_paid("pay0001").await.unwrap());
    let again = orders.get_by_order_id("pay0001").await.unwrap();
    assert_eq!(again.confirmed_at, paid.confirmed_at);

    assert!(!orders.mark_paid("missing").await.unwrap());
}

#[tokio::test]
async fn test_list_orders_newest_first() {
    let db = test_db!();
    let store = db.store();

    for (id, user) in [("ord1", 1), ("ord2", 2), ("ord3", 1)] {
        store.insert_order(&new_order(id, user, Plan::Basic)).await.unwrap();
    }

    let mine: Vec<String> = store
        .list_orders_by_user(1, 50)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order_id)
        .collect();
    assert_eq!(mine, ["ord3", "ord1"]);

    let all = store.list_orders(2).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].order_id, "ord3");
    assert_eq!(all[1].order_id, "ord2");
}

#[tokio::test]
async fn test_migrations_roll_back() {
    let db = TestDb::new_unmigrated().await.unwrap();
    let conn = db.connection();

    run_migrations::<Migrator>(&conn).await.unwrap();
    db.store().get_or_create_quota(1).await.unwrap();

    rollback_migration::<Migrator>(&conn, None).await.unwrap();
    let err = db.store().get_quota(1).await.unwrap_err();
    assert!(matches!(err, LedgerError::StorageUnavailable(_)));
}
