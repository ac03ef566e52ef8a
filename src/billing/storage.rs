//! Storage traits for ledger and order data.
//!
//! Every mutating method is a single guarded read-modify-write: the
//! implementation applies the change only if its predicate holds and reports
//! whether it did. Nothing here caches state between calls.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::BillingError;
use super::plans::{PaymentMethod, Plan};
use crate::error::Result;

/// Durable per-user quota state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub user_id: i64,
    pub plan: Plan,
    /// Rewarded ads watched so far. Never exceeds the per-user ad limit.
    pub ad_views_used: u32,
    /// Extra feature uses earned from ads and not yet spent.
    pub ad_unlocks_remaining: u32,
    pub updated_at: DateTime<Utc>,
}

impl QuotaRecord {
    /// Default record for a user seen for the first time.
    #[must_use]
    pub fn new_free(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan: Plan::Free,
            ad_views_used: 0,
            ad_unlocks_remaining: 0,
            updated_at: now,
        }
    }
}

/// Payment order status. Moves from pending to paid exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
}

impl OrderStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(BillingError::Internal {
                message: format!("unknown order status '{}'", other),
            }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored payment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    /// Externally visible order identifier.
    pub order_id: String,
    pub user_id: i64,
    pub plan: Plan,
    pub payment_method: PaymentMethod,
    pub amount_vnd: u64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Written once, when the order is marked paid.
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl PaymentOrder {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }
}

/// Fields supplied when creating an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentOrder {
    pub order_id: String,
    pub user_id: i64,
    pub plan: Plan,
    pub payment_method: PaymentMethod,
    pub amount_vnd: u64,
}

/// Persistence for quota records.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Return the user's record, inserting a default free record if absent.
    async fn get_or_create_quota(&self, user_id: i64) -> Result<QuotaRecord>;

    /// Return the user's record without creating it.
    async fn get_quota(&self, user_id: i64) -> Result<Option<QuotaRecord>>;

    /// Upsert the plan. Ad counters are left untouched.
    async fn set_plan(&self, user_id: i64, plan: Plan) -> Result<()>;

    /// Add one ad view and `unlocks_per_view` unlocks, only while
    /// `ad_views_used < max_views`.
    ///
    /// Returns the updated record, or `None` when the predicate failed (or the
    /// record is absent) and nothing changed.
    async fn increment_ad_views(
        &self,
        user_id: i64,
        max_views: u32,
        unlocks_per_view: u32,
    ) -> Result<Option<QuotaRecord>>;

    /// Spend one unlock, only while `ad_unlocks_remaining > 0`.
    async fn try_consume_unlock(&self, user_id: i64) -> Result<bool>;

    /// Give one unlock back. Returns `false` if the user has no record.
    async fn refund_unlock(&self, user_id: i64) -> Result<bool>;
}

/// Persistence for payment orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a pending order.
    ///
    /// Fails with [`BillingError::DuplicateOrder`] (as a validation error) if
    /// the order id is taken.
    async fn insert_order(&self, order: &NewPaymentOrder) -> Result<PaymentOrder>;

    async fn get_order(&self, order_id: &str) -> Result<Option<PaymentOrder>>;

    /// Flip a pending order to paid and stamp `confirmed_at`.
    ///
    /// Returns `false` if the order is already paid or does not exist.
    async fn mark_order_paid(&self, order_id: &str) -> Result<bool>;

    /// Orders of one user, most recent first.
    async fn list_orders_by_user(&self, user_id: i64, limit: u64) -> Result<Vec<PaymentOrder>>;

    /// All orders, most recent first.
    async fn list_orders(&self, limit: u64) -> Result<Vec<PaymentOrder>>;
}

/// In-memory implementation for testing.
#[cfg(any(test, feature = "test-billing"))]
pub mod test {
    use super::*;
    use crate::error::LedgerError;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

    /// In-memory ledger store for testing.
    ///
    /// Each guarded update runs under a single write lock. Wraps data in Arc
    /// for cheap cloning.
    #[derive(Default, Clone)]
    pub struct InMemoryLedgerStore {
        inner: Arc<RwLock<LedgerState>>,
    }

    #[derive(Default)]
    struct LedgerState {
        quotas: HashMap<i64, QuotaRecord>,
        orders: HashMap<String, StoredOrder>,
        next_seq: u64,
    }

    struct StoredOrder {
        seq: u64,
        order: PaymentOrder,
    }

    impl InMemoryLedgerStore {
        /// Create a new in-memory store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a quota record (for testing).
        pub fn seed_quota(&self, record: QuotaRecord) -> Result<()> {
            self.write()?.quotas.insert(record.user_id, record);
            Ok(())
        }

        /// Number of stored orders (for testing).
        pub fn order_count(&self) -> Result<usize> {
            Ok(self.read()?.orders.len())
        }

        fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
            self.inner
                .read()
                .map_err(|_| LedgerError::internal("in-memory ledger lock poisoned"))
        }

        fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
            self.inner
                .write()
                .map_err(|_| LedgerError::internal("in-memory ledger lock poisoned"))
        }
    }

    fn most_recent_first(mut orders: Vec<&StoredOrder>, limit: u64) -> Vec<PaymentOrder> {
        orders.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        orders
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|stored| stored.order.clone())
            .collect()
    }

    #[async_trait]
    impl QuotaStore for InMemoryLedgerStore {
        async fn get_or_create_quota(&self, user_id: i64) -> Result<QuotaRecord> {
            let mut state = self.write()?;
            let record = state
                .quotas
                .entry(user_id)
                .or_insert_with(|| QuotaRecord::new_free(user_id, Utc::now()));
            Ok(record.clone())
        }

        async fn get_quota(&self, user_id: i64) -> Result<Option<QuotaRecord>> {
            Ok(self.read()?.quotas.get(&user_id).cloned())
        }

        async fn set_plan(&self, user_id: i64, plan: Plan) -> Result<()> {
            let now = Utc::now();
            let mut state = self.write()?;
            let record = state
                .quotas
                .entry(user_id)
                .or_insert_with(|| QuotaRecord::new_free(user_id, now));
            record.plan = plan;
            record.updated_at = now;
            Ok(())
        }

        async fn increment_ad_views(
            &self,
            user_id: i64,
            max_views: u32,
            unlocks_per_view: u32,
        ) -> Result<Option<QuotaRecord>> {
            let mut state = self.write()?;
            match state.quotas.get_mut(&user_id) {
                Some(record) if record.ad_views_used < max_views => {
                    record.ad_views_used += 1;
                    record.ad_unlocks_remaining += unlocks_per_view;
                    record.updated_at = Utc::now();
                    Ok(Some(record.clone()))
                }
                _ => Ok(None),
            }
        }

        async fn try_consume_unlock(&self, user_id: i64) -> Result<bool> {
            let mut state = self.write()?;
            match state.quotas.get_mut(&user_id) {
                Some(record) if record.ad_unlocks_remaining > 0 => {
                    record.ad_unlocks_remaining -= 1;
                    record.updated_at = Utc::now();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn refund_unlock(&self, user_id: i64) -> Result<bool> {
            let mut state = self.write()?;
            match state.quotas.get_mut(&user_id) {
                Some(record) => {
                    record.ad_unlocks_remaining += 1;
                    record.updated_at = Utc::now();
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    #[async_trait]
    impl OrderStore for InMemoryLedgerStore {
        async fn insert_order(&self, order: &NewPaymentOrder) -> Result<PaymentOrder> {
            let mut state = self.write()?;
            if state.orders.contains_key(&order.order_id) {
                return Err(BillingError::DuplicateOrder {
                    order_id: order.order_id.clone(),
                }
                .into());
            }

            let stored = PaymentOrder {
                order_id: order.order_id.clone(),
                user_id: order.user_id,
                plan: order.plan,
                payment_method: order.payment_method,
                amount_vnd: order.amount_vnd,
                status: OrderStatus::Pending,
                created_at: Utc::now(),
                confirmed_at: None,
            };
            state.next_seq += 1;
            let seq = state.next_seq;
            state.orders.insert(
                order.order_id.clone(),
                StoredOrder {
                    seq,
                    order: stored.clone(),
                },
            );
            Ok(stored)
        }

        async fn get_order(&self, order_id: &str) -> Result<Option<PaymentOrder>> {
            Ok(self
                .read()?
                .orders
                .get(order_id)
                .map(|stored| stored.order.clone()))
        }

        async fn mark_order_paid(&self, order_id: &str) -> Result<bool> {
            let mut state = self.write()?;
            match state.orders.get_mut(order_id) {
                Some(stored) if stored.order.status != OrderStatus::Paid => {
                    stored.order.status = OrderStatus::Paid;
                    stored.order.confirmed_at = Some(Utc::now());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn list_orders_by_user(
            &self,
            user_id: i64,
            limit: u64,
        ) -> Result<Vec<PaymentOrder>> {
            let state = self.read()?;
            let orders = state
                .orders
                .values()
                .filter(|stored| stored.order.user_id == user_id)
                .collect();
            Ok(most_recent_first(orders, limit))
        }

        async fn list_orders(&self, limit: u64) -> Result<Vec<PaymentOrder>> {
            let state = self.read()?;
            Ok(most_recent_first(state.orders.values().collect(), limit))
        }
    }
}
