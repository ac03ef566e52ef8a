//! Payment order lifecycle.
//!
//! Orders are created pending and flipped to paid exactly once. They are never
//! deleted or edited otherwise.

use super::audit::{LedgerAuditEvent, LedgerAuditLogger, TracingAuditLogger};
use super::error::BillingError;
use super::plans::{PaymentMethod, Plan};
use super::storage::{NewPaymentOrder, OrderStore, PaymentOrder};
use super::validation::validate_order_id;
use crate::error::Result;

/// Maximum orders returned for one user.
pub const USER_ORDER_LIST_LIMIT: u64 = 50;
/// Maximum orders returned by the admin listing.
pub const ALL_ORDERS_LIST_LIMIT: u64 = 200;

/// Length of generated order ids.
pub const ORDER_ID_LENGTH: usize = 12;

/// Generate a fresh order id: 12 lowercase hex characters of a random UUID.
#[must_use]
pub fn generate_order_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(ORDER_ID_LENGTH);
    id
}

/// Order operations over an [`OrderStore`].
pub struct OrderManager<S: OrderStore, A: LedgerAuditLogger = TracingAuditLogger> {
    store: S,
    audit: A,
}

impl<S: OrderStore> OrderManager<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            audit: TracingAuditLogger,
        }
    }
}

impl<S: OrderStore, A: LedgerAuditLogger> OrderManager<S, A> {
    #[must_use]
    pub fn with_audit_logger<B: LedgerAuditLogger>(self, audit: B) -> OrderManager<S, B> {
        OrderManager {
            store: self.store,
            audit,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a pending order.
    ///
    /// # Errors
    ///
    /// A malformed or already-used `order_id` is a validation error and
    /// nothing is written.
    pub async fn create_order(
        &self,
        order_id: &str,
        user_id: i64,
        plan: Plan,
        payment_method: PaymentMethod,
        amount_vnd: u64,
    ) -> Result<PaymentOrder> {
        validate_order_id(order_id)?;

        let order = self
            .store
            .insert_order(&NewPaymentOrder {
                order_id: order_id.to_string(),
                user_id,
                plan,
                payment_method,
                amount_vnd,
            })
            .await?;

        tracing::info!(
            order_id,
            user_id,
            plan = %plan,
            payment_method = %payment_method,
            amount_vnd,
            "Payment order created"
        );
        self.audit
            .log(LedgerAuditEvent::OrderCreated {
                order_id: order.order_id.clone(),
                user_id,
                plan,
                amount_vnd,
            })
            .await;

        Ok(order)
    }

    /// Look up an order.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no such order exists.
    /// Ids are only format-checked on creation, so a malformed id is simply
    /// not found.
    pub async fn get_by_order_id(&self, order_id: &str) -> Result<PaymentOrder> {
        let order = self.store.get_order(order_id).await?.ok_or_else(|| {
            BillingError::OrderNotFound {
                order_id: order_id.to_string(),
            }
        })?;
        tracing::debug!(order_id, status = %order.status, "Loaded payment order");
        Ok(order)
    }

    /// Look up an order that must belong to `user_id`.
    ///
    /// Someone else's order is reported as not found.
    pub async fn get_owned(&self, user_id: i64, order_id: &str) -> Result<PaymentOrder> {
        let order = self.get_by_order_id(order_id).await?;
        if order.user_id != user_id {
            tracing::warn!(order_id, user_id, "Order requested by non-owner");
            return Err(BillingError::OrderNotFound {
                order_id: order_id.to_string(),
            }
            .into());
        }
        Ok(order)
    }

    /// Mark an order paid.
    ///
    /// Returns `false` if it was already paid or does not exist; in that case
    /// nothing changes and `confirmed_at` keeps its first value.
    pub async fn mark_paid(&self, order_id: &str) -> Result<bool> {
        if !self.store.mark_order_paid(order_id).await? {
            tracing::debug!(order_id, "Order not marked paid (already paid or missing)");
            return Ok(false);
        }

        let user_id = match self.store.get_order(order_id).await? {
            Some(order) => order.user_id,
            None => {
                return Err(BillingError::Internal {
                    message: format!("order {} vanished after being marked paid", order_id),
                }
                .into());
            }
        };

        tracing::info!(order_id, user_id, "Payment order marked paid");
        self.audit
            .log(LedgerAuditEvent::OrderPaid {
                order_id: order_id.to_string(),
                user_id,
            })
            .await;
        Ok(true)
    }

    /// The user's most recent orders, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<PaymentOrder>> {
        self.store
            .list_orders_by_user(user_id, USER_ORDER_LIST_LIMIT)
            .await
    }

    /// The most recent orders of all users, newest first.
    pub async fn list_all(&self) -> Result<Vec<PaymentOrder>> {
        self.store.list_orders(ALL_ORDERS_LIST_LIMIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::audit::RecordingAuditLogger;
    use crate::billing::storage::test::InMemoryLedgerStore;
    use crate::billing::storage::OrderStatus;
    use crate::error::LedgerError;

    fn manager() -> OrderManager<InMemoryLedgerStore, RecordingAuditLogger> {
        OrderManager::new(InMemoryLedgerStore::new())
            .with_audit_logger(RecordingAuditLogger::default())
    }

    #[test]
    fn test_generated_order_id_shape() {
        let id = generate_order_id();
        assert_eq!(id.len(), ORDER_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(validate_order_id(&id).is_ok());
        assert_ne!(id, generate_order_id());
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let manager = manager();
        let created = manager
            .create_order("abc123def456", 7, Plan::Pro, PaymentMethod::Momo, 99_000)
            .await
            .unwrap();
        assert_eq!(created.status, OrderStatus::Pending);
        assert!(created.confirmed_at.is_none());

        let loaded = manager.get_by_order_id("abc123def456").await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(manager.audit.kinds().await, vec!["order_created"]);
    }

    #[tokio::test]
    async fn test_duplicate_order_id_is_validation_error() {
        let manager = manager();
        manager
            .create_order("dup", 1, Plan::Basic, PaymentMethod::Qr, 49_000)
            .await
            .unwrap();

        let err = manager
            .create_order("dup", 1, Plan::Pro, PaymentMethod::Qr, 99_000)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ValidationFailed(_)));

        let stored = manager.get_by_order_id("dup").await.unwrap();
        assert_eq!(stored.plan, Plan::Basic);
        assert_eq!(manager.audit.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_order_id_rejected_before_write() {
        let manager = manager();
        let err = manager
            .create_order("bad id", 1, Plan::Basic, PaymentMethod::Qr, 49_000)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ValidationFailed(_)));
        assert_eq!(manager.store().order_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let manager = manager();
        let err = manager.get_by_order_id("nope").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_lookup_key_is_absent() {
        let manager = manager();
        let err = manager.get_by_order_id("abc 123").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        assert!(!manager.mark_paid("abc 123").await.unwrap());
        assert!(!manager.mark_paid("").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_owned_hides_other_users_orders() {
        let manager = manager();
        manager
            .create_order("mine", 1, Plan::Pro, PaymentMethod::Qr, 99_000)
            .await
            .unwrap();

        assert!(manager.get_owned(1, "mine").await.is_ok());
        let err = manager.get_owned(2, "mine").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_paid_twice() {
        let manager = manager();
        manager
            .create_order("o1", 3, Plan::Pro, PaymentMethod::Bank, 99_000)
            .await
            .unwrap();

        assert!(manager.mark_paid("o1").await.unwrap());
        let first = manager.get_by_order_id("o1").await.unwrap().confirmed_at;
        assert!(first.is_some());

        assert!(!manager.mark_paid("o1").await.unwrap());
        let second = manager.get_by_order_id("o1").await.unwrap().confirmed_at;
        assert_eq!(first, second);

        assert!(!manager.mark_paid("missing").await.unwrap());
        assert_eq!(manager.audit.kinds().await, vec!["order_created", "order_paid"]);
    }

    #[tokio::test]
    async fn test_list_limits() {
        let manager = manager();
        for i in 0..(USER_ORDER_LIST_LIMIT + 5) {
            manager
                .create_order(&format!("u1-{i}"), 1, Plan::Basic, PaymentMethod::Qr, 49_000)
                .await
                .unwrap();
        }
        manager
            .create_order("u2-0", 2, Plan::Pro, PaymentMethod::Qr, 99_000)
            .await
            .unwrap();

        let mine = manager.list_by_user(1).await.unwrap();
        assert_eq!(mine.len() as u64, USER_ORDER_LIST_LIMIT);
        assert_eq!(mine[0].order_id, format!("u1-{}", USER_ORDER_LIST_LIMIT + 4));

        let all = manager.list_all().await.unwrap();
        assert_eq!(all.len() as u64, USER_ORDER_LIST_LIMIT + 6);
        assert_eq!(all[0].order_id, "u2-0");
    }
}
