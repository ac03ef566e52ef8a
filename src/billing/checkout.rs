//! Checkout and payment confirmation.
//!
//! Ties the order lifecycle to the quota ledger: a checkout creates a pending
//! order priced from the plan table, and confirming it upgrades the user to the
//! best plan they have paid for.

use serde::Serialize;

use super::audit::{LedgerAuditLogger, TracingAuditLogger};
use super::error::BillingError;
use super::orders::{generate_order_id, OrderManager, USER_ORDER_LIST_LIMIT};
use super::plans::{highest_priority, PaymentMethod, Plan};
use super::quota::QuotaLedger;
use super::storage::{OrderStore, PaymentOrder, QuotaStore};
use crate::config::VietQrConfig;
use crate::error::Result;
use crate::vietqr;

/// A freshly created pending order.
#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub order: PaymentOrder,
    /// VietQR payload for the order, when a receiving account is configured.
    pub qr_payload: Option<String>,
}

/// Result of confirming an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentConfirmation {
    /// The order flipped to paid and `plan` is now the user's plan.
    Applied {
        order: PaymentOrder,
        plan: Plan,
        /// Intended entitlement length. Not enforced.
        duration_days: Option<u32>,
    },
    /// The order was already paid; the ledger was not touched.
    AlreadySettled { order: PaymentOrder },
}

impl PaymentConfirmation {
    #[must_use]
    pub fn order(&self) -> &PaymentOrder {
        match self {
            Self::Applied { order, .. } | Self::AlreadySettled { order } => order,
        }
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Checkout flows over one store backing both quota and orders.
pub struct CheckoutManager<S, A = TracingAuditLogger>
where
    S: QuotaStore + OrderStore,
    A: LedgerAuditLogger,
{
    ledger: QuotaLedger<S, A>,
    orders: OrderManager<S, A>,
    payee: VietQrConfig,
}

impl<S: QuotaStore + OrderStore + Clone> CheckoutManager<S> {
    /// Create a checkout manager paying into `payee`.
    #[must_use]
    pub fn new(store: S, payee: VietQrConfig) -> Self {
        Self {
            ledger: QuotaLedger::new(store.clone()),
            orders: OrderManager::new(store),
            payee,
        }
    }
}

impl<S, A> CheckoutManager<S, A>
where
    S: QuotaStore + OrderStore + Clone,
    A: LedgerAuditLogger + Clone,
{
    #[must_use]
    pub fn with_audit_logger<B: LedgerAuditLogger + Clone>(self, audit: B) -> CheckoutManager<S, B> {
        CheckoutManager {
            ledger: self.ledger.with_audit_logger(audit.clone()),
            orders: self.orders.with_audit_logger(audit),
            payee: self.payee,
        }
    }

    pub fn ledger(&self) -> &QuotaLedger<S, A> {
        &self.ledger
    }

    pub fn orders(&self) -> &OrderManager<S, A> {
        &self.orders
    }

    /// Start a purchase of `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanNotPurchasable`] for the free plan.
    pub async fn checkout(
        &self,
        user_id: i64,
        plan: Plan,
        payment_method: PaymentMethod,
    ) -> Result<Checkout> {
        if !plan.is_purchasable() {
            return Err(BillingError::PlanNotPurchasable {
                plan: plan.to_string(),
            }
            .into());
        }

        let order_id = generate_order_id();
        let order = self
            .orders
            .create_order(&order_id, user_id, plan, payment_method, plan.price_vnd())
            .await?;

        let qr_payload = if self.payee.is_configured() {
            Some(self.encode_payload(&order)?)
        } else {
            tracing::debug!(order_id = %order.order_id, "No payee configured, skipping QR");
            None
        };

        Ok(Checkout { order, qr_payload })
    }

    /// VietQR payload for one of the user's orders.
    ///
    /// # Errors
    ///
    /// Not found if the order is missing or belongs to someone else;
    /// [`BillingError::MissingPayee`] without a configured account.
    pub async fn payment_qr(&self, user_id: i64, order_id: &str) -> Result<String> {
        let order = self.orders.get_owned(user_id, order_id).await?;
        self.encode_payload(&order)
    }

    /// Admin confirmation of a received payment.
    pub async fn confirm_payment(&self, order_id: &str) -> Result<PaymentConfirmation> {
        let order = self.orders.get_by_order_id(order_id).await?;
        self.settle(order).await
    }

    /// User-side settlement: same as [`confirm_payment`](Self::confirm_payment)
    /// after checking the order is theirs.
    pub async fn complete_checkout(
        &self,
        user_id: i64,
        order_id: &str,
    ) -> Result<PaymentConfirmation> {
        let order = self.orders.get_owned(user_id, order_id).await?;
        self.settle(order).await
    }

    async fn settle(&self, order: PaymentOrder) -> Result<PaymentConfirmation> {
        if !self.orders.mark_paid(&order.order_id).await? {
            tracing::info!(order_id = %order.order_id, "Order already settled");
            let order = self.orders.get_by_order_id(&order.order_id).await?;
            return Ok(PaymentConfirmation::AlreadySettled { order });
        }

        let paid_plans = self
            .orders
            .store()
            .list_orders_by_user(order.user_id, USER_ORDER_LIST_LIMIT)
            .await?
            .into_iter()
            .filter(PaymentOrder::is_paid)
            .map(|paid| paid.plan);
        let plan = highest_priority(std::iter::once(order.plan).chain(paid_plans))
            .unwrap_or(order.plan);

        self.ledger.set_plan(order.user_id, plan).await?;
        tracing::info!(
            order_id = %order.order_id,
            user_id = order.user_id,
            plan = %plan,
            "Payment confirmed"
        );

        let order = self.orders.get_by_order_id(&order.order_id).await?;
        Ok(PaymentConfirmation::Applied {
            order,
            plan,
            duration_days: plan.entitlement_days(),
        })
    }

    fn encode_payload(&self, order: &PaymentOrder) -> Result<String> {
        let request = self
            .payee
            .request(order.amount_vnd, Some(&order.order_id))?;
        vietqr::build_payload(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::audit::RecordingAuditLogger;
    use crate::billing::storage::test::InMemoryLedgerStore;
    use crate::error::LedgerError;

    fn payee() -> VietQrConfig {
        VietQrConfig {
            bank_bin: Some("970436".to_string()),
            account_number: Some("0123456789".to_string()),
            account_name: Some("DOG AI".to_string()),
            ..Default::default()
        }
    }

    fn manager() -> CheckoutManager<InMemoryLedgerStore, RecordingAuditLogger> {
        CheckoutManager::new(InMemoryLedgerStore::new(), payee())
            .with_audit_logger(RecordingAuditLogger::default())
    }

    #[tokio::test]
    async fn test_checkout_prices_order_and_builds_qr() {
        let manager = manager();
        let checkout = manager.checkout(7, Plan::Pro, PaymentMethod::Qr).await.unwrap();

        assert_eq!(checkout.order.amount_vnd, 99_000);
        assert_eq!(checkout.order.order_id.len(), 12);
        assert!(!checkout.order.is_paid());

        let payload = checkout.qr_payload.unwrap();
        assert!(vietqr::verify_crc(&payload));
        assert!(payload.contains("540599000"));
        assert!(payload.contains(&checkout.order.order_id));
    }

    #[tokio::test]
    async fn test_checkout_without_payee_skips_qr() {
        let manager = CheckoutManager::new(InMemoryLedgerStore::new(), VietQrConfig::default());
        let checkout = manager
            .checkout(7, Plan::Basic, PaymentMethod::Momo)
            .await
            .unwrap();
        assert!(checkout.qr_payload.is_none());

        let err = manager.payment_qr(7, &checkout.order.order_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_free_plan_not_purchasable() {
        let manager = manager();
        let err = manager
            .checkout(7, Plan::Free, PaymentMethod::Qr)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ValidationFailed(_)));
        assert_eq!(manager.orders().store().order_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_payment_qr_hidden_from_other_users() {
        let manager = manager();
        let checkout = manager.checkout(7, Plan::Pro, PaymentMethod::Qr).await.unwrap();

        let payload = manager.payment_qr(7, &checkout.order.order_id).await.unwrap();
        assert_eq!(Some(payload), checkout.qr_payload);

        let err = manager.payment_qr(8, &checkout.order.order_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_confirm_payment_applies_plan_once() {
        let manager = manager();
        let checkout = manager.checkout(7, Plan::Basic, PaymentMethod::Bank).await.unwrap();

        let first = manager.confirm_payment(&checkout.order.order_id).await.unwrap();
        match &first {
            PaymentConfirmation::Applied {
                order,
                plan,
                duration_days,
            } => {
                assert!(order.is_paid());
                assert_eq!(*plan, Plan::Basic);
                assert_eq!(*duration_days, Some(7));
            }
            other => panic!("expected applied, got {:?}", other),
        }

        let second = manager.confirm_payment(&checkout.order.order_id).await.unwrap();
        assert!(!second.is_applied());
        assert_eq!(second.order().confirmed_at, first.order().confirmed_at);

        let record = manager.ledger().get_or_create(7).await.unwrap();
        assert_eq!(record.plan, Plan::Basic);
    }

    #[tokio::test]
    async fn test_confirm_keeps_highest_paid_plan() {
        let manager = manager();
        let pro = manager.checkout(7, Plan::Pro, PaymentMethod::Qr).await.unwrap();
        let basic = manager.checkout(7, Plan::Basic, PaymentMethod::Qr).await.unwrap();

        manager.confirm_payment(&pro.order.order_id).await.unwrap();
        let confirmation = manager.confirm_payment(&basic.order.order_id).await.unwrap();

        match confirmation {
            PaymentConfirmation::Applied { plan, .. } => assert_eq!(plan, Plan::Pro),
            other => panic!("expected applied, got {:?}", other),
        }
        let record = manager.ledger().get_or_create(7).await.unwrap();
        assert_eq!(record.plan, Plan::Pro);
    }

    #[tokio::test]
    async fn test_complete_checkout_requires_owner() {
        let manager = manager();
        let checkout = manager.checkout(7, Plan::Pro, PaymentMethod::Card).await.unwrap();

        let err = manager
            .complete_checkout(8, &checkout.order.order_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let confirmation = manager
            .complete_checkout(7, &checkout.order.order_id)
            .await
            .unwrap();
        assert!(confirmation.is_applied());
    }

    #[tokio::test]
    async fn test_confirm_unknown_order() {
        let manager = manager();
        let err = manager.confirm_payment("nope").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_confirmation_audit_trail() {
        let audit = RecordingAuditLogger::default();
        let manager = CheckoutManager::new(InMemoryLedgerStore::new(), payee())
            .with_audit_logger(audit.clone());
        let checkout = manager.checkout(7, Plan::Pro, PaymentMethod::Qr).await.unwrap();
        manager.confirm_payment(&checkout.order.order_id).await.unwrap();

        assert_eq!(
            audit.kinds().await,
            vec!["order_created", "order_paid", "plan_changed"]
        );
    }
}
