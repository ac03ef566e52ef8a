//! Audit logging for ledger and order operations.
//!
//! Every state transition the services perform is reported here after the
//! storage write succeeded. Failed or no-op transitions are not audited,
//! except for exhausted ad views.

use std::fmt;

use super::plans::Plan;

/// Audit event types for ledger and order operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAuditEvent {
    /// A rewarded ad was credited.
    AdWatched {
        user_id: i64,
        ad_views_used: u32,
        ad_unlocks_remaining: u32,
    },
    /// An ad view was rejected because the per-user limit is reached.
    AdViewsExhausted { user_id: i64 },
    /// One ad unlock was spent on a feature use.
    AdUnlockConsumed { user_id: i64 },
    /// A previously spent unlock was given back after a failed attempt.
    AdUnlockRefunded { user_id: i64 },
    PlanChanged { user_id: i64, plan: Plan },
    OrderCreated {
        order_id: String,
        user_id: i64,
        plan: Plan,
        amount_vnd: u64,
    },
    OrderPaid { order_id: String, user_id: i64 },
}

impl fmt::Display for LedgerAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdWatched {
                user_id,
                ad_views_used,
                ad_unlocks_remaining,
            } => write!(
                f,
                "Ad watched: user={}, views_used={}, unlocks_remaining={}",
                user_id, ad_views_used, ad_unlocks_remaining
            ),
            Self::AdViewsExhausted { user_id } => {
                write!(f, "Ad views exhausted: user={}", user_id)
            }
            Self::AdUnlockConsumed { user_id } => {
                write!(f, "Ad unlock consumed: user={}", user_id)
            }
            Self::AdUnlockRefunded { user_id } => {
                write!(f, "Ad unlock refunded: user={}", user_id)
            }
            Self::PlanChanged { user_id, plan } => {
                write!(f, "Plan changed: user={}, plan={}", user_id, plan)
            }
            Self::OrderCreated {
                order_id,
                user_id,
                plan,
                amount_vnd,
            } => write!(
                f,
                "Order created: order={}, user={}, plan={}, amount_vnd={}",
                order_id, user_id, plan, amount_vnd
            ),
            Self::OrderPaid { order_id, user_id } => {
                write!(f, "Order paid: order={}, user={}", order_id, user_id)
            }
        }
    }
}

impl LedgerAuditEvent {
    /// Event kind as a string for structured logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AdWatched { .. } => "ad_watched",
            Self::AdViewsExhausted { .. } => "ad_views_exhausted",
            Self::AdUnlockConsumed { .. } => "ad_unlock_consumed",
            Self::AdUnlockRefunded { .. } => "ad_unlock_refunded",
            Self::PlanChanged { .. } => "plan_changed",
            Self::OrderCreated { .. } => "order_created",
            Self::OrderPaid { .. } => "order_paid",
        }
    }
}

/// Trait for audit logging backends.
#[allow(async_fn_in_trait)]
pub trait LedgerAuditLogger: Send + Sync {
    /// Record an event. Must not fail the surrounding operation.
    async fn log(&self, event: LedgerAuditEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

impl LedgerAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: LedgerAuditEvent) {}
}

/// Logs audit events with `tracing` at INFO level, target `billing::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl LedgerAuditLogger for TracingAuditLogger {
    async fn log(&self, event: LedgerAuditEvent) {
        tracing::info!(
            target: "billing::audit",
            event_type = %event.kind(),
            "{}", event
        );
    }
}

/// Audit logger that captures events, shared with the test that built it.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingAuditLogger {
    events: std::sync::Arc<tokio::sync::Mutex<Vec<LedgerAuditEvent>>>,
}

#[cfg(test)]
impl RecordingAuditLogger {
    pub(crate) async fn events(&self) -> Vec<LedgerAuditEvent> {
        self.events.lock().await.clone()
    }

    pub(crate) async fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(LedgerAuditEvent::kind).collect()
    }
}

#[cfg(test)]
impl LedgerAuditLogger for RecordingAuditLogger {
    async fn log(&self, event: LedgerAuditEvent) {
        self.events.lock().await.push(event);
    }
}
