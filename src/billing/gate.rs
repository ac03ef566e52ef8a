//! One-shot feature admission.
//!
//! [`FeatureGate::begin`] runs the quota check and, when the use is allowed,
//! hands back a [`UsageAttempt`]. The attempt is settled by value, either
//! with [`UsageAttempt::complete`] or [`UsageAttempt::fail`], so an unlock
//! spent by one attempt can be refunded at most once.
//!
//! ```rust,ignore
//! let gate = FeatureGate::new(&ledger);
//! match gate.begin(user_id, used).await? {
//!     Admission::Admitted(attempt) => match classify(image).await {
//!         Ok(label) => { attempt.complete(); Ok(label) }
//!         Err(e) => { attempt.fail().await?; Err(e) }
//!     },
//!     Admission::Denied(decision) => redirect_for(decision),
//! }
//! ```

use super::audit::LedgerAuditLogger;
use super::quota::{AllowedBy, QuotaDecision, QuotaLedger};
use super::storage::QuotaStore;
use crate::error::Result;

/// Result of [`FeatureGate::begin`].
#[must_use]
pub enum Admission<'a, S: QuotaStore, A: LedgerAuditLogger> {
    Admitted(UsageAttempt<'a, S, A>),
    /// Not allowed. Carries `NeedAdView` or `NeedUpgrade`.
    Denied(QuotaDecision),
}

impl<S: QuotaStore, A: LedgerAuditLogger> std::fmt::Debug for Admission<'_, S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admitted(attempt) => f.debug_tuple("Admitted").field(attempt).finish(),
            Self::Denied(decision) => f.debug_tuple("Denied").field(decision).finish(),
        }
    }
}

/// Admits feature uses against a [`QuotaLedger`].
pub struct FeatureGate<'a, S: QuotaStore, A: LedgerAuditLogger> {
    ledger: &'a QuotaLedger<S, A>,
}

impl<'a, S: QuotaStore, A: LedgerAuditLogger> FeatureGate<'a, S, A> {
    #[must_use]
    pub fn new(ledger: &'a QuotaLedger<S, A>) -> Self {
        Self { ledger }
    }

    /// Check quota for one attempt. May spend an ad unlock.
    pub async fn begin(&self, user_id: i64, total_used: u64) -> Result<Admission<'a, S, A>> {
        let decision = self.ledger.check_quota(user_id, total_used).await?;
        Ok(match decision {
            QuotaDecision::Allowed(allowed_by) => Admission::Admitted(UsageAttempt {
                ledger: self.ledger,
                user_id,
                allowed_by,
            }),
            denied => Admission::Denied(denied),
        })
    }
}

/// An admitted feature use awaiting its outcome.
///
/// Dropping an attempt without settling it keeps any spent unlock spent.
#[must_use = "settle the attempt with complete() or fail()"]
pub struct UsageAttempt<'a, S: QuotaStore, A: LedgerAuditLogger> {
    ledger: &'a QuotaLedger<S, A>,
    user_id: i64,
    allowed_by: AllowedBy,
}

impl<S: QuotaStore, A: LedgerAuditLogger> UsageAttempt<'_, S, A> {
    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    #[must_use]
    pub fn allowed_by(&self) -> AllowedBy {
        self.allowed_by
    }

    /// The use succeeded. Nothing is written.
    pub fn complete(self) {
        tracing::debug!(user_id = self.user_id, allowed_by = ?self.allowed_by, "Usage attempt completed");
    }

    /// The use failed. Refunds the unlock if this attempt spent one.
    ///
    /// Returns whether a refund was made.
    pub async fn fail(self) -> Result<bool> {
        if self.allowed_by != AllowedBy::AdUnlock {
            tracing::debug!(user_id = self.user_id, allowed_by = ?self.allowed_by, "Usage attempt failed, nothing to refund");
            return Ok(false);
        }
        self.ledger.refund_ad_unlock(self.user_id).await?;
        Ok(true)
    }
}

impl<S: QuotaStore, A: LedgerAuditLogger> std::fmt::Debug for UsageAttempt<'_, S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageAttempt")
            .field("user_id", &self.user_id)
            .field("allowed_by", &self.allowed_by)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::audit::NoOpAuditLogger;
    use crate::billing::plans::Plan;
    use crate::billing::quota::AD_UNLOCK_PER_VIEW;
    use crate::billing::storage::test::InMemoryLedgerStore;

    fn ledger() -> QuotaLedger<InMemoryLedgerStore, NoOpAuditLogger> {
        QuotaLedger::new(InMemoryLedgerStore::new()).with_audit_logger(NoOpAuditLogger)
    }

    #[tokio::test]
    async fn test_failed_attempt_refunds_spent_unlock() {
        let ledger = ledger();
        ledger.mark_ad_watched(1).await.unwrap();
        let gate = FeatureGate::new(&ledger);

        let Admission::Admitted(attempt) = gate.begin(1, 10).await.unwrap() else {
            panic!("expected admission");
        };
        assert_eq!(attempt.allowed_by(), AllowedBy::AdUnlock);
        assert_eq!(
            ledger.get_or_create(1).await.unwrap().ad_unlocks_remaining,
            AD_UNLOCK_PER_VIEW - 1
        );

        assert!(attempt.fail().await.unwrap());
        assert_eq!(
            ledger.get_or_create(1).await.unwrap().ad_unlocks_remaining,
            AD_UNLOCK_PER_VIEW
        );
    }

    #[tokio::test]
    async fn test_completed_attempt_keeps_unlock_spent() {
        let ledger = ledger();
        ledger.mark_ad_watched(2).await.unwrap();
        let gate = FeatureGate::new(&ledger);

        let Admission::Admitted(attempt) = gate.begin(2, 10).await.unwrap() else {
            panic!("expected admission");
        };
        attempt.complete();

        assert_eq!(
            ledger.get_or_create(2).await.unwrap().ad_unlocks_remaining,
            AD_UNLOCK_PER_VIEW - 1
        );
    }

    #[tokio::test]
    async fn test_failed_free_tier_attempt_refunds_nothing() {
        let ledger = ledger();
        ledger.mark_ad_watched(3).await.unwrap();
        let gate = FeatureGate::new(&ledger);

        let Admission::Admitted(attempt) = gate.begin(3, 0).await.unwrap() else {
            panic!("expected admission");
        };
        assert_eq!(attempt.user_id(), 3);
        assert!(!attempt.fail().await.unwrap());
        assert_eq!(
            ledger.get_or_create(3).await.unwrap().ad_unlocks_remaining,
            AD_UNLOCK_PER_VIEW
        );
    }

    #[tokio::test]
    async fn test_paid_plan_attempt() {
        let ledger = ledger();
        ledger.set_plan(4, Plan::Enterprise).await.unwrap();
        let gate = FeatureGate::new(&ledger);

        let Admission::Admitted(attempt) = gate.begin(4, 500).await.unwrap() else {
            panic!("expected admission");
        };
        assert_eq!(attempt.allowed_by(), AllowedBy::PaidPlan);
        assert!(!attempt.fail().await.unwrap());
    }

    #[tokio::test]
    async fn test_denied_carries_decision() {
        let ledger = ledger();
        let gate = FeatureGate::new(&ledger);

        let admission = gate.begin(5, 10).await.unwrap();
        assert!(matches!(admission, Admission::Denied(QuotaDecision::NeedAdView)));
    }
}
