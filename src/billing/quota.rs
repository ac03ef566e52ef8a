//! Quota ledger.
//!
//! Gates the recognition feature behind a free-tier counter and an ad-credit
//! economy. Free users get [`FREE_PREDICTIONS`] uses, then may watch up to
//! [`MAX_AD_VIEWS`] rewarded ads, each crediting [`AD_UNLOCK_PER_VIEW`] extra
//! uses. Paid plans are never metered.
//!
//! The running usage total is owned by the caller and passed in; the ledger
//! only persists plan and ad counters.

use serde::{Deserialize, Serialize};

use super::audit::{LedgerAuditEvent, LedgerAuditLogger, TracingAuditLogger};
use super::error::BillingError;
use super::plans::Plan;
use super::storage::{QuotaRecord, QuotaStore};
use crate::error::Result;

/// Feature uses granted to every free user.
pub const FREE_PREDICTIONS: u32 = 10;
/// Rewarded ads a free user may watch in total.
pub const MAX_AD_VIEWS: u32 = 3;
/// Extra uses credited per watched ad.
pub const AD_UNLOCK_PER_VIEW: u32 = 3;

/// What allowed a feature use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedBy {
    PaidPlan,
    FreeTier,
    /// One ad unlock was spent. A failed attempt owes a refund.
    AdUnlock,
}

/// Outcome of a quota check. Exhaustion is a decision, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "allowed_by")]
pub enum QuotaDecision {
    Allowed(AllowedBy),
    /// Free uses and unlocks are gone but ad views remain.
    NeedAdView,
    /// Nothing left on the free plan.
    NeedUpgrade,
}

impl QuotaDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    /// Whether this decision spent an ad unlock.
    #[must_use]
    pub fn spent_unlock(&self) -> bool {
        matches!(self, Self::Allowed(AllowedBy::AdUnlock))
    }
}

/// Result of the ad-completion flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdViewOutcome {
    /// The user is on a paid plan; nothing was credited.
    NotNeeded,
    /// The view was credited.
    Unlocked(QuotaRecord),
    /// The ad limit is reached; nothing changed.
    Exhausted,
}

/// Read-only quota panel for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSummary {
    pub plan: Plan,
    pub free_limit: u32,
    pub used: u64,
    pub remaining_free: u32,
    pub ad_views_used: u32,
    pub ad_views_limit: u32,
    pub ad_views_remaining: u32,
    pub ad_unlocks_remaining: u32,
}

impl QuotaSummary {
    fn from_record(record: &QuotaRecord, total_used: u64) -> Self {
        let used_free = u32::try_from(total_used).unwrap_or(u32::MAX);
        Self {
            plan: record.plan,
            free_limit: FREE_PREDICTIONS,
            used: total_used,
            remaining_free: FREE_PREDICTIONS.saturating_sub(used_free),
            ad_views_used: record.ad_views_used,
            ad_views_limit: MAX_AD_VIEWS,
            ad_views_remaining: MAX_AD_VIEWS.saturating_sub(record.ad_views_used),
            ad_unlocks_remaining: record.ad_unlocks_remaining,
        }
    }
}

/// Per-user quota ledger over a [`QuotaStore`].
pub struct QuotaLedger<S: QuotaStore, A: LedgerAuditLogger = TracingAuditLogger> {
    store: S,
    audit: A,
}

impl<S: QuotaStore> QuotaLedger<S> {
    /// Create a ledger that audits through `tracing`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            audit: TracingAuditLogger,
        }
    }
}

impl<S: QuotaStore, A: LedgerAuditLogger> QuotaLedger<S, A> {
    /// Replace the audit logger.
    #[must_use]
    pub fn with_audit_logger<B: LedgerAuditLogger>(self, audit: B) -> QuotaLedger<S, B> {
        QuotaLedger {
            store: self.store,
            audit,
        }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the user's record, creating the default free record if absent.
    pub async fn get_or_create(&self, user_id: i64) -> Result<QuotaRecord> {
        let record = self.store.get_or_create_quota(user_id).await?;
        tracing::debug!(
            user_id,
            plan = %record.plan,
            ad_views_used = record.ad_views_used,
            ad_unlocks_remaining = record.ad_unlocks_remaining,
            "Loaded quota record"
        );
        Ok(record)
    }

    /// Set the user's plan. Ad counters are kept.
    pub async fn set_plan(&self, user_id: i64, plan: Plan) -> Result<()> {
        self.store.set_plan(user_id, plan).await?;
        tracing::info!(user_id, plan = %plan, "Plan updated");
        self.audit
            .log(LedgerAuditEvent::PlanChanged { user_id, plan })
            .await;
        Ok(())
    }

    /// Credit one watched ad.
    ///
    /// Returns the updated record, or `None` when the ad limit is already
    /// reached (no mutation).
    pub async fn mark_ad_watched(&self, user_id: i64) -> Result<Option<QuotaRecord>> {
        self.store.get_or_create_quota(user_id).await?;

        match self
            .store
            .increment_ad_views(user_id, MAX_AD_VIEWS, AD_UNLOCK_PER_VIEW)
            .await?
        {
            Some(record) => {
                tracing::info!(
                    user_id,
                    ad_views_used = record.ad_views_used,
                    ad_unlocks_remaining = record.ad_unlocks_remaining,
                    "Ad view credited"
                );
                self.audit
                    .log(LedgerAuditEvent::AdWatched {
                        user_id,
                        ad_views_used: record.ad_views_used,
                        ad_unlocks_remaining: record.ad_unlocks_remaining,
                    })
                    .await;
                Ok(Some(record))
            }
            None => {
                tracing::warn!(user_id, max_ad_views = MAX_AD_VIEWS, "Ad views exhausted");
                self.audit
                    .log(LedgerAuditEvent::AdViewsExhausted { user_id })
                    .await;
                Ok(None)
            }
        }
    }

    /// Spend one ad unlock if any remain.
    pub async fn consume_ad_unlock(&self, user_id: i64) -> Result<bool> {
        let consumed = self.store.try_consume_unlock(user_id).await?;
        if consumed {
            tracing::info!(user_id, "Ad unlock consumed");
            self.audit
                .log(LedgerAuditEvent::AdUnlockConsumed { user_id })
                .await;
        } else {
            tracing::debug!(user_id, "No ad unlock to consume");
        }
        Ok(consumed)
    }

    /// Give back one unlock after a failed attempt.
    ///
    /// Callers must pair this with exactly one successful
    /// [`consume_ad_unlock`](Self::consume_ad_unlock); prefer
    /// [`FeatureGate`](super::FeatureGate), which enforces that.
    pub async fn refund_ad_unlock(&self, user_id: i64) -> Result<()> {
        if !self.store.refund_unlock(user_id).await? {
            return Err(BillingError::QuotaRecordMissing { user_id }.into());
        }
        tracing::warn!(user_id, "Ad unlock refunded");
        self.audit
            .log(LedgerAuditEvent::AdUnlockRefunded { user_id })
            .await;
        Ok(())
    }

    /// Decide whether the user may use the feature now.
    ///
    /// `total_used` is the caller's count of prior successful uses. When the
    /// free tier is spent this consumes one ad unlock if available.
    pub async fn check_quota(&self, user_id: i64, total_used: u64) -> Result<QuotaDecision> {
        let record = self.get_or_create(user_id).await?;

        let decision = if record.plan.is_paid() {
            QuotaDecision::Allowed(AllowedBy::PaidPlan)
        } else if total_used < u64::from(FREE_PREDICTIONS) {
            QuotaDecision::Allowed(AllowedBy::FreeTier)
        } else if self.consume_ad_unlock(user_id).await? {
            QuotaDecision::Allowed(AllowedBy::AdUnlock)
        } else if record.ad_views_used < MAX_AD_VIEWS {
            QuotaDecision::NeedAdView
        } else {
            QuotaDecision::NeedUpgrade
        };

        tracing::debug!(user_id, total_used, ?decision, "Quota checked");
        Ok(decision)
    }

    /// Ad-completion flow: paid users are not credited, free users go
    /// through [`mark_ad_watched`](Self::mark_ad_watched).
    pub async fn watch_ad(&self, user_id: i64) -> Result<AdViewOutcome> {
        let record = self.get_or_create(user_id).await?;
        if record.plan.is_paid() {
            tracing::debug!(user_id, plan = %record.plan, "Ad view not needed on paid plan");
            return Ok(AdViewOutcome::NotNeeded);
        }

        Ok(match self.mark_ad_watched(user_id).await? {
            Some(record) => AdViewOutcome::Unlocked(record),
            None => AdViewOutcome::Exhausted,
        })
    }

    /// Quota panel for the user.
    pub async fn summary(&self, user_id: i64, total_used: u64) -> Result<QuotaSummary> {
        let record = self.get_or_create(user_id).await?;
        Ok(QuotaSummary::from_record(&record, total_used))
    }
}
