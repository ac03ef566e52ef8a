//! Plan policy.
//!
//! Static mapping from subscription plan to price, entitlement duration and
//! upgrade priority, plus the payment-method vocabulary accepted at checkout.
//!
//! ```rust
//! use dogai_billing::billing::{Plan, PaymentMethod};
//!
//! let plan: Plan = "Pro".parse().unwrap();
//! assert_eq!(plan.price_vnd(), 99_000);
//! assert_eq!(plan.entitlement_days(), Some(30));
//! assert!(Plan::Enterprise.priority() > plan.priority());
//!
//! let method: PaymentMethod = "momo".parse().unwrap();
//! assert_eq!(method.as_str(), "momo");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::BillingError;

/// Subscription plan held by a quota record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Metered by the free-tier counter and ad unlocks.
    #[default]
    Free,
    Basic,
    Pro,
    /// Contact-sales plan, never auto-priced.
    Enterprise,
}

impl Plan {
    /// Every plan, lowest priority first.
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Basic, Plan::Pro, Plan::Enterprise];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Paid plans bypass the free-tier counter entirely.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }

    /// Whether checkout may create an order for this plan.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.is_paid()
    }

    /// Price in VND. Enterprise is priced by sales, so it is 0 here.
    #[must_use]
    pub fn price_vnd(&self) -> u64 {
        match self {
            Self::Basic => 49_000,
            Self::Pro => 99_000,
            Self::Free | Self::Enterprise => 0,
        }
    }

    /// Intended entitlement length after a confirmed purchase.
    ///
    /// Informational only: quota records do not persist an expiry.
    #[must_use]
    pub fn entitlement_days(&self) -> Option<u32> {
        match self {
            Self::Free => None,
            Self::Basic => Some(7),
            Self::Pro => Some(30),
            Self::Enterprise => Some(90),
        }
    }

    /// Rank used when several paid orders compete for the same user.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Basic => 1,
            Self::Pro => 2,
            Self::Enterprise => 3,
        }
    }
}

impl FromStr for Plan {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(BillingError::UnknownPlan {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pick the plan that wins among several, by [`Plan::priority`].
///
/// On equal priority the first one seen is kept.
pub fn highest_priority(plans: impl IntoIterator<Item = Plan>) -> Option<Plan> {
    plans.into_iter().fold(None, |best, plan| match best {
        Some(current) if current.priority() >= plan.priority() => Some(current),
        _ => Some(plan),
    })
}

/// How the user intends to pay for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// VietQR bank transfer.
    #[default]
    Qr,
    Momo,
    Vnpay,
    Bank,
    Card,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Qr,
        PaymentMethod::Momo,
        PaymentMethod::Vnpay,
        PaymentMethod::Bank,
        PaymentMethod::Card,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Momo => "momo",
            Self::Vnpay => "vnpay",
            Self::Bank => "bank",
            Self::Card => "card",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qr" => Ok(Self::Qr),
            "momo" => Ok(Self::Momo),
            "vnpay" => Ok(Self::Vnpay),
            "bank" => Ok(Self::Bank),
            "card" => Ok(Self::Card),
            _ => Err(BillingError::UnknownPaymentMethod {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_table() {
        assert_eq!(Plan::Basic.price_vnd(), 49_000);
        assert_eq!(Plan::Pro.price_vnd(), 99_000);
        assert_eq!(Plan::Enterprise.price_vnd(), 0);
        assert_eq!(Plan::Free.price_vnd(), 0);
    }

    #[test]
    fn test_entitlement_days() {
        assert_eq!(Plan::Free.entitlement_days(), None);
        assert_eq!(Plan::Basic.entitlement_days(), Some(7));
        assert_eq!(Plan::Pro.entitlement_days(), Some(30));
        assert_eq!(Plan::Enterprise.entitlement_days(), Some(90));
    }

    #[test]
    fn test_plan_parse() {
        assert_eq!("free".parse::<Plan>().unwrap(), Plan::Free);
        assert_eq!(" PRO ".parse::<Plan>().unwrap(), Plan::Pro);
        assert_eq!("Enterprise".parse::<Plan>().unwrap(), Plan::Enterprise);
        assert_eq!(
            "gold".parse::<Plan>().unwrap_err(),
            BillingError::UnknownPlan {
                value: "gold".to_string()
            }
        );

        for plan in Plan::ALL {
            assert_eq!(plan.as_str().parse::<Plan>().unwrap(), plan);
        }
    }

    #[test]
    fn test_purchasable() {
        assert!(!Plan::Free.is_purchasable());
        assert!(Plan::Basic.is_purchasable());
        assert!(Plan::Enterprise.is_purchasable());
    }

    #[test]
    fn test_highest_priority() {
        assert_eq!(highest_priority([]), None);
        assert_eq!(
            highest_priority([Plan::Basic, Plan::Enterprise, Plan::Pro]),
            Some(Plan::Enterprise)
        );
        assert_eq!(highest_priority([Plan::Pro, Plan::Basic, Plan::Pro]), Some(Plan::Pro));
        assert_eq!(highest_priority([Plan::Free]), Some(Plan::Free));
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("QR".parse::<PaymentMethod>().unwrap(), PaymentMethod::Qr);
        assert_eq!("vnpay".parse::<PaymentMethod>().unwrap(), PaymentMethod::Vnpay);
        assert!(matches!(
            "paypal".parse::<PaymentMethod>(),
            Err(BillingError::UnknownPaymentMethod { .. })
        ));

        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Plan::Enterprise).unwrap(), "\"enterprise\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::Momo).unwrap(), "\"momo\"");
    }
}
