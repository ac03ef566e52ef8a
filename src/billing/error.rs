//! Billing-specific error types.
//!
//! Carries the domain detail of a failure; converts into [`LedgerError`]
//! by kind when it crosses the public API.

use std::fmt;

use crate::error::LedgerError;

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    // Payload validation
    /// The receiving bank BIN is not exactly six ASCII digits.
    InvalidBankBin { bin: String },
    /// The receiving account number is empty.
    EmptyAccountNumber,
    /// The receiving account number has characters outside ASCII.
    NonAsciiAccountNumber,
    /// The receiving account is not configured.
    MissingPayee,

    // Vocabulary
    /// The plan name is not one of free/basic/pro/enterprise.
    UnknownPlan { value: String },
    /// The payment method is not one of qr/momo/vnpay/bank/card.
    UnknownPaymentMethod { value: String },
    /// The plan exists but cannot be bought through checkout.
    PlanNotPurchasable { plan: String },

    // Orders
    /// The order id is malformed.
    InvalidOrderId { id: String, reason: String },
    /// An order with this id already exists.
    DuplicateOrder { order_id: String },
    /// No order with this id (or not visible to this user).
    OrderNotFound { order_id: String },

    // Ledger
    /// No quota record exists for the user.
    QuotaRecordMissing { user_id: i64 },

    /// An unexpected internal error occurred.
    Internal { message: String },
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBankBin { bin } => {
                write!(f, "Invalid bank BIN '{}': must be exactly 6 digits", bin)
            }
            Self::EmptyAccountNumber => write!(f, "Account number is required"),
            Self::NonAsciiAccountNumber => {
                write!(f, "Account number must contain only ASCII characters")
            }
            Self::MissingPayee => write!(f, "Receiving bank account is not configured"),
            Self::UnknownPlan { value } => write!(f, "Unknown plan: {}", value),
            Self::UnknownPaymentMethod { value } => {
                write!(f, "Unknown payment method: {}", value)
            }
            Self::PlanNotPurchasable { plan } => {
                write!(f, "Plan '{}' cannot be purchased", plan)
            }
            Self::InvalidOrderId { id, reason } => {
                write!(f, "Invalid order ID '{}': {}", id, reason)
            }
            Self::DuplicateOrder { order_id } => {
                write!(f, "Order '{}' already exists", order_id)
            }
            Self::OrderNotFound { order_id } => write!(f, "Order not found: {}", order_id),
            Self::QuotaRecordMissing { user_id } => {
                write!(f, "No quota record for user {}", user_id)
            }
            Self::Internal { message } => write!(f, "Internal billing error: {}", message),
        }
    }
}

impl std::error::Error for BillingError {}

impl From<BillingError> for LedgerError {
    fn from(err: BillingError) -> Self {
        match &err {
            BillingError::OrderNotFound { .. } | BillingError::QuotaRecordMissing { .. } => {
                LedgerError::NotFound(err.to_string())
            }

            BillingError::InvalidBankBin { .. }
            | BillingError::EmptyAccountNumber
            | BillingError::NonAsciiAccountNumber
            | BillingError::MissingPayee
            | BillingError::UnknownPlan { .. }
            | BillingError::UnknownPaymentMethod { .. }
            | BillingError::PlanNotPurchasable { .. }
            | BillingError::InvalidOrderId { .. }
            | BillingError::DuplicateOrder { .. } => LedgerError::ValidationFailed(err.to_string()),

            BillingError::Internal { .. } => LedgerError::Internal(err.to_string()),
        }
    }
}

impl BillingError {
    /// Check if the caller supplied bad input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::MissingPayee | Self::QuotaRecordMissing { .. } | Self::Internal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BillingError::InvalidBankBin {
            bin: "97042".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid bank BIN '97042': must be exactly 6 digits");

        let err = BillingError::DuplicateOrder {
            order_id: "abc123def456".to_string(),
        };
        assert_eq!(err.to_string(), "Order 'abc123def456' already exists");
    }

    #[test]
    fn test_error_classification() {
        let err = BillingError::UnknownPlan {
            value: "gold".to_string(),
        };
        assert!(err.is_client_error());
        assert!(BillingError::EmptyAccountNumber.is_client_error());

        assert!(!BillingError::QuotaRecordMissing { user_id: 7 }.is_client_error());
        assert!(!BillingError::MissingPayee.is_client_error());
    }

    #[test]
    fn test_convert_to_ledger_error() {
        let err: LedgerError = BillingError::OrderNotFound {
            order_id: "nope".to_string(),
        }
        .into();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err: LedgerError = BillingError::EmptyAccountNumber.into();
        assert!(matches!(err, LedgerError::ValidationFailed(_)));

        let err: LedgerError = BillingError::DuplicateOrder {
            order_id: "dup".to_string(),
        }
        .into();
        assert!(matches!(err, LedgerError::ValidationFailed(_)));

        let err: LedgerError = BillingError::Internal {
            message: "bad row".to_string(),
        }
        .into();
        assert!(matches!(err, LedgerError::Internal(_)));
    }
}
