//! Input validation for order operations.

use super::error::BillingError;
use crate::error::Result;

/// Maximum length for order IDs.
const MAX_ORDER_ID_LENGTH: usize = 64;

/// Validate an order ID before it is stored or looked up.
///
/// Order IDs must:
/// - Not be empty
/// - Not exceed 64 characters
/// - Contain only ASCII alphanumeric characters, underscores, and hyphens
///
/// Generated IDs are 12 lowercase hex characters and always pass.
///
/// # Errors
///
/// Returns `BillingError::InvalidOrderId` if validation fails.
pub fn validate_order_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(BillingError::InvalidOrderId {
            id: id.to_string(),
            reason: "order_id cannot be empty".to_string(),
        }
        .into());
    }

    if id.len() > MAX_ORDER_ID_LENGTH {
        return Err(BillingError::InvalidOrderId {
            id: sanitize_for_error(id),
            reason: format!("order_id exceeds maximum length of {}", MAX_ORDER_ID_LENGTH),
        }
        .into());
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(BillingError::InvalidOrderId {
            id: sanitize_for_error(id),
            reason: "order_id contains invalid characters".to_string(),
        }
        .into());
    }

    Ok(())
}

/// Sanitize a string for error messages to prevent log injection.
fn sanitize_for_error(s: &str) -> String {
    let sanitized: String = s
        .chars()
        .take(50)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '?'
            }
        })
        .collect();

    if s.chars().count() > 50 {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
