//! VietQR payload encoder (EMVCo Merchant-Presented Mode).
//!
//! Builds the text payload a bank app scans to pre-fill a NAPAS transfer.
//! Rendering the payload as a QR image is left to the caller.
//!
//! ```rust
//! use dogai_billing::vietqr::{VietQrRequest, verify_crc};
//!
//! let payload = VietQrRequest::new("970422", "9244424440709")
//!     .with_amount_vnd(99_000)
//!     .with_order_id("abc123def456")
//!     .build()
//!     .unwrap();
//!
//! assert!(payload.starts_with("000201010212"));
//! assert!(verify_crc(&payload));
//! ```
//!
//! # Fields
//!
//! | Tag | Content |
//! |-----|---------|
//! | 00 | Payload format, `01` |
//! | 01 | `12` with an amount, `11` without |
//! | 38 | NAPAS GUID, then BIN, account and service code |
//! | 52 | MCC `0000` |
//! | 53 | Currency `704` (VND) |
//! | 54 | Amount, only when non-zero |
//! | 58 | Country `VN` |
//! | 59 | Merchant name, max 25 |
//! | 60 | Merchant city, max 15 |
//! | 62 | Order id (max 25) and transfer purpose (max 25) |
//! | 63 | CRC16 |

mod crc;
mod tlv;

pub use crc::{crc16_ccitt_false, verify_crc};
pub use tlv::{decode_tlv, sanitize_ascii, tlv, TlvField};

use crate::billing::BillingError;
use crate::error::Result;

/// NAPAS application identifier carried in tag 38.
pub const NAPAS_GUID: &str = "A000000727";
/// Service code for transfers to an account number.
pub const SERVICE_CODE_TO_ACCOUNT: &str = "QRIBFTTA";
/// Service code for transfers to a card number.
pub const SERVICE_CODE_TO_CARD: &str = "QRIBFTTC";

pub const DEFAULT_MERCHANT_NAME: &str = "DOG AI APP";
pub const DEFAULT_MERCHANT_CITY: &str = "HANOI";
/// Transfer purpose prefix shown in the bank app.
pub const PURPOSE_PREFIX: &str = "DOGAI";

const MAX_MERCHANT_NAME: usize = 25;
const MAX_MERCHANT_CITY: usize = 15;
const MAX_ORDER_REF: usize = 25;
const MAX_PURPOSE: usize = 25;
const MAX_SERVICE_CODE: usize = 10;

/// Inputs for one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VietQrRequest {
    /// Six-digit bank identification number.
    pub bank_bin: String,
    pub account_number: String,
    /// Zero means a static QR without an amount.
    pub amount_vnd: u64,
    pub order_id: Option<String>,
    /// Holder name of the receiving account. Not encoded.
    pub account_name: String,
    pub merchant_name: String,
    pub merchant_city: String,
    pub service_code: String,
}

impl VietQrRequest {
    #[must_use]
    pub fn new(bank_bin: impl Into<String>, account_number: impl Into<String>) -> Self {
        Self {
            bank_bin: bank_bin.into(),
            account_number: account_number.into(),
            amount_vnd: 0,
            order_id: None,
            account_name: String::new(),
            merchant_name: DEFAULT_MERCHANT_NAME.to_string(),
            merchant_city: DEFAULT_MERCHANT_CITY.to_string(),
            service_code: SERVICE_CODE_TO_ACCOUNT.to_string(),
        }
    }

    #[must_use]
    pub fn with_amount_vnd(mut self, amount_vnd: u64) -> Self {
        self.amount_vnd = amount_vnd;
        self
    }

    #[must_use]
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    #[must_use]
    pub fn with_account_name(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = account_name.into();
        self
    }

    #[must_use]
    pub fn with_merchant_name(mut self, merchant_name: impl Into<String>) -> Self {
        self.merchant_name = merchant_name.into();
        self
    }

    #[must_use]
    pub fn with_merchant_city(mut self, merchant_city: impl Into<String>) -> Self {
        self.merchant_city = merchant_city.into();
        self
    }

    #[must_use]
    pub fn with_service_code(mut self, service_code: impl Into<String>) -> Self {
        self.service_code = service_code.into();
        self
    }

    /// Encode the payload. See [`build_payload`].
    pub fn build(&self) -> Result<String> {
        build_payload(self)
    }
}

/// Check a bank BIN: exactly six ASCII digits once surrounding whitespace is
/// trimmed. Returns the trimmed BIN.
pub fn validate_bank_bin(bank_bin: &str) -> Result<&str> {
    let bin = bank_bin.trim();
    if bin.len() != 6 || !bin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BillingError::InvalidBankBin {
            bin: sanitize_ascii(bank_bin, 16),
        }
        .into());
    }
    Ok(bin)
}

/// Build the VietQR payload string for `request`.
///
/// Deterministic. Only the BIN and account number are validated: the BIN must
/// be six digits and the account number non-empty ASCII, both after trimming.
/// Free-text fields and the service code are sanitized, and one that
/// sanitizes to nothing falls back to its default.
///
/// # Errors
///
/// Returns a validation error for a bad BIN or an empty account number.
pub fn build_payload(request: &VietQrRequest) -> Result<String> {
    let bank_bin = validate_bank_bin(&request.bank_bin)?;
    let account_number = request.account_number.trim();
    if account_number.is_empty() {
        return Err(BillingError::EmptyAccountNumber.into());
    }
    if !account_number.is_ascii() {
        return Err(BillingError::NonAsciiAccountNumber.into());
    }

    let merchant_name = non_empty_or(
        sanitize_ascii(&request.merchant_name, MAX_MERCHANT_NAME),
        DEFAULT_MERCHANT_NAME,
    );
    let merchant_city = non_empty_or(
        sanitize_ascii(&request.merchant_city, MAX_MERCHANT_CITY),
        DEFAULT_MERCHANT_CITY,
    );
    let order_id = request.order_id.as_deref().filter(|id| !id.is_empty());
    let service_code = non_empty_or(
        sanitize_ascii(&request.service_code, MAX_SERVICE_CODE),
        SERVICE_CODE_TO_ACCOUNT,
    );

    let beneficiary = [
        tlv("00", bank_bin),
        tlv("01", account_number),
        tlv("02", &service_code),
    ]
    .concat();
    let merchant_account = [tlv("00", NAPAS_GUID), tlv("01", &beneficiary)].concat();

    let mut payload = String::with_capacity(160);
    payload.push_str(&tlv("00", "01"));
    payload.push_str(&tlv("01", if request.amount_vnd > 0 { "12" } else { "11" }));
    payload.push_str(&tlv("38", &merchant_account));
    payload.push_str(&tlv("52", "0000"));
    payload.push_str(&tlv("53", "704"));
    if request.amount_vnd > 0 {
        payload.push_str(&tlv("54", &request.amount_vnd.to_string()));
    }
    payload.push_str(&tlv("58", "VN"));
    payload.push_str(&tlv("59", &merchant_name));
    payload.push_str(&tlv("60", &merchant_city));
    payload.push_str(&tlv("62", &additional_data(order_id)));

    payload.push_str(crc::CRC_FIELD_PREFIX);
    let checksum = crc::crc_hex(&payload);
    payload.push_str(&checksum);

    tracing::debug!(
        bank_bin,
        amount_vnd = request.amount_vnd,
        order_id = order_id.unwrap_or_default(),
        len = payload.len(),
        "Built VietQR payload"
    );
    Ok(payload)
}

/// Tag 62 template: order reference (01) when present, then purpose (08).
fn additional_data(order_id: Option<&str>) -> String {
    match order_id {
        Some(id) => {
            let purpose = format!("{} {}", PURPOSE_PREFIX, id);
            [
                tlv("01", &sanitize_ascii(id, MAX_ORDER_REF)),
                tlv("08", &sanitize_ascii(&purpose, MAX_PURPOSE)),
            ]
            .concat()
        }
        None => tlv("08", PURPOSE_PREFIX),
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}
