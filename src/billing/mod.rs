//! Quota ledger, payment orders and checkout.
//!
//! Free users get a fixed number of feature uses, can watch a few rewarded ads
//! for extra uses, and upgrade by paying for an order that an admin (or the
//! demo flow) confirms.
//!
//! # Example
//!
//! ```rust,ignore
//! use dogai_billing::billing::{
//!     CheckoutManager, FeatureGate, Admission, PaymentMethod, Plan, SeaOrmLedgerStore,
//! };
//!
//! let store = SeaOrmLedgerStore::new(db);
//! let checkout = CheckoutManager::new(store, config.vietqr.clone());
//!
//! // Gate a feature use
//! let gate = FeatureGate::new(checkout.ledger());
//! match gate.begin(user_id, uses_so_far).await? {
//!     Admission::Admitted(attempt) => match run_prediction().await {
//!         Ok(_) => attempt.complete(),
//!         Err(_) => { attempt.fail().await?; }
//!     },
//!     Admission::Denied(decision) => return Ok(upsell(decision)),
//! }
//!
//! // Sell an upgrade
//! let order = checkout.checkout(user_id, Plan::Pro, PaymentMethod::Qr).await?;
//! ```

pub mod audit;
pub mod checkout;
pub mod error;
pub mod gate;
pub mod orders;
pub mod plans;
pub mod quota;
#[cfg(feature = "database")]
pub mod sea_orm_store;
pub mod storage;
pub mod validation;

// Plan exports
pub use plans::{highest_priority, PaymentMethod, Plan};

// Storage exports
pub use storage::{
    NewPaymentOrder, OrderStatus, OrderStore, PaymentOrder, QuotaRecord, QuotaStore,
};

// Ledger exports
pub use quota::{
    AdViewOutcome, AllowedBy, QuotaDecision, QuotaLedger, QuotaSummary, AD_UNLOCK_PER_VIEW,
    FREE_PREDICTIONS, MAX_AD_VIEWS,
};
pub use gate::{Admission, FeatureGate, UsageAttempt};

// Order exports
pub use orders::{generate_order_id, OrderManager};
pub use checkout::{Checkout, CheckoutManager, PaymentConfirmation};

// Audit exports
pub use audit::{LedgerAuditEvent, LedgerAuditLogger, NoOpAuditLogger, TracingAuditLogger};

// Error exports
pub use error::BillingError;

// SeaORM storage exports
#[cfg(feature = "database")]
pub use sea_orm_store::SeaOrmLedgerStore;

// Validation exports
pub use validation::validate_order_id;

// Test exports
#[cfg(any(test, feature = "test-billing"))]
pub use storage::test::InMemoryLedgerStore;
