//! Testing utilities
//!
//! SQLite in-memory databases with the ledger schema applied, for driving
//! [`SeaOrmLedgerStore`](crate::billing::SeaOrmLedgerStore) in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use dogai_billing::billing::QuotaLedger;
//! use dogai_billing::testing::TestDb;
//!
//! #[tokio::test]
//! async fn test_ledger() {
//!     let db = TestDb::new().await.expect("Failed to create test database");
//!     let ledger = QuotaLedger::new(db.store());
//!     assert_eq!(ledger.get_or_create(1).await.unwrap().ad_views_used, 0);
//! }
//! ```

mod database;

pub use database::TestDb;
