//! DOG AI billing - quota ledger, payment orders and VietQR payloads
//!
//! The crate tracks how many feature uses each user has left, lets free users
//! earn a few more by watching rewarded ads, sells plan upgrades through
//! payment orders, and encodes the VietQR (EMVCo) payload a banking app scans
//! to pay them.
//!
//! # Modules
//!
//! - **billing**: quota ledger, feature gate, orders and checkout
//! - **vietqr**: EMVCo TLV payload encoder with CRC16
//! - **database**: SeaORM connection, migrations and config
//! - **testing**: SQLite in-memory test database
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dogai_billing::billing::{CheckoutManager, SeaOrmLedgerStore};
//! use dogai_billing::database::connect;
//! use dogai_billing::ConfigBuilder;
//!
//! #[tokio::main]
//! async fn main() -> dogai_billing::Result<()> {
//!     dogai_billing::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let db = connect(&config.database).await?;
//!
//!     let checkout = CheckoutManager::new(SeaOrmLedgerStore::new(db), config.vietqr.clone());
//!     let summary = checkout.ledger().summary(42, 0).await?;
//!     println!("{} free uses left", summary.remaining_free);
//!     Ok(())
//! }
//! ```

#![allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds properly

pub mod billing;
mod config;
#[cfg(feature = "database")]
pub mod database;
mod error;
#[cfg(feature = "database")]
pub mod testing;
pub mod utils;
pub mod vietqr;

// Re-exports for public API
pub use config::{Config, ConfigBuilder, LoggingConfig, VietQrConfig};
pub use error::{LedgerError, Result};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// Call this once, early in `main()`. Later calls are ignored.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "dogai_billing=debug")
/// - `DOGAI_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .and_then(|v| utils::parse_bool_flag(&v))
        .unwrap_or(false);

    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing from a [`Config`]
///
/// `RUST_LOG` still wins over `config.logging.level` when set.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    install_subscriber(env_filter, config.logging.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
