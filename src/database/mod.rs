//! Database connection pooling and schema management.
//!
//! SeaORM over PostgreSQL in production; SQLite works for tests and local
//! development.

pub mod config;
pub mod connection;
pub mod migration;
mod m20260101_000001_create_ledger_tables;

pub use config::{redact_database_url, DatabaseConfig};
pub use connection::{connect, ping};
pub use migration::{rollback_migration, run_migrations, Migrator};
pub use sea_orm;
