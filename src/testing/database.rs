//! Database testing utilities
//!
//! Each [`TestDb`] is a private SQLite in-memory database held open by a
//! single pooled connection, so tests never see each other's rows.

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::billing::SeaOrmLedgerStore;
use crate::database::Migrator;

const SQLITE_MEMORY_URL: &str = "sqlite::memory:";

/// Manages a test database connection
pub struct TestDb {
    pub connection: DatabaseConnection,
}

impl TestDb {
    /// Create a test database with the ledger tables
    pub async fn new() -> Result<Self, DbErr> {
        Self::new_with_migrator::<Migrator>().await
    }

    /// Create a test database and run `M`'s migrations
    pub async fn new_with_migrator<M: MigratorTrait>() -> Result<Self, DbErr> {
        let instance = Self::new_unmigrated().await?;
        M::up(&instance.connection, None).await?;
        Ok(instance)
    }

    /// Create an empty test database
    ///
    /// Use this when a test needs to run migrations itself.
    pub async fn new_unmigrated() -> Result<Self, DbErr> {
        // One connection: the in-memory database lives as long as it does,
        // and concurrent callers queue on it instead of seeing a fresh database
        let mut opt = ConnectOptions::new(SQLITE_MEMORY_URL);
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let connection = Database::connect(opt).await?;
        connection
            .execute_unprepared("PRAGMA busy_timeout=5000;")
            .await?;

        Ok(Self { connection })
    }

    /// Get a clone of the database connection
    pub fn connection(&self) -> DatabaseConnection {
        self.connection.clone()
    }

    /// Ledger store over this database
    pub fn store(&self) -> SeaOrmLedgerStore {
        SeaOrmLedgerStore::new(self.connection())
    }

    /// Seed the database with test data
    ///
    /// Executes the provided SQL statements in order.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let db = TestDb::new().await.unwrap();
    /// db.seed(&[
    ///     "INSERT INTO user_quota (user_id, plan, ad_views_used, ad_unlocks_remaining, updated_at) \
    ///      VALUES (1, 'free', 3, 0, '2026-01-01T00:00:00+00:00')",
    /// ]).await.unwrap();
    /// ```
    pub async fn seed(&self, statements: &[&str]) -> Result<(), DbErr> {
        for statement in statements {
            self.connection.execute_unprepared(statement).await?;
        }
        Ok(())
    }
}

/// Helper macro to create a migrated test database
///
/// # Example
///
/// ```rust,ignore
/// use dogai_billing::test_db;
///
/// #[tokio::test]
/// async fn my_test() {
///     let db = test_db!();
///     let store = db.store();
/// }
/// ```
#[macro_export]
macro_rules! test_db {
    () => {{
        $crate::testing::TestDb::new()
            .await
            .expect("Failed to create test database")
    }};
}
