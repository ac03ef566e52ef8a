use sea_orm_migration::{MigrationTrait, MigratorTrait};

use super::m20260101_000001_create_ledger_tables;
use crate::error::{LedgerError, Result};

/// Schema migrations for the ledger tables.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260101_000001_create_ledger_tables::Migration)]
    }
}

/// Run pending migrations
///
/// # Example
///
/// ```rust,ignore
/// use dogai_billing::database::{connect, run_migrations, Migrator};
///
/// let db = connect(&config.database).await?;
/// run_migrations::<Migrator>(&db).await?;
/// ```
pub async fn run_migrations<M: MigratorTrait>(db: &sea_orm::DatabaseConnection) -> Result<()> {
    M::up(db, None)
        .await
        .map_err(|e| LedgerError::storage(format!("Migration failed: {}", e)))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// Rollback the last `steps` migrations (default one).
pub async fn rollback_migration<M: MigratorTrait>(
    db: &sea_orm::DatabaseConnection,
    steps: Option<u32>,
) -> Result<()> {
    M::down(db, steps)
        .await
        .map_err(|e| LedgerError::storage(format!("Rollback failed: {}", e)))?;

    tracing::info!("Rolled back {} migration(s)", steps.unwrap_or(1));
    Ok(())
}
