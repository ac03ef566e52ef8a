use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use super::config::DatabaseConfig;
use super::migration::{run_migrations, Migrator};
use crate::error::{LedgerError, Result};

/// Open a connection pool from config.
///
/// Runs the ledger migrations when `auto_migrate` is set.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(&config.url);
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);
    if config.idle_timeout > 0 {
        opt.idle_timeout(Duration::from_secs(config.idle_timeout));
    }

    let conn = Database::connect(opt).await.map_err(|e| {
        LedgerError::storage(format!(
            "Failed to connect to database {}: {}",
            config.redacted_url(),
            e
        ))
    })?;

    tracing::info!(
        url = %config.redacted_url(),
        max_connections = config.max_connections,
        "Database connected"
    );

    if config.auto_migrate {
        run_migrations::<Migrator>(&conn).await?;
    }

    Ok(conn)
}

/// Ping the database to check connection health
pub async fn ping(conn: &DatabaseConnection) -> Result<()> {
    conn.ping()
        .await
        .map_err(|e| LedgerError::storage(format!("Database ping failed: {}", e)))
}
