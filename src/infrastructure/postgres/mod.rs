pub mod client_repo;
pub mod report_repo;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{error, info};

use crate::domain::error::IngestionError;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, IngestionError> {
    info!("Connecting to PostgreSQL (max {} connections)", max_connections);
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to PostgreSQL: {}", e);
            storage_error(e)
        })
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), IngestionError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| IngestionError::Storage(format!("migration failed: {}", e)))?;
    info!("Database migrations completed");
    Ok(())
}

/// Maps a driver error onto the transient/non-transient split the retry
/// policy works with.
pub(crate) fn storage_error(e: sqlx::Error) -> IngestionError {
    let transient = match &e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db.code().map_or(false, |code| is_transient_sqlstate(&code)),
        _ => false,
    };
    if transient {
        IngestionError::TransientStorage(e.to_string())
    } else {
        IngestionError::Storage(e.to_string())
    }
}

fn is_transient_sqlstate(code: &str) -> bool {
    // class 08: connection exception
    code.starts_with("08")
        || matches!(code, "40001" | "40P01" | "55P03" | "57P01" | "57P02" | "57P03")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_are_transient() {
        assert!(storage_error(sqlx::Error::PoolTimedOut).is_transient());
        assert!(storage_error(sqlx::Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset))).is_transient());
        assert!(!storage_error(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn sqlstate_classes() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("40P01"));
        assert!(is_transient_sqlstate("55P03"));
        assert!(!is_transient_sqlstate("23505"));
        assert!(!is_transient_sqlstate("42P01"));
    }
}
