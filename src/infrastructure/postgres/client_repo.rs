use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::{debug, error};

use super::storage_error;
use crate::domain::{error::IngestionError, models::Client, ports::ClientRepository};

pub struct PgClientRepository {
    pool: PgPool,
}

impl PgClientRepository {
    pub fn new(pool: PgPool) -> Self {
        debug!("Initializing PostgreSQL client repository");
        Self { pool }
    }
}

#[async_trait]
impl ClientRepository for PgClientRepository {
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, IngestionError> {
        debug!("Looking up client {}", client_id);
        sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, marketplace, api_key, name_company, entrepreneur
            FROM clients
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load client {}: {}", client_id, e);
            storage_error(e)
        })
    }

    async fn list_clients(&self, marketplace: Option<&str>) -> Result<Vec<Client>, IngestionError> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, marketplace, api_key, name_company, entrepreneur
            FROM clients
            WHERE $1::text IS NULL OR marketplace = $1
            ORDER BY client_id
            "#,
        )
        .bind(marketplace)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list clients: {}", e);
            storage_error(e)
        })?;

        debug!("Loaded {} clients for marketplace {:?}", clients.len(), marketplace);
        Ok(clients)
    }
}
