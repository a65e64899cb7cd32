use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::retry::RetryPolicy;
use crate::domain::{error::IngestionError, models::Client, report_id::ReportIdPolicy};

pub const CONFIG_PATH_VAR: &str = "WB_INGEST_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(IngestionError::Config(format!("unknown storage backend '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_secs: 10,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.delay_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub marketplace: String,
    pub reports_dir: PathBuf,
    pub max_parallel_clients: usize,
    pub report_id_policy: ReportIdPolicy,
    pub retry: RetryConfig,
    /// Clients provisioned into the in-memory backend for dry runs.
    pub seed_clients: Vec<Client>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Postgres,
            database_url: None,
            db_max_connections: 5,
            run_migrations: true,
            marketplace: "Wildberries".to_string(),
            reports_dir: PathBuf::from("reports"),
            max_parallel_clients: 1,
            report_id_policy: ReportIdPolicy::AfterNumberSign,
            retry: RetryConfig::default(),
            seed_clients: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, IngestionError> {
        serde_yaml::from_str(yaml).map_err(|e| IngestionError::Config(e.to_string()))
    }

    /// Optional YAML file named by `WB_INGEST_CONFIG`, then environment
    /// overrides.
    pub fn load() -> Result<Self, IngestionError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => {
                info!("Loading configuration from {}", path);
                let yaml = std::fs::read_to_string(&path)
                    .map_err(|e| IngestionError::Config(format!("cannot read {}: {}", path, e)))?;
                Self::from_yaml_str(&yaml)?
            }
            Err(_) => {
                debug!("{} not set, using defaults", CONFIG_PATH_VAR);
                Self::default()
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), IngestionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("STORAGE_BACKEND") {
            self.storage = v.parse()?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = Some(v);
        }
        if let Some(v) = lookup("DB_MAX_CONNECTIONS") {
            self.db_max_connections = parse_var("DB_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("RUN_MIGRATIONS") {
            self.run_migrations = parse_var("RUN_MIGRATIONS", &v)?;
        }
        if let Some(v) = lookup("MARKETPLACE") {
            self.marketplace = v;
        }
        if let Some(v) = lookup("REPORTS_DIR") {
            self.reports_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MAX_PARALLEL_CLIENTS") {
            self.max_parallel_clients = parse_var("MAX_PARALLEL_CLIENTS", &v)?;
        }
        if let Some(v) = lookup("REPORT_ID_POLICY") {
            self.report_id_policy = v.parse()?;
        }
        if let Some(v) = lookup("RETRY_MAX_RETRIES") {
            self.retry.max_retries = parse_var("RETRY_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("RETRY_DELAY_SECS") {
            self.retry.delay_secs = parse_var("RETRY_DELAY_SECS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), IngestionError> {
        if self.storage == StorageBackend::Postgres && self.database_url.is_none() {
            return Err(IngestionError::Config(
                "DATABASE_URL is required for the postgres backend".to_string(),
            ));
        }
        if self.max_parallel_clients == 0 {
            return Err(IngestionError::Config("max_parallel_clients must be at least 1".to_string()));
        }
        if self.db_max_connections == 0 {
            return Err(IngestionError::Config("db_max_connections must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, IngestionError> {
    value
        .trim()
        .parse()
        .map_err(|_| IngestionError::Config(format!("invalid value '{}' for {}", value, name)))
}
