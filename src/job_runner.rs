use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    application::reconciliation_service::{ClientRunSummary, ReconciliationService},
    config::{AppConfig, StorageBackend},
    domain::{
        error::IngestionError,
        models::Client,
        ports::{ClientRepository, ProgressSink, ReportRepository},
    },
    infrastructure::{
        filesystem::DirectoryReportSource,
        memory::InMemoryStore,
        parsers::{parser_adapter::ParserAdapter, report_layout::validate_layout},
        postgres::{self, client_repo::PgClientRepository, report_repo::PgReportRepository},
    },
    logging::TracingProgress,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub clients_total: usize,
    pub clients_failed: usize,
    pub reports_written: usize,
    pub reports_failed: usize,
    pub lines_written: u64,
    pub mappings_learned: u64,
}

impl JobSummary {
    fn absorb(&mut self, run: &ClientRunSummary) {
        self.reports_written += run.reports_written;
        self.reports_failed += run.reports_failed;
        self.lines_written += run.lines_written;
        self.mappings_learned += run.mappings_learned;
    }
}

/// Processes every client of one marketplace, a bounded number at a time.
pub struct JobRunner {
    service: Arc<ReconciliationService>,
    clients: Arc<dyn ClientRepository>,
    progress: Arc<dyn ProgressSink>,
    marketplace: String,
    max_parallel_clients: usize,
    run_id: Uuid,
}

impl JobRunner {
    pub fn new(
        service: Arc<ReconciliationService>,
        clients: Arc<dyn ClientRepository>,
        progress: Arc<dyn ProgressSink>,
        marketplace: impl Into<String>,
        max_parallel_clients: usize,
    ) -> Self {
        Self {
            service,
            clients,
            progress,
            marketplace: marketplace.into(),
            max_parallel_clients: max_parallel_clients.max(1),
            run_id: Uuid::new_v4(),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, IngestionError> {
        debug!("Initializing job runner");
        validate_layout()?;
        config.validate()?;

        let run_id = Uuid::new_v4();
        let progress: Arc<dyn ProgressSink> = Arc::new(TracingProgress::new(run_id));
        let source = Arc::new(DirectoryReportSource::new(config.reports_dir.clone()));
        let parser = Arc::new(ParserAdapter::new());
        info!("Reading downloaded reports from {}", config.reports_dir.display());

        let (clients, reports): (Arc<dyn ClientRepository>, Arc<dyn ReportRepository>) = match config.storage {
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| IngestionError::Config("DATABASE_URL is not set".to_string()))?;
                let pool = postgres::connect(url, config.db_max_connections).await?;
                if config.run_migrations {
                    postgres::run_migrations(&pool).await?;
                }
                let clients: Arc<dyn ClientRepository> = Arc::new(PgClientRepository::new(pool.clone()));
                let reports: Arc<dyn ReportRepository> = Arc::new(PgReportRepository::new(pool));
                debug!("PostgreSQL repositories initialized");
                (clients, reports)
            }
            StorageBackend::Memory => {
                warn!("Using the in-memory store: nothing will be persisted");
                let store = Arc::new(InMemoryStore::with_clients(config.seed_clients.clone()));
                let clients: Arc<dyn ClientRepository> = store.clone();
                let reports: Arc<dyn ReportRepository> = store;
                (clients, reports)
            }
        };

        let service = ReconciliationService::new(source, parser, clients.clone(), reports, progress.clone())
            .with_retry_policy(config.retry.policy())
            .with_report_id_policy(config.report_id_policy);

        let mut runner = Self::new(
            Arc::new(service),
            clients,
            progress,
            config.marketplace.clone(),
            config.max_parallel_clients,
        );
        runner.run_id = run_id;
        Ok(runner)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Runs all clients. A failing client is reported and does not stop the
    /// others; only failing to list the clients, after retries, fails the job.
    pub async fn run(&self) -> Result<JobSummary, IngestionError> {
        info!("Starting run {} for marketplace {}", self.run_id, self.marketplace);
        let repo = &self.clients;
        let marketplace = self.marketplace.as_str();
        let clients = self
            .service
            .retry_policy()
            .call("list_clients", move || repo.list_clients(Some(marketplace)))
            .await?;
        let mut summary = JobSummary {
            clients_total: clients.len(),
            ..Default::default()
        };
        if clients.is_empty() {
            self.progress
                .info(&format!("No clients registered for {}", self.marketplace));
            return Ok(summary);
        }

        let permits = Arc::new(Semaphore::new(self.max_parallel_clients));
        let mut tasks = JoinSet::new();
        for client in clients {
            let service = self.service.clone();
            let permits = permits.clone();
            tasks.spawn(run_client(service, permits, client));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((client, Ok(run))) => {
                    debug!("Client {} finished: {:?}", client.client_id, run);
                    summary.absorb(&run);
                }
                Ok((client, Err(e))) => {
                    summary.clients_failed += 1;
                    self.report_client_failure(&client, &e);
                }
                Err(e) => {
                    summary.clients_failed += 1;
                    error!("Client task crashed: {}", e);
                    self.progress.error(&format!("Client task crashed: {}", e));
                }
            }
        }

        self.progress.info(&format!(
            "Report collection finished: {} clients, {} failed, {} reports written, {} lines",
            summary.clients_total, summary.clients_failed, summary.reports_written, summary.lines_written
        ));
        Ok(summary)
    }

    fn report_client_failure(&self, client: &Client, e: &IngestionError) {
        error!("Client {} failed: {}", client.client_id, e);
        self.progress.error(&format!(
            "Report collection for {} (client {}) aborted: {}",
            client.name_company, client.client_id, e
        ));
    }
}

/// Processes one client once a concurrency permit is free.
async fn run_client(
    service: Arc<ReconciliationService>,
    permits: Arc<Semaphore>,
    client: Client,
) -> (Client, Result<ClientRunSummary, IngestionError>) {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            let err = IngestionError::Runtime(format!("client permits unavailable: {}", e));
            return (client, Err(err));
        }
    };
    let result = service.process_client(&client).await;
    (client, result)
}
