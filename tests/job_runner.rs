mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{client, csv_bytes, date, key, row, FakeSource};
use wb_report_ingestion::application::{reconciliation_service::ReconciliationService, retry::RetryPolicy};
use wb_report_ingestion::domain::{error::IngestionError, models::Client, ports::ClientRepository};
use wb_report_ingestion::infrastructure::{memory::InMemoryStore, parsers::parser_adapter::ParserAdapter};
use wb_report_ingestion::job_runner::JobRunner;
use wb_report_ingestion::logging::RecordingProgress;

/// Client registry whose first listing hits a dropped connection.
struct FlakyClients {
    inner: Arc<InMemoryStore>,
    listings: AtomicU32,
}

#[async_trait]
impl ClientRepository for FlakyClients {
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, IngestionError> {
        self.inner.get_client(client_id).await
    }

    async fn list_clients(&self, marketplace: Option<&str>) -> Result<Vec<Client>, IngestionError> {
        if self.listings.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(IngestionError::TransientStorage("connection reset".into()));
        }
        self.inner.list_clients(marketplace).await
    }
}

fn runner(source: Arc<FakeSource>, store: Arc<InMemoryStore>, progress: Arc<RecordingProgress>) -> JobRunner {
    let service = ReconciliationService::new(
        source,
        Arc::new(ParserAdapter::new()),
        store.clone(),
        store.clone(),
        progress.clone(),
    )
    .with_retry_policy(RetryPolicy::new(1, Duration::ZERO));
    JobRunner::new(Arc::new(service), store, progress, "Wildberries", 2)
}

#[tokio::test]
async fn one_failing_client_does_not_stop_the_others() {
    let source = Arc::new(FakeSource::default());
    source.add_csv("c-1", "№11", date(6), csv_bytes(&[row("A", "Продажа", ""), row("B", "Продажа", "")]));
    source.add_csv("c-3", "№31", date(6), csv_bytes(&[row("C", "Хранение", "")]));
    source.break_listing("c-2");

    let store = Arc::new(InMemoryStore::with_clients([client("c-1"), client("c-2"), client("c-3")]));
    let progress = Arc::new(RecordingProgress::new());

    let summary = runner(source, store.clone(), progress.clone()).run().await.unwrap();

    assert_eq!(summary.clients_total, 3);
    assert_eq!(summary.clients_failed, 1);
    assert_eq!(summary.reports_written, 2);
    assert_eq!(summary.lines_written, 3);
    assert_eq!(summary.mappings_learned, 2);

    assert_eq!(store.lines_for(&key("c-1", date(6), "11")).len(), 2);
    assert_eq!(store.lines_for(&key("c-3", date(6), "31")).len(), 1);

    let errors = progress.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("c-2"));
}

#[tokio::test]
async fn only_clients_of_the_marketplace_are_processed() {
    let source = Arc::new(FakeSource::default());
    source.add_csv("ozon-1", "1", date(1), csv_bytes(&[row("A", "Продажа", "")]));

    let other = Client {
        marketplace: "Ozon".to_string(),
        ..client("ozon-1")
    };
    let store = Arc::new(InMemoryStore::with_clients([other]));
    let progress = Arc::new(RecordingProgress::new());

    let summary = runner(source, store.clone(), progress).run().await.unwrap();

    assert_eq!(summary.clients_total, 0);
    assert!(store.lines().is_empty());
}

#[tokio::test]
async fn client_listing_is_retried_after_a_transient_failure() {
    let source = Arc::new(FakeSource::default());
    source.add_csv("c-1", "5", date(2), csv_bytes(&[row("A", "Продажа", "")]));
    let store = Arc::new(InMemoryStore::with_clients([client("c-1")]));
    let progress = Arc::new(RecordingProgress::new());
    let flaky = Arc::new(FlakyClients {
        inner: store.clone(),
        listings: AtomicU32::new(0),
    });

    let service = ReconciliationService::new(
        source,
        Arc::new(ParserAdapter::new()),
        store.clone(),
        store.clone(),
        progress.clone(),
    )
    .with_retry_policy(RetryPolicy::new(1, Duration::ZERO));
    let runner = JobRunner::new(Arc::new(service), flaky.clone(), progress, "Wildberries", 1);

    let summary = runner.run().await.unwrap();

    assert_eq!(flaky.listings.load(Ordering::SeqCst), 2);
    assert_eq!(summary.clients_total, 1);
    assert_eq!(summary.reports_written, 1);
    assert_eq!(store.lines_for(&key("c-1", date(2), "5")).len(), 1);
}
