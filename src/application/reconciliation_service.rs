use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::retry::RetryPolicy;
use crate::domain::{
    error::IngestionError,
    models::{Client, ReplaceOutcome, ReportCandidate, ReportKey, ReportLine},
    ports::{ClientRepository, ProgressSink, ReportParser, ReportRepository, ReportSource},
    report_id::ReportIdPolicy,
};

/// Per-client counters of one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientRunSummary {
    pub candidates: usize,
    pub unseen: usize,
    pub reports_written: usize,
    pub reports_failed: usize,
    pub lines_written: u64,
    pub mappings_learned: u64,
}

pub struct ReconciliationService {
    source: Arc<dyn ReportSource>,
    parser: Arc<dyn ReportParser>,
    clients: Arc<dyn ClientRepository>,
    reports: Arc<dyn ReportRepository>,
    progress: Arc<dyn ProgressSink>,
    retry: RetryPolicy,
    id_policy: ReportIdPolicy,
}

impl ReconciliationService {
    pub fn new(
        source: Arc<dyn ReportSource>,
        parser: Arc<dyn ReportParser>,
        clients: Arc<dyn ClientRepository>,
        reports: Arc<dyn ReportRepository>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            source,
            parser,
            clients,
            reports,
            progress,
            retry: RetryPolicy::default(),
            id_policy: ReportIdPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_report_id_policy(mut self, id_policy: ReportIdPolicy) -> Self {
        self.id_policy = id_policy;
        self
    }

    pub fn report_id_policy(&self) -> ReportIdPolicy {
        self.id_policy
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Report ids already stored for `client_id`.
    ///
    /// Fails with [`IngestionError::UnknownClient`] when the client is not
    /// provisioned.
    pub async fn persisted_report_ids(&self, client_id: &str) -> Result<HashSet<String>, IngestionError> {
        let clients = &self.clients;
        let known = self
            .retry
            .call("get_client", move || clients.get_client(client_id))
            .await?;
        if known.is_none() {
            return Err(IngestionError::UnknownClient(client_id.to_string()));
        }

        let reports = &self.reports;
        let ids = self
            .retry
            .call_with_rollback(
                "persisted_report_ids",
                move || reports.persisted_report_ids(client_id),
                move || reports.rollback(),
            )
            .await?;
        debug!("Client {} has {} persisted reports", client_id, ids.len());
        Ok(ids)
    }

    /// Portal candidates whose stripped id is not stored yet, oldest first.
    /// Duplicate listings of the same id are collapsed.
    pub async fn unseen_candidates(
        &self,
        client_id: &str,
        mut candidates: Vec<ReportCandidate>,
    ) -> Result<Vec<ReportCandidate>, IngestionError> {
        let persisted = self.persisted_report_ids(client_id).await?;
        candidates.sort_by_key(|c| c.created_on);

        let mut seen = HashSet::new();
        let unseen: Vec<ReportCandidate> = candidates
            .into_iter()
            .filter(|c| {
                let id = self.id_policy.strip(&c.raw_id);
                !persisted.contains(&id) && seen.insert(id)
            })
            .collect();

        debug!("Client {}: {} unseen candidates", client_id, unseen.len());
        Ok(unseen)
    }

    /// Atomically replaces the stored group under `key` with `lines`.
    pub async fn replace(&self, key: &ReportKey, lines: &[ReportLine]) -> Result<ReplaceOutcome, IngestionError> {
        let reports = &self.reports;
        self.retry
            .call_with_rollback(
                "replace_report",
                move || reports.replace_report(key, lines),
                move || reports.rollback(),
            )
            .await
    }

    /// Downloads, normalizes and writes a single report.
    pub async fn process_report(
        &self,
        client: &Client,
        candidate: &ReportCandidate,
    ) -> Result<ReplaceOutcome, IngestionError> {
        let report_id = self.id_policy.strip(&candidate.raw_id);
        debug!("Downloading report {} for client {}", report_id, client.client_id);
        let file = self.source.download(client, candidate).await?;
        info!("Downloaded {} ({} bytes)", file.name, file.bytes.len());

        let lines = self
            .parser
            .parse(&file, &report_id, candidate.created_on)
            .await?;
        debug!("Report {} normalized into {} lines", report_id, lines.len());

        let key = ReportKey {
            client_id: client.client_id.clone(),
            operation_date: candidate.created_on,
            report_id,
        };
        self.replace(&key, &lines).await
    }

    /// Runs list, resolve, download, parse and write for one client.
    ///
    /// Bad files are reported and skipped. Storage failures and unknown
    /// clients end the run with an error.
    pub async fn process_client(&self, client: &Client) -> Result<ClientRunSummary, IngestionError> {
        self.progress.info(&format!(
            "Collecting available reports for {} (client {})",
            client.name_company, client.client_id
        ));

        let candidates = self.source.list_candidates(client).await?;
        let mut summary = ClientRunSummary {
            candidates: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            self.progress
                .info(&format!("No reports listed for {}", client.name_company));
            return Ok(summary);
        }

        let unseen = self.unseen_candidates(&client.client_id, candidates).await?;
        summary.unseen = unseen.len();
        if unseen.is_empty() {
            self.progress
                .info(&format!("No new reports for {}", client.name_company));
            return Ok(summary);
        }

        for candidate in &unseen {
            match self.process_report(client, candidate).await {
                Ok(outcome) => {
                    summary.reports_written += 1;
                    summary.lines_written += outcome.inserted;
                    summary.mappings_learned += outcome.mappings_learned;
                    self.progress.info(&format!(
                        "Report {} of {} dated {} stored: {} lines ({} replaced, {} new operation types)",
                        self.id_policy.strip(&candidate.raw_id),
                        client.client_id,
                        candidate.created_on,
                        outcome.inserted,
                        outcome.deleted,
                        outcome.mappings_learned
                    ));
                }
                Err(e) if e.aborts_client_run() => {
                    self.progress.error(&format!(
                        "Report {} of {} failed, stopping client run: {}",
                        candidate.raw_id, client.client_id, e
                    ));
                    return Err(e);
                }
                Err(e) => {
                    summary.reports_failed += 1;
                    warn!("Skipping report {}: {}", candidate.raw_id, e);
                    self.progress.error(&format!(
                        "Report {} of {} dated {} skipped: {}",
                        candidate.raw_id, client.client_id, candidate.created_on, e
                    ));
                }
            }
        }

        self.progress.info(&format!(
            "Report collection for {} finished: {} written, {} failed",
            client.name_company, summary.reports_written, summary.reports_failed
        ));
        Ok(summary)
    }
}
