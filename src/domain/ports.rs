use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    error::IngestionError,
    models::{Client, ReplaceOutcome, ReportCandidate, ReportFile, ReportKey, ReportLine},
};

/// Acquisition side: lists reports in the seller portal and fetches them.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn list_candidates(&self, client: &Client) -> Result<Vec<ReportCandidate>, IngestionError>;
    async fn download(&self, client: &Client, candidate: &ReportCandidate) -> Result<ReportFile, IngestionError>;
}

#[async_trait]
pub trait ReportParser: Send + Sync {
    async fn parse(&self, file: &ReportFile, report_id: &str, operation_date: NaiveDate) -> Result<Vec<ReportLine>, IngestionError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, IngestionError>;
    async fn list_clients(&self, marketplace: Option<&str>) -> Result<Vec<Client>, IngestionError>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Distinct report ids already stored for the client.
    async fn persisted_report_ids(&self, client_id: &str) -> Result<HashSet<String>, IngestionError>;

    /// Replaces the line group under `key` with `lines` in one transaction,
    /// learning unseen operation types on the way. Every stored row takes
    /// its report id and operation date from `key`, whatever `lines` carry.
    async fn replace_report(&self, key: &ReportKey, lines: &[ReportLine]) -> Result<ReplaceOutcome, IngestionError>;

    /// Discards work left open by a failed call before it is retried.
    async fn rollback(&self) -> Result<(), IngestionError> {
        Ok(())
    }
}

/// Human readable progress channel.
pub trait ProgressSink: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}
