use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::{
    error::IngestionError,
    models::{Client, OperationTypeMapping, ReplaceOutcome, ReportKey, ReportLine},
    ports::{ClientRepository, ReportRepository},
    taxonomy::TaxonomySnapshot,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLine {
    pub client_id: String,
    pub line: ReportLine,
}

#[derive(Debug, Default)]
struct State {
    clients: Vec<Client>,
    lines: Vec<StoredLine>,
    mappings: Vec<OperationTypeMapping>,
}

/// Process-local store with the same contract as the PostgreSQL adapters.
///
/// One mutex guards everything, so a replacement is never observable half
/// done. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clients(clients: impl IntoIterator<Item = Client>) -> Self {
        let store = Self::new();
        store.lock().clients.extend(clients);
        store
    }

    pub fn add_client(&self, client: Client) {
        self.lock().clients.push(client);
    }

    pub fn add_mapping(&self, mapping: OperationTypeMapping) {
        self.lock().mappings.push(mapping);
    }

    pub fn mappings(&self) -> Vec<OperationTypeMapping> {
        self.lock().mappings.clone()
    }

    pub fn lines(&self) -> Vec<StoredLine> {
        self.lock().lines.clone()
    }

    pub fn lines_for(&self, key: &ReportKey) -> Vec<ReportLine> {
        self.lock()
            .lines
            .iter()
            .filter(|stored| in_group(stored, key))
            .map(|stored| stored.line.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn in_group(stored: &StoredLine, key: &ReportKey) -> bool {
    stored.client_id == key.client_id
        && stored.line.operation_date == key.operation_date
        && stored.line.realizationreport_id == key.report_id
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, IngestionError> {
        Ok(self
            .lock()
            .clients
            .iter()
            .find(|c| c.client_id == client_id)
            .cloned())
    }

    async fn list_clients(&self, marketplace: Option<&str>) -> Result<Vec<Client>, IngestionError> {
        Ok(self
            .lock()
            .clients
            .iter()
            .filter(|c| marketplace.map_or(true, |m| c.marketplace == m))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportRepository for InMemoryStore {
    async fn persisted_report_ids(&self, client_id: &str) -> Result<HashSet<String>, IngestionError> {
        Ok(self
            .lock()
            .lines
            .iter()
            .filter(|stored| stored.client_id == client_id)
            .map(|stored| stored.line.realizationreport_id.clone())
            .collect())
    }

    async fn replace_report(&self, key: &ReportKey, lines: &[ReportLine]) -> Result<ReplaceOutcome, IngestionError> {
        let mut state = self.lock();
        if !state.clients.iter().any(|c| c.client_id == key.client_id) {
            return Err(IngestionError::Storage(format!(
                "client '{}' violates the report foreign key",
                key.client_id
            )));
        }

        let before = state.lines.len();
        let mut kept: Vec<StoredLine> = state
            .lines
            .iter()
            .filter(|stored| !in_group(stored, key))
            .cloned()
            .collect();
        let deleted = (before - kept.len()) as u64;

        let mut taxonomy = TaxonomySnapshot::from_mappings(&state.mappings);
        let mut learned = Vec::new();
        for line in lines {
            if let Some(mapping) = taxonomy.learn(&line.supplier_oper_name, line.bonus_type_name.as_deref()) {
                learned.push(mapping);
            }
            let mut line = line.clone();
            line.realizationreport_id = key.report_id.clone();
            line.operation_date = key.operation_date;
            kept.push(StoredLine {
                client_id: key.client_id.clone(),
                line,
            });
        }

        let outcome = ReplaceOutcome {
            deleted,
            inserted: lines.len() as u64,
            mappings_learned: learned.len() as u64,
        };
        state.lines = kept;
        state.mappings.extend(learned);

        debug!("Replaced group {:?}: {:?}", key, outcome);
        info!("Stored {} lines for report {} of client {}", outcome.inserted, key.report_id, key.client_id);
        Ok(outcome)
    }
}
