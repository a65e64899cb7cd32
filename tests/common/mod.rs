#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use wb_report_ingestion::domain::{
    error::IngestionError,
    models::{Client, ReplaceOutcome, ReportCandidate, ReportFile, ReportKey, ReportLine, SheetKind},
    ports::{ReportRepository, ReportSource},
};
use wb_report_ingestion::infrastructure::parsers::{
    report_layout::{Column, EXPECTED_COLUMN_COUNT},
    report_normalizer::normalize,
};

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

pub fn client(id: &str) -> Client {
    Client {
        client_id: id.to_string(),
        marketplace: "Wildberries".to_string(),
        api_key: format!("key-{}", id),
        name_company: format!("Company {}", id),
        entrepreneur: format!("IP {}", id),
    }
}

/// One sheet row: `(sku, operation type, bonus subtype)`, empty subtype
/// meaning an empty cell.
pub fn row(sku: &str, operation_type: &str, bonus_subtype: &str) -> Vec<String> {
    let mut cells = vec![String::new(); EXPECTED_COLUMN_COUNT];
    for column in Column::ALL {
        cells[column.index()] = "0".to_string();
    }
    let mut set = |column: Column, value: &str| cells[column.index()] = value.to_string();
    set(Column::Sku, sku);
    set(Column::VendorCode, &format!("V-{}", sku));
    set(Column::SupplierOperName, operation_type);
    set(Column::BonusTypeName, bonus_subtype);
    set(Column::OrderDate, "2024-02-28");
    set(Column::SaleDate, "2024-02-29");
    set(Column::Quantity, "1");
    set(Column::RetailPrice, "1500.00");
    set(Column::SupplierPromo, "");
    set(Column::RebillLogisticOrg, "");
    set(Column::Kiz, "");
    set(Column::PostingNumber, &format!("P-{}", sku));
    cells
}

pub fn header() -> Vec<String> {
    (0..EXPECTED_COLUMN_COUNT).map(|i| format!("col{}", i)).collect()
}

pub fn lines(report_id: &str, operation_date: NaiveDate, rows: &[(&str, &str, &str)]) -> Vec<ReportLine> {
    let mut grid = vec![header()];
    grid.extend(rows.iter().map(|(sku, op, bonus)| row(sku, op, bonus)));
    normalize(&grid, report_id, operation_date).unwrap()
}

pub fn csv_bytes(rows: &[Vec<String>]) -> Vec<u8> {
    let mut out = header().join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

pub fn key(client_id: &str, operation_date: NaiveDate, report_id: &str) -> ReportKey {
    ReportKey {
        client_id: client_id.to_string(),
        operation_date,
        report_id: report_id.to_string(),
    }
}

/// Report source backed by files registered in the test.
#[derive(Default)]
pub struct FakeSource {
    reports: Mutex<HashMap<String, Vec<(ReportCandidate, Vec<u8>)>>>,
    broken_clients: Mutex<Vec<String>>,
    pub downloads: AtomicU32,
}

impl FakeSource {
    pub fn add_csv(&self, client_id: &str, raw_id: &str, created_on: NaiveDate, bytes: Vec<u8>) {
        self.reports
            .lock()
            .unwrap()
            .entry(client_id.to_string())
            .or_default()
            .push((ReportCandidate { raw_id: raw_id.to_string(), created_on }, bytes));
    }

    pub fn break_listing(&self, client_id: &str) {
        self.broken_clients.lock().unwrap().push(client_id.to_string());
    }

    pub fn download_count(&self) -> u32 {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSource for FakeSource {
    async fn list_candidates(&self, client: &Client) -> Result<Vec<ReportCandidate>, IngestionError> {
        if self.broken_clients.lock().unwrap().contains(&client.client_id) {
            return Err(IngestionError::Acquisition("portal session expired".to_string()));
        }
        Ok(self
            .reports
            .lock()
            .unwrap()
            .get(&client.client_id)
            .map(|reports| reports.iter().map(|(c, _)| c.clone()).collect())
            .unwrap_or_default())
    }

    async fn download(&self, client: &Client, candidate: &ReportCandidate) -> Result<ReportFile, IngestionError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.reports
            .lock()
            .unwrap()
            .get(&client.client_id)
            .and_then(|reports| reports.iter().find(|(c, _)| c == candidate))
            .map(|(c, bytes)| ReportFile {
                name: format!("{}.csv", c.raw_id),
                kind: SheetKind::Csv,
                bytes: bytes.clone(),
            })
            .ok_or_else(|| IngestionError::Acquisition(format!("no file for {}", candidate.raw_id)))
    }
}

/// Report store whose writes always hit a connectivity error.
#[derive(Default)]
pub struct UnreachableStore {
    pub replace_calls: AtomicU32,
    pub rollbacks: AtomicU32,
}

#[async_trait]
impl ReportRepository for UnreachableStore {
    async fn persisted_report_ids(&self, _client_id: &str) -> Result<std::collections::HashSet<String>, IngestionError> {
        Ok(Default::default())
    }

    async fn replace_report(&self, _key: &ReportKey, _lines: &[ReportLine]) -> Result<ReplaceOutcome, IngestionError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        Err(IngestionError::TransientStorage("server closed the connection".to_string()))
    }

    async fn rollback(&self) -> Result<(), IngestionError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
