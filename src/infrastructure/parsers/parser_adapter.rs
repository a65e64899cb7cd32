use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use super::{csv_parser::parse_csv, report_normalizer::normalize, xlsx_parser::parse_workbook};
use crate::domain::{
    error::IngestionError,
    models::{ReportFile, ReportLine, SheetKind},
    ports::ReportParser,
};

/// Reads a report file according to its kind and normalizes the sheet.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParserAdapter;

impl ParserAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportParser for ParserAdapter {
    async fn parse(&self, file: &ReportFile, report_id: &str, operation_date: NaiveDate) -> Result<Vec<ReportLine>, IngestionError> {
        debug!("Parsing {} as {:?}", file.name, file.kind);
        let grid = match file.kind {
            SheetKind::Workbook => parse_workbook(&file.bytes)?,
            SheetKind::Csv => parse_csv(&file.bytes)?,
        };
        normalize(&grid, report_id, operation_date)
    }
}
