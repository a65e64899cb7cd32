use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use tracing::{debug, error, info};

use super::CellGrid;
use crate::domain::error::IngestionError;

/// Reads the first sheet of a workbook into text cells, header row included.
pub fn parse_workbook(bytes: &[u8]) -> Result<CellGrid, IngestionError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| {
        error!("Failed to open workbook: {}", e);
        IngestionError::Parse(e.to_string())
    })?;

    let sheet_names = workbook.sheet_names();
    debug!("Workbook sheets: {:?}", sheet_names);

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestionError::Parse("workbook has no sheets".to_string()))?
        .map_err(|e| {
            error!("Failed to read first sheet: {}", e);
            IngestionError::Parse(e.to_string())
        })?;

    let rows: CellGrid = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    info!("Read {} rows from sheet '{}'", rows.len(), sheet_names.first().map(String::as_str).unwrap_or(""));
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::DateTime(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}
