use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::{debug, info, error};
use crate::domain::error::IngestionError;
use super::CellGrid;

/// Reads a CSV export into text cells, header row included.
///
/// The delimiter is sniffed from the first line, since portal exports come
/// with either `,` or `;`.
pub fn parse_csv(bytes: &[u8]) -> Result<CellGrid, IngestionError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let delimiter = sniff_delimiter(bytes);
    debug!("Creating CSV reader with delimiter '{}'", delimiter as char);

    let cursor = Cursor::new(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(cursor);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            error!("Failed to read CSV record at row {}: {}", rows.len() + 1, e);
            IngestionError::Parse(e.to_string())
        })?;
        rows.push(record.iter().map(|field| field.trim().to_string()).collect());

        if rows.len() % 1000 == 0 {
            debug!("Read {} CSV rows", rows.len());
        }
    }

    info!("Read {} rows from CSV", rows.len());
    Ok(rows)
}

fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}
