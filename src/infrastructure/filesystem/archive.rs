use std::io::{Cursor, Read};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::domain::{
    error::IngestionError,
    models::{ReportFile, SheetKind},
};

pub const ARCHIVE_EXTENSION: &str = "zip";

pub fn is_archive(extension: &str) -> bool {
    extension.eq_ignore_ascii_case(ARCHIVE_EXTENSION)
}

/// Unpacks the report sheet from a portal download archive. The portal packs
/// exactly one sheet; only the first entry is read.
pub fn first_sheet(archive_name: &str, bytes: Vec<u8>) -> Result<ReportFile, IngestionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IngestionError::Acquisition(format!("{} is not a readable archive: {}", archive_name, e)))?;
    if archive.is_empty() {
        return Err(IngestionError::Acquisition(format!("{} is empty", archive_name)));
    }

    let mut entry = archive
        .by_index(0)
        .map_err(|e| IngestionError::Acquisition(format!("cannot open the sheet in {}: {}", archive_name, e)))?;
    let name = entry.name().to_string();
    let kind = Path::new(&name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(SheetKind::from_extension)
        .ok_or_else(|| IngestionError::UnsupportedFileType(format!("{} in {}", name, archive_name)))?;

    let mut sheet = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut sheet)?;
    debug!("Unpacked {} ({} bytes) from {}", name, sheet.len(), archive_name);

    Ok(ReportFile {
        name,
        kind,
        bytes: sheet,
    })
}
