use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::fs;
use tracing::{debug, info, warn};

use super::archive::{first_sheet, is_archive};
use crate::domain::{
    error::IngestionError,
    models::{Client, ReportCandidate, ReportFile, SheetKind},
    ports::ReportSource,
};

/// Serves reports the browser downloader left on disk as
/// `<root>/<YYYY-MM-DD>/<client_id>/<report id>.<ext>`.
///
/// The date directory is the portal creation date of the report; the file
/// stem is the raw report id as the portal printed it. Portal `.zip`
/// downloads are served as the sheet packed inside them.
pub struct DirectoryReportSource {
    root: PathBuf,
}

impl DirectoryReportSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn client_dir(&self, date: NaiveDate, client_id: &str) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string()).join(client_id)
    }

    async fn report_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, IngestionError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            if is_archive(ext) || SheetKind::from_extension(ext).is_some() {
                files.push((stem.to_string(), path.clone()));
            } else {
                debug!("Ignoring {}", path.display());
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

#[async_trait]
impl ReportSource for DirectoryReportSource {
    async fn list_candidates(&self, client: &Client) -> Result<Vec<ReportCandidate>, IngestionError> {
        if !fs::try_exists(&self.root).await? {
            warn!("Reports directory {} does not exist", self.root.display());
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        let mut dates = fs::read_dir(&self.root).await?;
        while let Some(entry) = dates.next_entry().await? {
            let name = entry.file_name();
            let Some(created_on) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, "%Y-%m-%d").ok())
            else {
                debug!("Skipping non-date entry {:?}", name);
                continue;
            };

            let dir = self.client_dir(created_on, &client.client_id);
            if !fs::try_exists(&dir).await? {
                continue;
            }
            for (raw_id, _) in Self::report_files(&dir).await? {
                candidates.push(ReportCandidate { raw_id, created_on });
            }
        }

        candidates.sort_by(|a, b| (a.created_on, &a.raw_id).cmp(&(b.created_on, &b.raw_id)));
        info!("Found {} report files for client {}", candidates.len(), client.client_id);
        Ok(candidates)
    }

    async fn download(&self, client: &Client, candidate: &ReportCandidate) -> Result<ReportFile, IngestionError> {
        let dir = self.client_dir(candidate.created_on, &client.client_id);
        let (_, path) = Self::report_files(&dir)
            .await?
            .into_iter()
            .find(|(stem, _)| *stem == candidate.raw_id)
            .ok_or_else(|| {
                IngestionError::Acquisition(format!(
                    "report {} is not present in {}",
                    candidate.raw_id,
                    dir.display()
                ))
            })?;

        let bytes = fs::read(&path).await?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if is_archive(ext) {
            return first_sheet(&name, bytes);
        }
        let kind = SheetKind::from_extension(ext)
            .ok_or_else(|| IngestionError::UnsupportedFileType(name.clone()))?;
        Ok(ReportFile { name, kind, bytes })
    }
}
