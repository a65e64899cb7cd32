use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::domain::ports::ProgressSink;

const MOSCOW_OFFSET_SECS: i32 = 3 * 3600;

/// Directory for the daily log files; an empty value disables them.
pub const LOG_DIR_VAR: &str = "LOG_DIR";
const DEFAULT_LOG_DIR: &str = "log";

fn moscow_now() -> DateTime<FixedOffset> {
    let now = Utc::now();
    match FixedOffset::east_opt(MOSCOW_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset),
        None => now.fixed_offset(),
    }
}

/// Log timestamps in Moscow time, the timezone the sellers report in.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoscowTime;

impl FormatTime for MoscowTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", moscow_now().format("%Y-%m-%d %H:%M:%S%.3f%:z"))
    }
}

/// Appends to `<dir>/<YYYY-MM-DD>.log`, switching files when the Moscow date
/// changes.
pub struct MoscowDailyFile {
    dir: PathBuf,
    current: Option<(NaiveDate, File)>,
}

impl MoscowDailyFile {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, current: None })
    }

    fn file_for(&mut self, date: NaiveDate) -> io::Result<&mut File> {
        if self.current.as_ref().map_or(true, |(open, _)| *open != date) {
            let path = self.dir.join(format!("{}.log", date.format("%Y-%m-%d")));
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            self.current = Some((date, file));
        }
        match self.current.as_mut() {
            Some((_, file)) => Ok(file),
            None => Err(io::Error::new(io::ErrorKind::Other, "log file is not open")),
        }
    }
}

impl Write for MoscowDailyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let today = moscow_now().date_naive();
        self.file_for(today)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

/// `LOG_DIR`, defaulting to `log`; set it empty to log to stdout only.
pub fn log_dir_from_env() -> Option<PathBuf> {
    match std::env::var(LOG_DIR_VAR) {
        Ok(dir) if dir.trim().is_empty() => None,
        Ok(dir) => Some(PathBuf::from(dir)),
        Err(_) => Some(PathBuf::from(DEFAULT_LOG_DIR)),
    }
}

/// Installs the stdout subscriber and, with `log_dir`, a daily file layer.
/// Keep the returned guard alive until exit so buffered lines get written.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::from_default_env()
        .add_directive("wb_report_ingestion=info".parse()?)
        .add_directive("progress=info".parse()?)
        .add_directive("sqlx=warn".parse()?);

    let stdout = tracing_subscriber::fmt::layer()
        .with_timer(MoscowTime)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(MoscowDailyFile::new(dir)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(MoscowTime)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}

/// Progress lines forwarded to tracing under the `progress` target.
#[derive(Debug, Clone, Copy)]
pub struct TracingProgress {
    run_id: Uuid,
}

impl TracingProgress {
    pub fn new(run_id: Uuid) -> Self {
        Self { run_id }
    }
}

impl ProgressSink for TracingProgress {
    fn info(&self, message: &str) {
        info!(target: "progress", run_id = %self.run_id, "{}", message);
    }

    fn error(&self, message: &str) {
        error!(target: "progress", run_id = %self.run_id, "{}", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Keeps progress lines in memory, for embedding callers and tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(severity, _)| *severity == Severity::Error)
            .map(|(_, message)| message)
            .collect()
    }

    fn push(&self, severity: Severity, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((severity, message.to_string()));
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn info(&self, message: &str) {
        self.push(Severity::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(Severity::Error, message);
    }
}
