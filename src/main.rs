use wb_report_ingestion::{config::AppConfig, job_runner::JobRunner, logging::{init_tracing, log_dir_from_env}};
use tracing::{info, debug, error};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let log_dir = log_dir_from_env();
    let _log_guard = init_tracing(log_dir.as_deref())?;

    info!("Starting report ingestion");
    let config = AppConfig::load().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    debug!(
        "Configuration: storage={:?}, marketplace={}, reports_dir={}, parallel={}, retry={:?}",
        config.storage,
        config.marketplace,
        config.reports_dir.display(),
        config.max_parallel_clients,
        config.retry
    );

    let runner = JobRunner::from_config(&config).await?;
    info!("Job runner initialized, run id {}", runner.run_id());

    let summary = runner.run().await?;
    info!(
        "Run finished: {} clients ({} failed), {} reports written, {} skipped, {} lines, {} new operation types",
        summary.clients_total,
        summary.clients_failed,
        summary.reports_written,
        summary.reports_failed,
        summary.lines_written,
        summary.mappings_learned
    );
    Ok(())
}
