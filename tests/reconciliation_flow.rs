mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{client, csv_bytes, date, key, lines, row, FakeSource, UnreachableStore};
use rust_decimal::Decimal;
use wb_report_ingestion::application::{reconciliation_service::ReconciliationService, retry::RetryPolicy};
use wb_report_ingestion::domain::{
    error::IngestionError,
    models::{OperationTypeMapping, ReportCandidate},
    ports::ReportRepository,
    taxonomy::NEW_CLASSIFICATION,
};
use wb_report_ingestion::infrastructure::{memory::InMemoryStore, parsers::parser_adapter::ParserAdapter};
use wb_report_ingestion::logging::RecordingProgress;

struct Harness {
    source: Arc<FakeSource>,
    store: Arc<InMemoryStore>,
    progress: Arc<RecordingProgress>,
    service: ReconciliationService,
}

fn harness() -> Harness {
    let source = Arc::new(FakeSource::default());
    let store = Arc::new(InMemoryStore::with_clients([client("c-1"), client("c-2")]));
    let progress = Arc::new(RecordingProgress::new());
    let service = ReconciliationService::new(
        source.clone(),
        Arc::new(ParserAdapter::new()),
        store.clone(),
        store.clone(),
        progress.clone(),
    )
    .with_retry_policy(RetryPolicy::new(3, Duration::ZERO));
    Harness {
        source,
        store,
        progress,
        service,
    }
}

fn candidate(raw_id: &str, day: u32) -> ReportCandidate {
    ReportCandidate {
        raw_id: raw_id.to_string(),
        created_on: date(day),
    }
}

#[tokio::test]
async fn resolver_drops_already_persisted_reports() {
    let h = harness();
    h.store
        .replace_report(&key("c-1", date(1), "R1"), &lines("R1", date(1), &[("A", "Продажа", "")]))
        .await
        .unwrap();

    let unseen = h
        .service
        .unseen_candidates(
            "c-1",
            vec![candidate("Отчёт №R3", 3), candidate("№R1", 1), candidate("R2", 2)],
        )
        .await
        .unwrap();

    let ids: Vec<_> = unseen.iter().map(|c| c.raw_id.as_str()).collect();
    assert_eq!(ids, ["R2", "Отчёт №R3"]);
}

#[tokio::test]
async fn resolver_collapses_duplicate_listings() {
    let h = harness();
    let unseen = h
        .service
        .unseen_candidates("c-2", vec![candidate("№7", 1), candidate("7", 1)])
        .await
        .unwrap();
    assert_eq!(unseen.len(), 1);
}

#[tokio::test]
async fn resolver_rejects_unknown_client() {
    let h = harness();
    let err = h
        .service
        .unseen_candidates("ghost", vec![candidate("1", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, IngestionError::UnknownClient(id) if id == "ghost"));
}

#[tokio::test]
async fn replacing_twice_matches_replacing_once() {
    let h = harness();
    let k = key("c-1", date(4), "55");
    let batch = lines("55", date(4), &[("A", "Продажа", ""), ("B", "Логистика", "")]);

    let first = h.service.replace(&k, &batch).await.unwrap();
    let after_first = h.store.lines();
    let mappings_after_first = h.store.mappings();

    let second = h.service.replace(&k, &batch).await.unwrap();

    assert_eq!(h.store.lines(), after_first);
    assert_eq!(h.store.mappings(), mappings_after_first);
    assert_eq!(first.deleted, 0);
    assert_eq!(second.deleted, 2);
    assert_eq!(second.inserted, 2);
    assert_eq!(second.mappings_learned, 0);
}

#[tokio::test]
async fn replacement_only_touches_its_own_group() {
    let h = harness();
    let original = |id: &str, day: u32, sku: &str| lines(id, date(day), &[(sku, "Продажа", "")]);

    h.service.replace(&key("c-1", date(1), "R1"), &original("R1", 1, "D1")).await.unwrap();
    h.service.replace(&key("c-1", date(2), "R1"), &original("R1", 2, "D2")).await.unwrap();
    h.service.replace(&key("c-2", date(1), "R1"), &original("R1", 1, "OTHER")).await.unwrap();

    let replacement = lines("R1", date(1), &[("NEW-1", "Продажа", ""), ("NEW-2", "Продажа", "")]);
    let outcome = h
        .service
        .replace(&key("c-1", date(1), "R1"), &replacement)
        .await
        .unwrap();
    assert_eq!(outcome.deleted, 1);

    assert_eq!(h.store.lines_for(&key("c-1", date(1), "R1")), replacement);
    let untouched_date = h.store.lines_for(&key("c-1", date(2), "R1"));
    assert_eq!(untouched_date.len(), 1);
    assert_eq!(untouched_date[0].sku, "D2");
    let untouched_client = h.store.lines_for(&key("c-2", date(1), "R1"));
    assert_eq!(untouched_client.len(), 1);
    assert_eq!(untouched_client[0].sku, "OTHER");
}

#[tokio::test]
async fn rows_are_stored_under_the_replaced_key() {
    let h = harness();
    let k = key("c-1", date(1), "R1");
    let stamped_elsewhere = lines("R1-other", date(2), &[("A", "Продажа", "")]);

    h.service.replace(&k, &stamped_elsewhere).await.unwrap();
    let second = h.service.replace(&k, &stamped_elsewhere).await.unwrap();

    assert_eq!(second.deleted, 1);
    assert_eq!(h.store.lines().len(), 1);
    let stored = h.store.lines_for(&k);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].realizationreport_id, "R1");
    assert_eq!(stored[0].operation_date, date(1));
}

#[tokio::test]
async fn writer_learns_unmatched_operation_types_once() {
    let h = harness();
    h.store.add_mapping(OperationTypeMapping {
        operation_type: "A".to_string(),
        subtype_prefix: Some("B".to_string()),
        classification: Some("Штрафы".to_string()),
    });

    let batch = lines("9", date(5), &[("1", "A", "BX"), ("2", "A", "C"), ("3", "A", "C-2"), ("4", "A", "")]);
    let outcome = h.service.replace(&key("c-1", date(5), "9"), &batch).await.unwrap();

    assert_eq!(outcome.mappings_learned, 2);
    let mappings = h.store.mappings();
    assert_eq!(mappings.len(), 3);
    assert_eq!(mappings[1].operation_type, "A");
    assert_eq!(mappings[1].subtype_prefix.as_deref(), Some("C"));
    assert_eq!(mappings[1].classification.as_deref(), Some(NEW_CLASSIFICATION));
    assert_eq!(mappings[2].subtype_prefix, None);
}

#[tokio::test]
async fn writer_rejects_unprovisioned_client_without_partial_state() {
    let h = harness();
    let err = h
        .service
        .replace(&key("ghost", date(1), "1"), &lines("1", date(1), &[("A", "Новый тип", "")]))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestionError::Storage(_)));
    assert!(h.store.lines().is_empty());
    assert!(h.store.mappings().is_empty());
}

#[tokio::test]
async fn client_run_stores_new_reports_and_skips_bad_files() {
    let h = harness();
    h.source.add_csv(
        "c-1",
        "Отчёт №100",
        date(3),
        csv_bytes(&[row("A", "Продажа", ""), row("B", "Возврат", "")]),
    );
    let mut broken = row("C", "Продажа", "");
    broken[wb_report_ingestion::infrastructure::parsers::report_layout::Column::Quantity.index()] = "много".to_string();
    h.source.add_csv("c-1", "Отчёт №101", date(3), csv_bytes(&[row("A", "Продажа", ""), broken]));

    let summary = h.service.process_client(&client("c-1")).await.unwrap();

    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.unseen, 2);
    assert_eq!(summary.reports_written, 1);
    assert_eq!(summary.reports_failed, 1);
    assert_eq!(summary.lines_written, 2);

    let stored = h.store.lines_for(&key("c-1", date(3), "100"));
    let skus: Vec<_> = stored.iter().map(|l| l.sku.as_str()).collect();
    assert_eq!(skus, ["A", "B"]);
    assert!(stored.iter().all(|l| l.supplier_promo == Decimal::ZERO && l.bonus_type_name.is_none()));
    assert!(h.store.lines_for(&key("c-1", date(3), "101")).is_empty());

    let errors = h.progress.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("101") && errors[0].contains("c-1"));

    let again = h.service.process_client(&client("c-1")).await.unwrap();
    assert_eq!(again.unseen, 1, "only the broken report is retried");
    assert_eq!(h.source.download_count(), 3);
}

#[tokio::test]
async fn storage_outage_aborts_the_client_after_retries() {
    let source = Arc::new(FakeSource::default());
    source.add_csv("c-1", "1", date(1), csv_bytes(&[row("A", "Продажа", "")]));
    source.add_csv("c-1", "2", date(2), csv_bytes(&[row("B", "Продажа", "")]));
    let clients = Arc::new(InMemoryStore::with_clients([client("c-1")]));
    let reports = Arc::new(UnreachableStore::default());
    let progress = Arc::new(RecordingProgress::new());

    let service = ReconciliationService::new(
        source.clone(),
        Arc::new(ParserAdapter::new()),
        clients,
        reports.clone(),
        progress.clone(),
    )
    .with_retry_policy(RetryPolicy::new(2, Duration::ZERO));

    let err = service.process_client(&client("c-1")).await.unwrap_err();

    assert!(matches!(err, IngestionError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(reports.replace_calls.load(Ordering::SeqCst), 3);
    assert_eq!(reports.rollbacks.load(Ordering::SeqCst), 3);
    assert_eq!(source.download_count(), 1, "second report is not attempted");
    assert_eq!(progress.errors().len(), 1);
}
