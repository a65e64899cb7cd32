use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{QueryBuilder, Transaction};
use tracing::{debug, error, info, warn};

use super::storage_error;
use crate::domain::{
    error::IngestionError,
    models::{ReplaceOutcome, ReportKey, ReportLine},
    ports::ReportRepository,
    taxonomy::TaxonomySnapshot,
};

/// Rows per multi-value INSERT; keeps binds well under the protocol limit.
const INSERT_CHUNK: usize = 500;

const INSERT_LINES_PREFIX: &str = "INSERT INTO wb_report_daily (\
    client_id, realizationreport_id, gi_id, subject_name, sku, brand, vendor_code, size, barcode, \
    doc_type_name, quantity, retail_price, retail_amount, sale_percent, commission_percent, \
    office_name, supplier_oper_name, order_date, sale_date, operation_date, shk_id, \
    retail_price_withdisc_rub, delivery_amount, return_amount, delivery_rub, gi_box_type_name, \
    product_discount_for_report, supplier_promo, order_id, ppvz_spp_prc, ppvz_kvw_prc_base, \
    ppvz_kvw_prc, sup_rating_prc_up, is_kgvp_v2, ppvz_sales_commission, ppvz_for_pay, ppvz_reward, \
    acquiring_fee, acquiring_bank, ppvz_vw, ppvz_vw_nds, ppvz_office_id, ppvz_office_name, \
    ppvz_supplier_id, ppvz_supplier_name, ppvz_inn, declaration_number, bonus_type_name, \
    sticker_id, site_country, penalty, additional_payment, rebill_logistic_cost, \
    rebill_logistic_org, kiz, storage_fee, deduction, acceptance, posting_number) ";

pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        debug!("Initializing PostgreSQL report repository");
        Self { pool }
    }

    async fn replace_in(
        tx: &mut Transaction<'_, Postgres>,
        key: &ReportKey,
        lines: &[ReportLine],
    ) -> Result<ReplaceOutcome, IngestionError> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM wb_report_daily
            WHERE client_id = $1 AND operation_date = $2 AND realizationreport_id = $3
            "#,
        )
        .bind(&key.client_id)
        .bind(key.operation_date)
        .bind(&key.report_id)
        .execute(&mut **tx)
        .await
        .map_err(storage_error)?
        .rows_affected();
        debug!("Deleted {} previous lines of report {}", deleted, key.report_id);

        let known: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT operation_type, service FROM wb_type_services")
                .fetch_all(&mut **tx)
                .await
                .map_err(storage_error)?;
        let mut taxonomy = TaxonomySnapshot::new(known);
        debug!("Loaded {} operation type mappings", taxonomy.len());

        let mut mappings_learned = 0;
        for line in lines {
            let Some(mapping) = taxonomy.learn(&line.supplier_oper_name, line.bonus_type_name.as_deref()) else {
                continue;
            };
            info!(
                "New operation type '{}' / {:?} observed in report {}",
                mapping.operation_type, mapping.subtype_prefix, key.report_id
            );
            sqlx::query("INSERT INTO wb_type_services (operation_type, service, type_name) VALUES ($1, $2, $3)")
                .bind(&mapping.operation_type)
                .bind(&mapping.subtype_prefix)
                .bind(&mapping.classification)
                .execute(&mut **tx)
                .await
                .map_err(storage_error)?;
            mappings_learned += 1;
        }

        // group columns come from the key so the next replace deletes exactly these rows
        for chunk in lines.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(INSERT_LINES_PREFIX);
            builder.push_values(chunk, |mut row, line| {
                row.push_bind(&key.client_id)
                    .push_bind(&key.report_id)
                    .push_bind(&line.gi_id)
                    .push_bind(&line.subject_name)
                    .push_bind(&line.sku)
                    .push_bind(&line.brand)
                    .push_bind(&line.vendor_code)
                    .push_bind(&line.size)
                    .push_bind(&line.barcode)
                    .push_bind(&line.doc_type_name)
                    .push_bind(line.quantity)
                    .push_bind(line.retail_price)
                    .push_bind(line.retail_amount)
                    .push_bind(line.sale_percent)
                    .push_bind(line.commission_percent)
                    .push_bind(&line.office_name)
                    .push_bind(&line.supplier_oper_name)
                    .push_bind(line.order_date)
                    .push_bind(line.sale_date)
                    .push_bind(key.operation_date)
                    .push_bind(&line.shk_id)
                    .push_bind(line.retail_price_withdisc_rub)
                    .push_bind(line.delivery_amount)
                    .push_bind(line.return_amount)
                    .push_bind(line.delivery_rub)
                    .push_bind(&line.gi_box_type_name)
                    .push_bind(line.product_discount_for_report)
                    .push_bind(line.supplier_promo)
                    .push_bind(&line.order_id)
                    .push_bind(line.ppvz_spp_prc)
                    .push_bind(line.ppvz_kvw_prc_base)
                    .push_bind(line.ppvz_kvw_prc)
                    .push_bind(line.sup_rating_prc_up)
                    .push_bind(line.is_kgvp_v2)
                    .push_bind(line.ppvz_sales_commission)
                    .push_bind(line.ppvz_for_pay)
                    .push_bind(line.ppvz_reward)
                    .push_bind(line.acquiring_fee)
                    .push_bind(&line.acquiring_bank)
                    .push_bind(line.ppvz_vw)
                    .push_bind(line.ppvz_vw_nds)
                    .push_bind(&line.ppvz_office_id)
                    .push_bind(&line.ppvz_office_name)
                    .push_bind(&line.ppvz_supplier_id)
                    .push_bind(&line.ppvz_supplier_name)
                    .push_bind(&line.ppvz_inn)
                    .push_bind(&line.declaration_number)
                    .push_bind(&line.bonus_type_name)
                    .push_bind(&line.sticker_id)
                    .push_bind(&line.site_country)
                    .push_bind(line.penalty)
                    .push_bind(line.additional_payment)
                    .push_bind(line.rebill_logistic_cost)
                    .push_bind(&line.rebill_logistic_org)
                    .push_bind(&line.kiz)
                    .push_bind(line.storage_fee)
                    .push_bind(line.deduction)
                    .push_bind(line.acceptance)
                    .push_bind(&line.posting_number);
            });
            builder
                .build()
                .execute(&mut **tx)
                .await
                .map_err(storage_error)?;
        }

        Ok(ReplaceOutcome {
            deleted,
            inserted: lines.len() as u64,
            mappings_learned,
        })
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn persisted_report_ids(&self, client_id: &str) -> Result<HashSet<String>, IngestionError> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT realizationreport_id
            FROM wb_report_daily
            WHERE client_id = $1 AND realizationreport_id IS NOT NULL
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load report ids for client {}: {}", client_id, e);
            storage_error(e)
        })?;

        Ok(ids.into_iter().collect())
    }

    async fn replace_report(&self, key: &ReportKey, lines: &[ReportLine]) -> Result<ReplaceOutcome, IngestionError> {
        debug!(
            "Replacing report {} of client {} dated {} with {} lines",
            key.report_id, key.client_id, key.operation_date, lines.len()
        );
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        match Self::replace_in(&mut tx, key, lines).await {
            Ok(outcome) => {
                tx.commit().await.map_err(storage_error)?;
                info!(
                    "✅ Stored {} lines for report {} of client {} ({} replaced)",
                    outcome.inserted, key.report_id, key.client_id, outcome.deleted
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Replacing report {} failed: {}. Rolling back", key.report_id, e);
                if let Err(rb) = tx.rollback().await {
                    warn!("Rollback of report {} failed: {}", key.report_id, rb);
                }
                Err(e)
            }
        }
    }
}
