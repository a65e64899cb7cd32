use chrono::NaiveDate;
use tracing::{debug, info};

use super::report_layout::{check_header, Column, RowReader};
use super::CellGrid;
use crate::domain::{error::IngestionError, models::ReportLine};

/// Turns a report sheet (header row first) into report lines stamped with
/// `report_id` and `operation_date`.
///
/// Row order is preserved. Fully blank rows are not data rows. Any bad cell
/// fails the whole sheet.
pub fn normalize(
    grid: &CellGrid,
    report_id: &str,
    operation_date: NaiveDate,
) -> Result<Vec<ReportLine>, IngestionError> {
    let Some((header, rows)) = grid.split_first() else {
        return Err(IngestionError::Parse("report sheet is empty".to_string()));
    };
    check_header(header)?;
    debug!("Header row accepted, {} rows follow", rows.len());

    let blank = blank_rows(rows);
    if !blank.is_empty() {
        debug!("Report {}: skipping blank sheet rows {:?}", report_id, blank);
    }

    let lines = rows
        .iter()
        .enumerate()
        .filter(|(_, cells)| !is_blank(cells))
        .map(|(i, cells)| to_line(&RowReader::new(cells, i + 2), report_id, operation_date))
        .collect::<Result<Vec<_>, _>>()?;

    info!("Normalized {} lines for report {}", lines.len(), report_id);
    Ok(lines)
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

/// Sheet row numbers (header is row 1) of the data rows with no content.
pub(crate) fn blank_rows(rows: &[Vec<String>]) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, cells)| is_blank(cells))
        .map(|(i, _)| i + 2)
        .collect()
}

fn to_line(row: &RowReader<'_>, report_id: &str, operation_date: NaiveDate) -> Result<ReportLine, IngestionError> {
    use Column::*;

    Ok(ReportLine {
        realizationreport_id: report_id.to_string(),
        gi_id: row.text(GiId),
        subject_name: row.text(SubjectName),
        sku: row.text(Sku),
        brand: row.text(Brand),
        vendor_code: row.text(VendorCode),
        size: row.text(Size),
        barcode: row.text(Barcode),
        doc_type_name: row.text(DocTypeName),
        quantity: row.integer(Quantity)?,
        retail_price: row.money(RetailPrice)?,
        retail_amount: row.money(RetailAmount)?,
        sale_percent: row.integer(SalePercent)?,
        commission_percent: row.money(CommissionPercent)?,
        office_name: row.text(OfficeName),
        supplier_oper_name: row.text(SupplierOperName),
        order_date: row.date(OrderDate)?,
        sale_date: row.date(SaleDate)?,
        operation_date,
        shk_id: row.text(ShkId),
        retail_price_withdisc_rub: row.money(RetailPriceWithdiscRub)?,
        delivery_amount: row.integer(DeliveryAmount)?,
        return_amount: row.integer(ReturnAmount)?,
        delivery_rub: row.money(DeliveryRub)?,
        gi_box_type_name: row.text(GiBoxTypeName),
        product_discount_for_report: row.money(ProductDiscountForReport)?,
        // zero rather than null: downstream sums expect a number here
        supplier_promo: row.money_or_zero(SupplierPromo)?,
        order_id: "0".to_string(),
        ppvz_spp_prc: row.money(PpvzSppPrc)?,
        ppvz_kvw_prc_base: row.money(PpvzKvwPrcBase)?,
        ppvz_kvw_prc: row.money(PpvzKvwPrc)?,
        sup_rating_prc_up: row.money(SupRatingPrcUp)?,
        is_kgvp_v2: row.money(IsKgvpV2)?,
        ppvz_sales_commission: row.money(PpvzSalesCommission)?,
        ppvz_for_pay: row.money(PpvzForPay)?,
        ppvz_reward: row.money(PpvzReward)?,
        acquiring_fee: row.money(AcquiringFee)?,
        acquiring_bank: row.text(AcquiringBank),
        ppvz_vw: row.money(PpvzVw)?,
        ppvz_vw_nds: row.money(PpvzVwNds)?,
        ppvz_office_id: row.text_or(PpvzOfficeId, "0"),
        ppvz_office_name: row.text(PpvzOfficeName),
        ppvz_supplier_id: "0".to_string(),
        ppvz_supplier_name: row.text(PpvzSupplierName),
        ppvz_inn: row.text(PpvzInn),
        declaration_number: row.text(DeclarationNumber),
        bonus_type_name: row.nullable_text(BonusTypeName),
        sticker_id: row.text_or(StickerId, "0"),
        site_country: row.text(SiteCountry),
        penalty: row.money(Penalty)?,
        additional_payment: row.money(AdditionalPayment)?,
        rebill_logistic_cost: row.money(RebillLogisticCost)?,
        rebill_logistic_org: row.nullable_text(RebillLogisticOrg),
        kiz: row.nullable_text(Kiz),
        storage_fee: row.money(StorageFee)?,
        deduction: row.money(Deduction)?,
        acceptance: row.money(Acceptance)?,
        posting_number: row.text(PostingNumber),
    })
}
