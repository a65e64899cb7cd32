use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Seller account on the marketplace portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub client_id: String,
    pub marketplace: String,
    pub api_key: String,
    pub name_company: String,
    pub entrepreneur: String,
}

/// One row of a daily seller settlement report.
///
/// Money is kept with two fractional digits. The owning client is not part
/// of the line; it travels in the [`ReportKey`] the line is written under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLine {
    pub realizationreport_id: String,
    pub gi_id: String,
    pub subject_name: String,
    pub sku: String,
    pub brand: String,
    pub vendor_code: String,
    pub size: String,
    pub barcode: String,
    pub doc_type_name: String,
    pub quantity: i32,
    pub retail_price: Decimal,
    pub retail_amount: Decimal,
    pub sale_percent: i32,
    pub commission_percent: Decimal,
    pub office_name: String,
    pub supplier_oper_name: String,
    pub order_date: NaiveDate,
    pub sale_date: NaiveDate,
    pub operation_date: NaiveDate,
    pub shk_id: String,
    pub retail_price_withdisc_rub: Decimal,
    pub delivery_amount: i32,
    pub return_amount: i32,
    pub delivery_rub: Decimal,
    pub gi_box_type_name: String,
    pub product_discount_for_report: Decimal,
    pub supplier_promo: Decimal,
    pub order_id: String,
    pub ppvz_spp_prc: Decimal,
    pub ppvz_kvw_prc_base: Decimal,
    pub ppvz_kvw_prc: Decimal,
    pub sup_rating_prc_up: Decimal,
    pub is_kgvp_v2: Decimal,
    pub ppvz_sales_commission: Decimal,
    pub ppvz_for_pay: Decimal,
    pub ppvz_reward: Decimal,
    pub acquiring_fee: Decimal,
    pub acquiring_bank: String,
    pub ppvz_vw: Decimal,
    pub ppvz_vw_nds: Decimal,
    pub ppvz_office_id: String,
    pub ppvz_office_name: String,
    pub ppvz_supplier_id: String,
    pub ppvz_supplier_name: String,
    pub ppvz_inn: String,
    pub declaration_number: String,
    pub bonus_type_name: Option<String>,
    pub sticker_id: String,
    pub site_country: String,
    pub penalty: Decimal,
    pub additional_payment: Decimal,
    pub rebill_logistic_cost: Decimal,
    pub rebill_logistic_org: Option<String>,
    pub kiz: Option<String>,
    pub storage_fee: Decimal,
    pub deduction: Decimal,
    pub acceptance: Decimal,
    pub posting_number: String,
}

/// Deletion group of persisted report lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub client_id: String,
    pub operation_date: NaiveDate,
    pub report_id: String,
}

/// Maps an operation type (optionally narrowed by a bonus subtype prefix)
/// to a human curated service classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTypeMapping {
    pub operation_type: String,
    pub subtype_prefix: Option<String>,
    pub classification: Option<String>,
}

/// Report listed in the seller portal, as reported by the acquisition side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCandidate {
    pub raw_id: String,
    pub created_on: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Workbook,
    Csv,
}

impl SheetKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Some(SheetKind::Workbook),
            "csv" => Some(SheetKind::Csv),
            _ => None,
        }
    }
}

/// Downloaded report file.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub name: String,
    pub kind: SheetKind,
    pub bytes: Vec<u8>,
}

/// Result of one reconciling write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub deleted: u64,
    pub inserted: u64,
    pub mappings_learned: u64,
}
