//! Fixed positional layout of the daily settlement report sheet.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::error::IngestionError;

/// Width of the vendor sheet, header included.
pub const EXPECTED_COLUMN_COUNT: usize = 62;

macro_rules! report_columns {
    ($($variant:ident => ($index:expr, $name:expr)),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Column {
            $($variant),+
        }

        impl Column {
            pub const ALL: &'static [Column] = &[$(Column::$variant),+];

            pub const fn index(self) -> usize {
                match self {
                    $(Column::$variant => $index),+
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Column::$variant => $name),+
                }
            }
        }
    };
}

report_columns! {
    GiId => (1, "gi_id"),
    SubjectName => (2, "subject_name"),
    Sku => (3, "sku"),
    Brand => (4, "brand"),
    VendorCode => (5, "vendor_code"),
    Size => (7, "size"),
    Barcode => (8, "barcode"),
    DocTypeName => (9, "doc_type_name"),
    SupplierOperName => (10, "supplier_oper_name"),
    OrderDate => (11, "order_date"),
    SaleDate => (12, "sale_date"),
    Quantity => (13, "quantity"),
    RetailPrice => (14, "retail_price"),
    RetailAmount => (15, "retail_amount"),
    ProductDiscountForReport => (16, "product_discount_for_report"),
    SupplierPromo => (17, "supplier_promo"),
    SalePercent => (18, "sale_percent"),
    RetailPriceWithdiscRub => (19, "retail_price_withdisc_rub"),
    SupRatingPrcUp => (20, "sup_rating_prc_up"),
    IsKgvpV2 => (21, "is_kgvp_v2"),
    PpvzSppPrc => (22, "ppvz_spp_prc"),
    CommissionPercent => (23, "commission_percent"),
    PpvzKvwPrcBase => (24, "ppvz_kvw_prc_base"),
    PpvzKvwPrc => (25, "ppvz_kvw_prc"),
    PpvzSalesCommission => (26, "ppvz_sales_commission"),
    PpvzReward => (27, "ppvz_reward"),
    AcquiringFee => (28, "acquiring_fee"),
    PpvzVw => (31, "ppvz_vw"),
    PpvzVwNds => (32, "ppvz_vw_nds"),
    PpvzForPay => (33, "ppvz_for_pay"),
    DeliveryAmount => (34, "delivery_amount"),
    ReturnAmount => (35, "return_amount"),
    DeliveryRub => (36, "delivery_rub"),
    Penalty => (40, "penalty"),
    AdditionalPayment => (41, "additional_payment"),
    BonusTypeName => (42, "bonus_type_name"),
    StickerId => (43, "sticker_id"),
    AcquiringBank => (44, "acquiring_bank"),
    PpvzOfficeId => (45, "ppvz_office_id"),
    PpvzOfficeName => (46, "ppvz_office_name"),
    PpvzInn => (47, "ppvz_inn"),
    PpvzSupplierName => (48, "ppvz_supplier_name"),
    OfficeName => (49, "office_name"),
    SiteCountry => (50, "site_country"),
    GiBoxTypeName => (51, "gi_box_type_name"),
    DeclarationNumber => (52, "declaration_number"),
    Kiz => (54, "kiz"),
    ShkId => (55, "shk_id"),
    PostingNumber => (56, "posting_number"),
    RebillLogisticCost => (57, "rebill_logistic_cost"),
    RebillLogisticOrg => (58, "rebill_logistic_org"),
    StorageFee => (59, "storage_fee"),
    Deduction => (60, "deduction"),
    Acceptance => (61, "acceptance"),
}

/// Checks the column table itself: unique positions inside the sheet width.
pub fn validate_layout() -> Result<(), IngestionError> {
    let mut positions = HashSet::new();
    for column in Column::ALL {
        if column.index() >= EXPECTED_COLUMN_COUNT {
            return Err(IngestionError::Config(format!(
                "column '{}' at index {} is outside the {}-column layout",
                column.name(),
                column.index(),
                EXPECTED_COLUMN_COUNT
            )));
        }
        if !positions.insert(column.index()) {
            return Err(IngestionError::Config(format!(
                "column index {} is mapped twice (second: '{}')",
                column.index(),
                column.name()
            )));
        }
    }
    Ok(())
}

/// Checks that a file's header row has the expected width.
pub fn check_header(header: &[String]) -> Result<(), IngestionError> {
    if header.len() != EXPECTED_COLUMN_COUNT {
        return Err(IngestionError::LayoutMismatch {
            expected: EXPECTED_COLUMN_COUNT,
            found: header.len(),
        });
    }
    Ok(())
}

/// Typed access to one data row. `row` is the 1-based sheet row number used
/// in error messages.
pub struct RowReader<'a> {
    cells: &'a [String],
    row: usize,
}

impl<'a> RowReader<'a> {
    pub fn new(cells: &'a [String], row: usize) -> Self {
        Self { cells, row }
    }

    fn cell(&self, column: Column) -> &'a str {
        self.cells
            .get(column.index())
            .map(|c| c.trim())
            .unwrap_or("")
    }

    fn invalid(&self, column: Column, reason: &str) -> IngestionError {
        IngestionError::InvalidCell {
            row: self.row,
            column: column.name(),
            value: self.cell(column).to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn text(&self, column: Column) -> String {
        self.cell(column).to_string()
    }

    pub fn nullable_text(&self, column: Column) -> Option<String> {
        Some(self.cell(column))
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }

    pub fn text_or(&self, column: Column, default: &str) -> String {
        self.nullable_text(column)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn integer(&self, column: Column) -> Result<i32, IngestionError> {
        self.cell(column)
            .parse::<i32>()
            .map_err(|_| self.invalid(column, "expected an integer"))
    }

    pub fn money(&self, column: Column) -> Result<Decimal, IngestionError> {
        let raw = self.cell(column);
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map(|d| d.round_dp(2))
            .map_err(|_| self.invalid(column, "expected a decimal number"))
    }

    pub fn money_or_zero(&self, column: Column) -> Result<Decimal, IngestionError> {
        if self.cell(column).is_empty() {
            return Ok(Decimal::ZERO);
        }
        self.money(column)
    }

    pub fn date(&self, column: Column) -> Result<NaiveDate, IngestionError> {
        NaiveDate::parse_from_str(self.cell(column), "%Y-%m-%d")
            .map_err(|_| self.invalid(column, "expected a YYYY-MM-DD date"))
    }
}
