pub mod csv_parser;
pub mod parser_adapter;
pub mod report_layout;
pub mod report_normalizer;
pub mod xlsx_parser;

/// Sheet contents as trimmed text cells, one `Vec` per row.
pub type CellGrid = Vec<Vec<String>>;
