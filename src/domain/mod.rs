pub mod error;
pub mod models;
pub mod ports;
pub mod report_id;
pub mod taxonomy;
