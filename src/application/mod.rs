pub mod reconciliation_service;
pub mod retry;
