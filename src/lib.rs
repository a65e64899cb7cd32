pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod job_runner;
pub mod logging;
