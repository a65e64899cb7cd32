pub mod archive;
pub mod report_source;

pub use report_source::DirectoryReportSource;
