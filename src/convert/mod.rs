pub mod converter;
pub mod report;

pub use converter::{find_supported_files, ConversionJob, DocumentConverter, DocumentKind, REPORT_FILE_NAME};
pub use report::{render_report, write_report, ConversionStats, FileOutcome, OutcomeStatus};
