// Library exports for the doctext binary and other callers

pub mod config;
pub mod convert;
pub mod error;
pub mod progress;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::Settings;
pub use convert::{ConversionStats, DocumentConverter, DocumentKind};
pub use error::{ConvertError, Result};
pub use progress::{ChannelProgress, NoProgress, ProgressEvent, ProgressSink};
pub use utils::{EpubTextExtractor, PdfTextExtractor};
