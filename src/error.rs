use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while extracting or converting documents
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Input path does not exist: {0:?}")]
    NotFound(PathBuf),

    #[error("Not a readable EPUB archive {path:?}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Malformed EPUB structure: {0}")]
    Structure(String),

    #[error("No PDF extraction engine available (enable `layout-engine` or `basic-engine`)")]
    NoBackend,

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("PDF processing error: {0}")]
    Pdf(String),

    #[error("No text content extracted from {0:?}")]
    NoText(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Settings(String),
}

/// Convenience Result type with ConvertError
pub type Result<T> = std::result::Result<T, ConvertError>;
