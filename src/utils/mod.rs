pub mod epub_parser;
pub mod pdf_parser;
pub mod text_processor;

pub use epub_parser::{EpubMetadata, EpubTextExtractor};
#[cfg(feature = "basic-engine")]
pub use pdf_parser::BasicEngine;
#[cfg(feature = "layout-engine")]
pub use pdf_parser::LayoutEngine;
pub use pdf_parser::{available_engines, PdfEngine, PdfMetadata, PdfPages, PdfTextExtractor};
pub use text_processor::{html_to_text, normalize_text};
