use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::text_processor::normalize_text;
use crate::error::{ConvertError, Result};
use crate::progress::{interpolate, ProgressSink};

/// Document-level PDF metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfMetadata {
    pub pages: usize,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub creator: String,
    pub producer: String,
    pub creation_date: String,
    pub modification_date: String,
}

/// A PDF text extraction backend
pub trait PdfEngine: Send + Sync {
    /// Short name used in logs and progress messages
    fn name(&self) -> &'static str;

    /// Open the document for page-by-page extraction
    fn load(&self, path: &Path) -> Result<Box<dyn PdfPages>>;
}

/// A document opened by a [`PdfEngine`]
pub trait PdfPages {
    fn page_count(&self) -> usize;

    /// Raw text of the zero-based page `index`
    fn page_text(&mut self, index: usize) -> Result<String>;
}

/// Layout-aware extraction through `pdf-extract`
#[cfg(feature = "layout-engine")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutEngine;

#[cfg(feature = "layout-engine")]
impl PdfEngine for LayoutEngine {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn PdfPages>> {
        let bytes = std::fs::read(path)?;

        // pdf-extract panics on some malformed files instead of returning an error
        let mut document = std::panic::catch_unwind(|| pdf_extract::Document::load_mem(&bytes))
            .map_err(|_| ConvertError::Pdf(format!("pdf-extract panicked while reading {:?}", path)))?
            .map_err(|e| ConvertError::Pdf(e.to_string()))?;

        if document.is_encrypted() {
            document
                .decrypt("")
                .map_err(|e| ConvertError::Pdf(format!("encrypted document: {}", e)))?;
        }

        let page_numbers = document.get_pages().keys().copied().collect();
        Ok(Box::new(LayoutPages {
            document,
            page_numbers,
        }))
    }
}

#[cfg(feature = "layout-engine")]
struct LayoutPages {
    document: pdf_extract::Document,
    page_numbers: Vec<u32>,
}

#[cfg(feature = "layout-engine")]
impl PdfPages for LayoutPages {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&mut self, index: usize) -> Result<String> {
        let number = *self
            .page_numbers
            .get(index)
            .ok_or_else(|| ConvertError::Pdf(format!("page {} out of range", index + 1)))?;

        let document = &self.document;
        let mut text = String::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut output = pdf_extract::PlainTextOutput::new(&mut text);
            pdf_extract::output_doc_page(document, &mut output, number)
        }));

        match result {
            Ok(Ok(())) => Ok(text),
            Ok(Err(e)) => Err(ConvertError::Pdf(format!("page {}: {}", number, e))),
            Err(_) => Err(ConvertError::Pdf(format!("pdf-extract panicked on page {}", number))),
        }
    }
}

/// Content-stream extraction through `lopdf`
#[cfg(feature = "basic-engine")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEngine;

#[cfg(feature = "basic-engine")]
impl PdfEngine for BasicEngine {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn PdfPages>> {
        let document = lopdf::Document::load(path).map_err(|e| ConvertError::Pdf(e.to_string()))?;
        let page_numbers = document.get_pages().keys().copied().collect();

        Ok(Box::new(LopdfPages {
            document,
            page_numbers,
        }))
    }
}

#[cfg(feature = "basic-engine")]
struct LopdfPages {
    document: lopdf::Document,
    page_numbers: Vec<u32>,
}

#[cfg(feature = "basic-engine")]
impl PdfPages for LopdfPages {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&mut self, index: usize) -> Result<String> {
        let number = *self
            .page_numbers
            .get(index)
            .ok_or_else(|| ConvertError::Pdf(format!("page {} out of range", index + 1)))?;

        self.document
            .extract_text(&[number])
            .map_err(|e| ConvertError::Pdf(format!("page {}: {}", number, e)))
    }
}

/// Engines compiled into this build, in preference order
pub fn available_engines() -> Vec<Box<dyn PdfEngine>> {
    #[allow(unused_mut)]
    let mut engines: Vec<Box<dyn PdfEngine>> = Vec::new();

    #[cfg(feature = "layout-engine")]
    engines.push(Box::new(LayoutEngine));

    #[cfg(feature = "basic-engine")]
    engines.push(Box::new(BasicEngine));

    engines
}

/// Extracts plain text from PDF files, trying each engine in turn until one
/// produces text
pub struct PdfTextExtractor {
    engines: Vec<Box<dyn PdfEngine>>,
}

impl std::fmt::Debug for PdfTextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfTextExtractor")
            .field("engines", &self.engine_names())
            .finish()
    }
}

impl PdfTextExtractor {
    /// Use every compiled-in engine; fails with [`ConvertError::NoBackend`] when
    /// there is none
    pub fn new() -> Result<Self> {
        Self::with_engines(available_engines())
    }

    pub fn with_engines(engines: Vec<Box<dyn PdfEngine>>) -> Result<Self> {
        if engines.is_empty() {
            return Err(ConvertError::NoBackend);
        }

        let extractor = Self { engines };
        info!("Using {:?} for PDF processing", extractor.engine_names());
        Ok(extractor)
    }

    pub fn engine_names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|engine| engine.name()).collect()
    }

    /// Extract the text of every page, joined by blank lines.
    ///
    /// Returns an error only when every engine failed; `Ok("")` means the
    /// engines ran but found no text (e.g. a scanned document).
    pub fn extract(&self, path: &Path, progress: &dyn ProgressSink) -> Result<String> {
        info!("Extracting text from PDF: {:?}", path);
        progress.report(20, "Opening PDF file...");

        let mut last_error = None;
        let mut any_completed = false;

        for (position, engine) in self.engines.iter().enumerate() {
            if position > 0 {
                progress.report(30, "Trying alternative extraction method...");
            }

            match extract_with(engine.as_ref(), path, progress) {
                Ok(text) if !text.is_empty() => {
                    info!(
                        "Extracted {} characters from {:?} with {}",
                        text.len(),
                        path,
                        engine.name()
                    );
                    return Ok(text);
                }
                Ok(_) => {
                    any_completed = true;
                    debug!("{} found no text in {:?}", engine.name(), path);
                }
                Err(e) => {
                    warn!("{} extraction failed for {:?}: {}", engine.name(), path, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_completed => Err(e),
            _ => {
                warn!("No text content extracted from {:?}", path);
                Ok(String::new())
            }
        }
    }

    /// Best-effort variant of [`extract`](Self::extract): logs failures and returns
    /// an empty string instead.
    pub fn extract_text(&self, path: &Path, progress: &dyn ProgressSink) -> String {
        self.extract(path, progress).unwrap_or_else(|e| {
            error!("Error extracting text from PDF {:?}: {}", path, e);
            String::new()
        })
    }

    /// Read page count and Info dictionary entries; never fails
    pub fn get_metadata(&self, path: &Path) -> PdfMetadata {
        read_metadata(path).unwrap_or_else(|e| {
            warn!("Error extracting metadata from {:?}: {}", path, e);
            PdfMetadata::default()
        })
    }
}

fn extract_with(engine: &dyn PdfEngine, path: &Path, progress: &dyn ProgressSink) -> Result<String> {
    let mut document = engine.load(path)?;
    let total = document.page_count();

    progress.report(30, &format!("Processing {} pages with {}...", total, engine.name()));

    let mut pages = Vec::new();
    for index in 0..total {
        match document.page_text(index) {
            Ok(raw) => {
                let cleaned = normalize_text(&raw);
                if !cleaned.is_empty() {
                    pages.push(cleaned);
                }
            }
            Err(e) => warn!("Error processing page {}: {}", index + 1, e),
        }

        progress.report(
            interpolate(30, 50, index, total),
            &format!("Processing page {}/{}", index + 1, total),
        );
    }

    Ok(pages.join("\n\n"))
}

#[cfg(feature = "basic-engine")]
fn read_metadata(path: &Path) -> Result<PdfMetadata> {
    use lopdf::Object;

    let document = lopdf::Document::load(path).map_err(|e| ConvertError::Pdf(e.to_string()))?;
    let mut metadata = PdfMetadata {
        pages: document.get_pages().len(),
        ..Default::default()
    };

    let info = match document.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => document.get_object(*id).ok(),
        Ok(object) => Some(object),
        Err(_) => None,
    };

    let Some(Ok(info)) = info.map(Object::as_dict) else {
        debug!("No Info dictionary in PDF: {:?}", path);
        return Ok(metadata);
    };

    let get = |key: &[u8]| -> String {
        match info.get(key) {
            Ok(Object::String(bytes, _)) => decode_pdf_string(bytes),
            Ok(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
            _ => String::new(),
        }
    };

    metadata.title = get(b"Title");
    metadata.author = get(b"Author");
    metadata.subject = get(b"Subject");
    metadata.creator = get(b"Creator");
    metadata.producer = get(b"Producer");
    metadata.creation_date = get(b"CreationDate");
    metadata.modification_date = get(b"ModDate");

    Ok(metadata)
}

#[cfg(not(feature = "basic-engine"))]
fn read_metadata(_path: &Path) -> Result<PdfMetadata> {
    Err(ConvertError::Pdf(
        "metadata support requires the `basic-engine` feature".to_string(),
    ))
}

/// Decode a PDF text string: UTF-16BE with BOM, else UTF-8, else Latin-1
#[cfg(feature = "basic-engine")]
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::path::PathBuf;

    /// Engine double whose pages are fixed; `None` pages fail
    struct FixedEngine {
        name: &'static str,
        pages: Vec<Option<&'static str>>,
    }

    struct FixedPages(Vec<Option<&'static str>>);

    impl PdfEngine for FixedEngine {
        fn name(&self) -> &'static str {
            self.name
        }

        fn load(&self, _path: &Path) -> Result<Box<dyn PdfPages>> {
            Ok(Box::new(FixedPages(self.pages.clone())))
        }
    }

    impl PdfPages for FixedPages {
        fn page_count(&self) -> usize {
            self.0.len()
        }

        fn page_text(&mut self, index: usize) -> Result<String> {
            self.0[index]
                .map(str::to_string)
                .ok_or_else(|| ConvertError::Pdf(format!("broken page {}", index + 1)))
        }
    }

    struct BrokenEngine;

    impl PdfEngine for BrokenEngine {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn load(&self, path: &Path) -> Result<Box<dyn PdfPages>> {
            Err(ConvertError::Pdf(format!("cannot open {:?}", path)))
        }
    }

    fn fixed(name: &'static str, pages: &[Option<&'static str>]) -> Box<dyn PdfEngine> {
        Box::new(FixedEngine {
            name,
            pages: pages.to_vec(),
        })
    }

    fn any_path() -> PathBuf {
        PathBuf::from("document.pdf")
    }

    #[test]
    fn test_fallback_used_when_primary_is_empty() {
        let extractor = PdfTextExtractor::with_engines(vec![
            fixed("primary", &[Some(""), Some("   \n ")]),
            fixed("fallback", &[Some("Fallback text")]),
        ])
        .unwrap();

        assert_eq!(extractor.extract(&any_path(), &NoProgress).unwrap(), "Fallback text");
    }

    #[test]
    fn test_fallback_used_when_primary_fails() {
        let extractor = PdfTextExtractor::with_engines(vec![
            Box::new(BrokenEngine),
            fixed("fallback", &[Some("Recovered")]),
        ])
        .unwrap();

        assert_eq!(extractor.extract_text(&any_path(), &NoProgress), "Recovered");
    }

    #[test]
    fn test_primary_text_wins() {
        let extractor = PdfTextExtractor::with_engines(vec![
            fixed("primary", &[Some("From primary")]),
            fixed("fallback", &[Some("From fallback")]),
        ])
        .unwrap();

        assert_eq!(extractor.extract(&any_path(), &NoProgress).unwrap(), "From primary");
    }

    #[test]
    fn test_pages_are_cleaned_and_failed_pages_skipped() {
        let extractor = PdfTextExtractor::with_engines(vec![fixed(
            "primary",
            &[Some("  a   b \n\n c "), None, Some(""), Some("last page")],
        )])
        .unwrap();

        assert_eq!(
            extractor.extract(&any_path(), &NoProgress).unwrap(),
            "a b\nc\n\nlast page"
        );
    }

    #[test]
    fn test_failed_page_keeps_rest_of_primary_text() {
        let extractor = PdfTextExtractor::with_engines(vec![
            fixed("primary", &[Some("First page"), None, Some("Third page")]),
            fixed("fallback", &[Some("From fallback")]),
        ])
        .unwrap();

        assert_eq!(
            extractor.extract(&any_path(), &NoProgress).unwrap(),
            "First page\n\nThird page"
        );
    }

    #[cfg(all(feature = "layout-engine", feature = "basic-engine"))]
    #[test]
    fn test_layout_engine_reads_pages_individually() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hello.pdf");
        crate::test_support::write_sample_pdf(&path, "Hello World");

        let mut pages = LayoutEngine.load(&path).unwrap();
        assert_eq!(pages.page_count(), 1);
        assert!(pages.page_text(0).unwrap().contains("Hello"));
        assert!(matches!(pages.page_text(1), Err(ConvertError::Pdf(_))));
    }

    #[test]
    fn test_all_engines_failing_is_an_error() {
        let extractor =
            PdfTextExtractor::with_engines(vec![Box::new(BrokenEngine), Box::new(BrokenEngine)]).unwrap();

        assert!(matches!(
            extractor.extract(&any_path(), &NoProgress),
            Err(ConvertError::Pdf(_))
        ));
        assert_eq!(extractor.extract_text(&any_path(), &NoProgress), "");
    }

    #[test]
    fn test_empty_document_is_not_an_error() {
        let extractor = PdfTextExtractor::with_engines(vec![
            Box::new(BrokenEngine),
            fixed("fallback", &[Some(""), Some("")]),
        ])
        .unwrap();

        assert_eq!(extractor.extract(&any_path(), &NoProgress).unwrap(), "");
    }

    #[test]
    fn test_no_engines_is_no_backend() {
        assert!(matches!(
            PdfTextExtractor::with_engines(Vec::new()),
            Err(ConvertError::NoBackend)
        ));
    }

    #[test]
    fn test_progress_reports_fallback() {
        let extractor = PdfTextExtractor::with_engines(vec![
            fixed("primary", &[Some("")]),
            fixed("fallback", &[Some("x"), Some("y")]),
        ])
        .unwrap();

        let messages = std::cell::RefCell::new(Vec::new());
        let sink = |percent: u8, message: &str| messages.borrow_mut().push((percent, message.to_string()));
        extractor.extract(&any_path(), &sink).unwrap();

        let messages = messages.into_inner();
        assert_eq!(messages[0], (20, "Opening PDF file...".to_string()));
        assert!(messages
            .iter()
            .any(|(p, m)| *p == 30 && m == "Trying alternative extraction method..."));
        assert!(messages.iter().all(|(p, _)| *p <= 80));
    }

    #[cfg(feature = "basic-engine")]
    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"Plain"), "Plain");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(decode_pdf_string(&[0x43, 0x61, 0x66, 0xE9]), "Caf\u{e9}");
    }

    #[cfg(feature = "basic-engine")]
    #[test]
    fn test_real_pdf_extraction_and_metadata() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hello.pdf");
        crate::test_support::write_sample_pdf(&path, "Hello World");

        let extractor = PdfTextExtractor::new().unwrap();
        let text = extractor.extract(&path, &NoProgress).unwrap();
        assert!(text.contains("Hello"), "unexpected text: {:?}", text);

        let metadata = extractor.get_metadata(&path);
        assert_eq!(metadata.pages, 1);
        assert_eq!(metadata.title, "Sample PDF");
        assert_eq!(metadata.author, "");
    }

    #[test]
    fn test_metadata_of_missing_file_is_default() {
        let extractor = PdfTextExtractor::with_engines(vec![Box::new(BrokenEngine)]).unwrap();
        assert_eq!(
            extractor.get_metadata(Path::new("/nonexistent/file.pdf")),
            PdfMetadata::default()
        );
    }
}
