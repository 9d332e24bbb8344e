use percent_encoding::percent_decode_str;
use quick_xml::encoding::Decoder;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, error, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use super::text_processor::{html_to_text, normalize_text};
use crate::error::{ConvertError, Result};
use crate::progress::{interpolate, ProgressSink};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Descriptive metadata from the package document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpubMetadata {
    pub title: String,
    pub author: String,
    pub language: String,
    pub publisher: String,
    pub identifier: String,
    pub date: String,
}

/// Parsed OPF package document
#[derive(Debug, Clone, Default)]
pub struct PackageDocument {
    pub metadata: EpubMetadata,
    /// Manifest id -> archive path, resolved against the package directory
    pub manifest: HashMap<String, String>,
    /// Archive paths of the content documents in reading order
    pub spine: Vec<String>,
}

/// Extracts plain text from EPUB files in spine order
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubTextExtractor;

impl EpubTextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the text of every spine document, joined by blank lines.
    ///
    /// Failures on a single content document are logged and skipped; failures
    /// to open the archive or locate the spine are returned as errors.
    pub fn extract(&self, path: &Path, progress: &dyn ProgressSink) -> Result<String> {
        info!("Extracting text from EPUB: {:?}", path);
        progress.report(20, "Opening EPUB file...");

        let mut archive = open_archive(path)?;
        let package_path = find_package_path(&mut archive)?;

        progress.report(30, "Reading package document...");
        let package = read_package(&mut archive, &package_path)?;

        if package.spine.is_empty() {
            return Err(ConvertError::Structure(format!(
                "no readable spine in {}",
                package_path
            )));
        }

        let total = package.spine.len();
        progress.report(40, &format!("Found {} content files...", total));

        let mut units = Vec::new();

        for (index, entry) in package.spine.iter().enumerate() {
            progress.report(
                interpolate(40, 50, index, total),
                &format!("Processing {}...", entry_name(entry)),
            );

            match read_entry(&mut archive, entry) {
                Ok(bytes) => {
                    let content = String::from_utf8_lossy(strip_bom(&bytes));
                    let cleaned = normalize_text(&html_to_text(&content));

                    if cleaned.is_empty() {
                        debug!("No visible text in {}", entry);
                    } else {
                        units.push(cleaned);
                    }
                }
                Err(e) => {
                    warn!("Error processing content file {}: {}", entry, e);
                }
            }
        }

        progress.report(90, "Finalizing text extraction...");

        let text = units.join("\n\n");
        info!(
            "Extracted {} characters from {} of {} content files in {:?}",
            text.len(),
            units.len(),
            total,
            path
        );

        Ok(text)
    }

    /// Best-effort variant of [`extract`](Self::extract): logs failures and returns
    /// an empty string instead.
    pub fn extract_text(&self, path: &Path, progress: &dyn ProgressSink) -> String {
        self.extract(path, progress).unwrap_or_else(|e| {
            error!("Error extracting text from EPUB {:?}: {}", path, e);
            String::new()
        })
    }

    /// Read the descriptive metadata; never fails, missing fields stay empty
    pub fn get_metadata(&self, path: &Path) -> EpubMetadata {
        let result = open_archive(path).and_then(|mut archive| {
            let package_path = find_package_path(&mut archive)?;
            read_package(&mut archive, &package_path)
        });

        match result {
            Ok(package) => package.metadata,
            Err(e) => {
                warn!("Error extracting metadata from {:?}: {}", path, e);
                EpubMetadata::default()
            }
        }
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let archive_error = |source: ZipError| ConvertError::Archive {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|e| archive_error(ZipError::from(e)))?;
    ZipArchive::new(file).map_err(archive_error)
}

fn find_package_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let container = read_entry(archive, CONTAINER_PATH)
        .map_err(|e| ConvertError::Structure(format!("cannot read {}: {}", CONTAINER_PATH, e)))?;

    parse_container_xml(&container)
}

fn read_package<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    package_path: &str,
) -> Result<PackageDocument> {
    let bytes = read_entry(archive, package_path)
        .map_err(|e| ConvertError::Structure(format!("cannot read {}: {}", package_path, e)))?;
    let content = String::from_utf8_lossy(strip_bom(&bytes));

    let package = parse_package_document(&content, package_path)?;
    debug!(
        "Package {}: {} manifest items, {} spine entries",
        package_path,
        package.manifest.len(),
        package.spine.len()
    );

    Ok(package)
}

/// Find the package document path in `META-INF/container.xml`
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8_lossy(strip_bom(bytes));
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(full_path) = attribute(&e, b"full-path", reader.decoder()) {
                    if !full_path.is_empty() {
                        return Ok(full_path);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConvertError::Structure(format!(
                    "malformed {}: {}",
                    CONTAINER_PATH, e
                )))
            }
            _ => {}
        }
    }

    Err(ConvertError::Structure(format!(
        "no rootfile found in {}",
        CONTAINER_PATH
    )))
}

/// Parse an OPF package document located at `package_path` inside the archive.
///
/// Spine idrefs missing from the manifest are dropped.
pub fn parse_package_document(content: &str, package_path: &str) -> Result<PackageDocument> {
    let base_dir = Path::new(package_path)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();

    // Text is not trimmed per event: entity references split it into pieces
    let mut reader = Reader::from_str(content);
    let decoder = reader.decoder();

    let mut metadata = EpubMetadata::default();
    let mut manifest = HashMap::new();
    let mut spine_ids = Vec::new();

    let mut in_metadata = false;
    let mut current_field: Option<Vec<u8>> = None;
    let mut buf_text = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            ConvertError::Structure(format!("malformed package document {}: {}", package_path, e))
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = true,
                    b"item" => {
                        if let (Some(id), Some(href)) = (attribute(e, b"id", decoder), attribute(e, b"href", decoder)) {
                            if !id.is_empty() && !href.is_empty() {
                                manifest.insert(id, resolve_href(&base_dir, &href));
                            }
                        }
                    }
                    b"itemref" => {
                        if let Some(idref) = attribute(e, b"idref", decoder) {
                            spine_ids.push(idref);
                        }
                    }
                    field @ (b"title" | b"creator" | b"language" | b"publisher" | b"identifier" | b"date")
                        if in_metadata && is_start =>
                    {
                        current_field = Some(field.to_vec());
                        buf_text.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current_field.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if current_field.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                if current_field.is_some() {
                    push_reference(&mut buf_text, &e);
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata" {
                    in_metadata = false;
                }

                if current_field.as_deref() == Some(local) {
                    let value = buf_text.trim().to_string();
                    let slot = match local {
                        b"title" => &mut metadata.title,
                        b"creator" => &mut metadata.author,
                        b"language" => &mut metadata.language,
                        b"publisher" => &mut metadata.publisher,
                        b"identifier" => &mut metadata.identifier,
                        _ => &mut metadata.date,
                    };
                    // First occurrence wins
                    if slot.is_empty() {
                        *slot = value;
                    }
                    current_field = None;
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut spine = Vec::with_capacity(spine_ids.len());
    for idref in spine_ids {
        match manifest.get(&idref) {
            Some(entry) => spine.push(entry.clone()),
            None => warn!("Spine item {:?} is not in the manifest, skipping", idref),
        }
    }

    Ok(PackageDocument {
        metadata,
        manifest,
        spine,
    })
}

/// Read an archive entry, falling back to the percent-decoded name
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> std::result::Result<Vec<u8>, ZipError> {
    let mut contents = Vec::new();

    match archive.by_name(name) {
        Ok(mut file) => {
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(ZipError::FileNotFound) => {}
        Err(e) => return Err(e),
    }

    let decoded = percent_decode_str(name)
        .decode_utf8()
        .map_err(|_| ZipError::FileNotFound)?;
    if decoded == name {
        return Err(ZipError::FileNotFound);
    }

    let mut file = archive.by_name(&decoded)?;
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Resolve a manifest href against the package document's directory
fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);

    let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

/// Unescaped value of the attribute whose local name is `key`
fn attribute(element: &BytesStart, key: &[u8], decoder: Decoder) -> Option<String> {
    let attr = element
        .attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == key)?;

    match attr.decode_and_unescape_value(decoder) {
        Ok(value) => Some(value.into_owned()),
        Err(e) => {
            warn!("Cannot unescape attribute {}: {}", String::from_utf8_lossy(key), e);
            None
        }
    }
}

/// Append the text a character or predefined entity reference stands for.
/// Other entities have no definition without a DTD and are kept verbatim.
fn push_reference(out: &mut String, reference: &BytesRef) {
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        out.push(ch);
        return;
    }

    let name = reference.decode().unwrap_or_default();
    match resolve_predefined_entity(&name) {
        Some(text) => out.push_str(text),
        None => {
            out.push('&');
            out.push_str(&name);
            out.push(';');
        }
    }
}

/// Local part of a namespaced XML name ("opf:item" -> "item")
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

fn entry_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}
