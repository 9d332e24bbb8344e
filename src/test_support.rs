//! Fixture builders shared by the unit tests

use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write a zip archive containing exactly `files`
pub(crate) fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap();
}

fn container_xml(package_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        package_path
    )
}

/// Write an EPUB with the given package document and raw content files
pub(crate) fn write_epub_bytes(path: &Path, package_path: &str, opf: &str, files: &[(&str, &[u8])]) {
    let container = container_xml(package_path);
    let mut entries: Vec<(&str, &[u8])> = vec![
        ("mimetype", b"application/epub+zip".as_slice()),
        ("META-INF/container.xml", container.as_bytes()),
        (package_path, opf.as_bytes()),
    ];
    entries.extend_from_slice(files);

    write_zip(path, &entries);
}

pub(crate) fn write_epub(path: &Path, package_path: &str, opf: &str, files: &[(&str, &str)]) {
    let files: Vec<(&str, &[u8])> = files.iter().map(|(name, body)| (*name, body.as_bytes())).collect();
    write_epub_bytes(path, package_path, opf, &files);
}

/// OPF package document with fixed metadata, the given manifest items
/// (id, href) and spine idrefs
pub(crate) fn package_document(items: &[(&str, &str)], spine: &[&str]) -> String {
    let manifest: String = items
        .iter()
        .map(|(id, href)| {
            format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                id, href
            )
        })
        .collect();
    let itemrefs: String = spine
        .iter()
        .map(|idref| format!("    <itemref idref=\"{}\"/>\n", idref))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Sample Book</dc:title>
    <dc:creator>Jane Doe</dc:creator>
    <dc:creator>John Roe</dc:creator>
    <dc:language>en</dc:language>
    <dc:publisher>Acme &amp; Sons</dc:publisher>
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:date>2020-01-01</dc:date>
  </metadata>
  <manifest>
{}  </manifest>
  <spine>
{}  </spine>
</package>"#,
        manifest, itemrefs
    )
}

/// EPUB under `OEBPS/` with one XHTML chapter per entry of `chapters`
pub(crate) fn write_sample_epub(path: &Path, chapters: &[&str]) {
    let ids: Vec<String> = (1..=chapters.len()).map(|n| format!("ch{}", n)).collect();
    let hrefs: Vec<String> = ids.iter().map(|id| format!("{}.xhtml", id)).collect();
    let items: Vec<(&str, &str)> = ids.iter().map(String::as_str).zip(hrefs.iter().map(String::as_str)).collect();
    let spine: Vec<&str> = ids.iter().map(String::as_str).collect();
    let opf = package_document(&items, &spine);

    let names: Vec<String> = hrefs.iter().map(|href| format!("OEBPS/{}", href)).collect();
    let bodies: Vec<String> = chapters
        .iter()
        .map(|text| {
            format!(
                "<?xml version=\"1.0\"?><html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Chapter</title></head><body><p>{}</p></body></html>",
                text
            )
        })
        .collect();
    let files: Vec<(&str, &str)> = names
        .iter()
        .map(String::as_str)
        .zip(bodies.iter().map(String::as_str))
        .collect();

    write_epub(path, "OEBPS/content.opf", &opf, &files);
}

/// Single-page PDF showing `text` in Helvetica, titled "Sample PDF"
#[cfg(feature = "basic-engine")]
pub(crate) fn write_sample_pdf(path: &Path, text: &str) {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Sample PDF"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    doc.save(path).unwrap();
}
