use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

// XHTML self-closing forms of elements that an HTML parser treats as raw text
// until the matching end tag, e.g. `<title/>`
static SELF_CLOSED_RAW_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(title|script|style|textarea)(\s[^<>]*?)?/>").expect("valid regex")
});

/// Elements whose content is never visible text
const INVISIBLE: &[&str] = &["head", "script", "style", "template", "noscript"];

const BLOCK: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Normalize extracted text into flat, line-oriented plain text.
///
/// Every line is trimmed and its interior whitespace runs collapsed to a single
/// space; lines left empty are dropped and the rest joined with `'\n'`.
/// The function is idempotent.
pub fn normalize_text(text: &str) -> String {
    text.split('\n')
        .map(|line| WHITESPACE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract visible text from an (X)HTML content document.
///
/// Block-level elements end up on their own lines, inline markup is removed
/// without breaking the surrounding text and entities are decoded by the
/// parser. The result is not normalized.
pub fn html_to_text(html: &str) -> String {
    let html = SELF_CLOSED_RAW_TEXT.replace_all(html, "<$1$2></$1>");
    let document = Html::parse_document(&html);

    let mut text = String::new();
    collect_text(document.root_element(), &mut text);
    text
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if INVISIBLE.contains(&name) {
        return;
    }

    let block = BLOCK.contains(&name);
    if block {
        out.push('\n');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    if block {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible(html: &str) -> String {
        normalize_text(&html_to_text(html))
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a   b  \n\n  \nc\n"), "a b\nc");
    }

    #[test]
    fn test_normalize_text_is_idempotent() {
        let raw = "\tFirst   line \r\n\n second\u{a0}\u{a0}line\n\n\n  third  ";
        let once = normalize_text(raw);
        assert_eq!(once, "First line\nsecond line\nthird");
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n\t\n "), "");
    }

    #[test]
    fn test_html_to_text_inline_and_block() {
        assert_eq!(
            visible("<p>Hello <b>World</b>!</p><p>Second</p>"),
            "Hello World!\nSecond"
        );
    }

    #[test]
    fn test_html_to_text_drops_invisible_content() {
        let html = r#"<?xml version="1.0"?>
<!DOCTYPE html>
<html><head><title>Ignored</title><style>p { color: red; }</style></head>
<body><p>Text</p><script>alert('hi');</script><!-- note --><div>More text</div></body></html>"#;
        assert_eq!(visible(html), "Text\nMore text");
    }

    #[test]
    fn test_html_to_text_line_breaks() {
        assert_eq!(visible("<div>one<br/>two<br />three</div>"), "one\ntwo\nthree");
    }

    #[test]
    fn test_html_entities_are_decoded() {
        assert_eq!(visible("<p>Caf&eacute; na&iuml;ve &euro;5</p>"), "Caf\u{e9} na\u{ef}ve \u{20ac}5");
        assert_eq!(visible("<p>Tom &amp; Jerry &#65;&#x42;</p>"), "Tom & Jerry AB");
        assert_eq!(visible("<p>&lt;b&gt; is not a tag</p>"), "<b> is not a tag");
    }

    #[test]
    fn test_markup_inside_attributes_is_not_text() {
        let html = r#"<p>Fig <img alt="x > y" src="a.png"/> end</p>"#;
        assert_eq!(visible(html), "Fig end");
    }

    #[test]
    fn test_self_closed_title_does_not_swallow_body() {
        let html = r#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title/></head><body><p>Body text</p></body></html>"#;
        assert_eq!(visible(html), "Body text");
    }
}
