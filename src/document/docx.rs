//! DOCX (WordprocessingML) reading and writing.
//!
//! Reading goes DOCX → simplified HTML → plain text: paragraphs, headings,
//! list items and line breaks survive; styling, tables and images do not.
//! Writing produces the smallest package Word accepts: content types, the
//! package relationship, and `word/document.xml`.

use crate::error::ConvertError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";

// ── Reading ──────────────────────────────────────────────────────────────

static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*?)?(?:/>|>(.*?)</w:p>)").unwrap());

static PARAGRAPH_PROPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:pPr>(.*?)</w:pPr>").unwrap());

static HEADING_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:pStyle\s+w:val="(?:Heading|heading)\s?([1-6])""#).unwrap());

static RUN_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:t\s*/>|<w:br\b[^>]*/>|<w:cr\s*/>|<w:tab\s*/>")
        .unwrap()
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static BREAKING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p>|</li>|</h[1-6]>").unwrap());

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<li(?:\s[^>]*)?>").unwrap());

static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Block kinds recognised in a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Paragraph,
    Heading(u8),
    ListItem,
}

fn read_document_xml(bytes: &[u8]) -> Result<String, ConvertError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ConvertError::decode("DOCX", e))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| ConvertError::decode("DOCX", format!("missing {DOCUMENT_PART}")))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| ConvertError::decode("DOCX", e))?;
    Ok(xml)
}

/// Inline HTML for a paragraph body. Text stays XML-escaped, which is also
/// valid HTML escaping.
fn paragraph_inline_html(body: &str) -> String {
    let mut html = String::new();
    for cap in RUN_CONTENT.captures_iter(body) {
        let whole = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        if let Some(text) = cap.get(1) {
            html.push_str(text.as_str());
        } else if whole.starts_with("<w:br") || whole.starts_with("<w:cr") {
            html.push_str("<br>");
        } else if whole.starts_with("<w:tab") {
            html.push('\t');
        }
    }
    html
}

/// Convert a DOCX package to simplified HTML.
pub fn docx_to_html(bytes: &[u8]) -> Result<String, ConvertError> {
    let xml = read_document_xml(bytes)?;
    let mut html = String::new();
    let mut in_list = false;

    for cap in PARAGRAPH.captures_iter(&xml) {
        let inner = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        let props = PARAGRAPH_PROPS
            .captures(inner)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let body = PARAGRAPH_PROPS.replace(inner, "");

        let block = if let Some(level) = HEADING_STYLE
            .captures(props)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok())
        {
            Block::Heading(level)
        } else if props.contains("<w:numPr>") {
            Block::ListItem
        } else {
            Block::Paragraph
        };

        if in_list && block != Block::ListItem {
            html.push_str("</ul>");
            in_list = false;
        }

        let content = paragraph_inline_html(&body);
        match block {
            Block::Heading(n) => html.push_str(&format!("<h{n}>{content}</h{n}>")),
            Block::ListItem => {
                if !in_list {
                    html.push_str("<ul>");
                    in_list = true;
                }
                html.push_str(&format!("<li>{content}</li>"));
            }
            Block::Paragraph => html.push_str(&format!("<p>{content}</p>")),
        }
    }
    if in_list {
        html.push_str("</ul>");
    }
    Ok(html)
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Flatten simplified HTML to plain text.
///
/// Block ends and `<br>` become line breaks, list items get a `- ` bullet,
/// every other tag is dropped and the common entities are decoded.
pub fn html_to_text(html: &str) -> String {
    let text = LIST_ITEM.replace_all(html, "- ");
    let text = BREAKING_TAG.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_BLANK_LINES
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

/// DOCX → plain text.
pub fn docx_to_text(bytes: &[u8]) -> Result<String, ConvertError> {
    Ok(html_to_text(&docx_to_html(bytes)?))
}

// ── Writing ──────────────────────────────────────────────────────────────

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            // XML 1.0 forbids most C0 controls
            c if (c as u32) < 0x20 && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}

fn paragraph_xml(line: &str) -> String {
    if line.is_empty() {
        return "<w:p/>".to_string();
    }
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape_xml(line)
    )
}

/// Build a DOCX with one paragraph per line and a page break between pages.
pub fn write_docx(pages: &[Vec<String>]) -> Result<Vec<u8>, ConvertError> {
    let mut body = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            body.push_str(PAGE_BREAK);
        }
        for line in page {
            body.push_str(&paragraph_xml(line));
        }
    }
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        (DOCUMENT_PART, document.as_str()),
    ] {
        zip.start_file(name, options)
            .map_err(|e| ConvertError::encode("DOCX", e))?;
        zip.write_all(data.as_bytes())
            .map_err(|e| ConvertError::encode("DOCX", e))?;
    }
    let cursor = zip.finish().map_err(|e| ConvertError::encode("DOCX", e))?;
    Ok(cursor.into_inner())
}

/// Plain text → DOCX, one paragraph per line on a single page.
pub fn text_to_docx(text: &str) -> Result<Vec<u8>, ConvertError> {
    let lines: Vec<String> = text
        .replace("\r\n", "\n")
        .split('\n')
        .map(str::to_string)
        .collect();
    write_docx(&[lines])
}
