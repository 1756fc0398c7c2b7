//! DOCX template manipulation
//!
//! A `.docx` file is a zip archive whose main part, `word/document.xml`,
//! holds a `<w:body>` with paragraphs (`<w:p>`), tables and a trailing
//! section properties element. Generated content replaces everything between
//! the `START_CONTENT` and `END_CONTENT` marker paragraphs of the body.
//!
//! Only the top level of the body is interpreted; nested markup (tables,
//! text boxes, fields) is carried over byte for byte.

use crate::article::ContentBlock;
use crate::error::{DigestError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";

pub const START_PLACEHOLDER: &str = "START_CONTENT";
pub const END_PLACEHOLDER: &str = "END_CONTENT";

const NORMAL_STYLE: &str = "Normal";

/// Paragraph style id used for a content block
pub fn style_for(block: &ContentBlock) -> &'static str {
    match block {
        ContentBlock::Heading(_) => "Heading1",
        ContentBlock::Paragraph(_) => NORMAL_STYLE,
        ContentBlock::Heading2(_) => "Heading2",
        ContentBlock::Heading4(_) => "Heading4",
        ContentBlock::ListItem(_) => "ListBullet",
    }
}

struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
}

/// An in-memory DOCX package
pub struct DocxDocument {
    entries: Vec<ArchiveEntry>,
    document_index: usize,
    document_xml: String,
    /// Style ids declared in `word/styles.xml`; `None` when the part is absent
    styles: Option<HashSet<String>>,
}

impl DocxDocument {
    /// Open a DOCX package from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(ArchiveEntry { name, data });
        }

        let document_index = entries
            .iter()
            .position(|e| e.name == DOCUMENT_PART)
            .ok_or_else(|| DigestError::DocumentError(format!("{} is missing", DOCUMENT_PART)))?;

        let document_xml = String::from_utf8(entries[document_index].data.clone())
            .map_err(|e| DigestError::DocumentError(format!("{} is not UTF-8: {}", DOCUMENT_PART, e)))?;

        let styles = entries
            .iter()
            .find(|e| e.name == STYLES_PART)
            .map(|e| declared_style_ids(&String::from_utf8_lossy(&e.data)));

        debug!(
            "Opened DOCX with {} parts, {} styles",
            entries.len(),
            styles.as_ref().map(|s| s.len()).unwrap_or(0)
        );

        Ok(Self {
            entries,
            document_index,
            document_xml,
            styles,
        })
    }

    /// Serialize the package back into DOCX bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for (i, entry) in self.entries.iter().enumerate() {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            if entry.name.ends_with('/') {
                writer.add_directory(entry.name.as_str(), options)?;
                continue;
            }

            writer.start_file(entry.name.as_str(), options)?;
            if i == self.document_index {
                writer.write_all(self.document_xml.as_bytes())?;
            } else {
                writer.write_all(&entry.data)?;
            }
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }

    /// Raw XML of the main document part
    pub fn document_xml(&self) -> &str {
        &self.document_xml
    }

    /// Whether the template declares a paragraph style id
    pub fn has_style(&self, style_id: &str) -> bool {
        match &self.styles {
            Some(styles) => styles.contains(style_id),
            None => true,
        }
    }

    /// Text of every top-level body paragraph, in order
    pub fn paragraph_texts(&self) -> Result<Vec<String>> {
        let body = Body::parse(&self.document_xml)?;
        Ok(body
            .nodes
            .iter()
            .filter(|n| n.is_paragraph())
            .map(|n| paragraph_text(&n.xml))
            .collect())
    }

    /// Replace the region between the placeholder paragraphs with `blocks`
    ///
    /// Both marker paragraphs stay in place with their text cleared. Returns
    /// the number of paragraphs inserted.
    pub fn fill_placeholders(&mut self, blocks: &[ContentBlock]) -> Result<usize> {
        info!("Inserting content between placeholders");
        let body = Body::parse(&self.document_xml)?;
        let (start, end) = find_placeholders(&body.nodes)?;

        let mut warned: HashSet<&'static str> = HashSet::new();
        let generated: Vec<XmlNode> = blocks
            .iter()
            .map(|block| {
                let wanted = style_for(block);
                let style = if self.has_style(wanted) {
                    wanted
                } else {
                    if warned.insert(wanted) {
                        warn!(
                            "Style '{}' not found, falling back to '{}' style",
                            wanted, NORMAL_STYLE
                        );
                    }
                    NORMAL_STYLE
                };
                XmlNode {
                    name: Some("w:p".to_string()),
                    xml: paragraph_xml(style, block.text()),
                }
            })
            .collect();

        let removed = end - start - 1;
        let inserted = generated.len();

        let mut nodes = Vec::with_capacity(body.nodes.len() - removed + inserted);
        let mut iter = body.nodes.into_iter();
        nodes.extend(iter.by_ref().take(start));
        let start_node = iter.next().ok_or(DigestError::PlaceholderMissing)?;
        nodes.push(XmlNode {
            name: start_node.name,
            xml: clear_paragraph(&start_node.xml)?,
        });
        nodes.extend(generated);
        let end_node = iter.nth(removed).ok_or(DigestError::PlaceholderMissing)?;
        nodes.push(XmlNode {
            name: end_node.name,
            xml: clear_paragraph(&end_node.xml)?,
        });
        nodes.extend(iter);

        let mut xml = String::with_capacity(self.document_xml.len());
        xml.push_str(&body.prefix);
        for node in &nodes {
            xml.push_str(&node.xml);
        }
        xml.push_str(&body.suffix);
        self.document_xml = xml;

        debug!(
            "Removed {} body elements, inserted {} paragraphs",
            removed, inserted
        );
        Ok(inserted)
    }
}

/// Locate the marker paragraphs, as indices into the body nodes
///
/// The start marker is the last paragraph mentioning `START_CONTENT` before
/// the first paragraph mentioning `END_CONTENT`.
fn find_placeholders(nodes: &[XmlNode]) -> Result<(usize, usize)> {
    let mut start = None;
    let mut end = None;

    for (i, node) in nodes.iter().enumerate() {
        if !node.is_paragraph() {
            continue;
        }
        let text = paragraph_text(&node.xml);
        if text.contains(START_PLACEHOLDER) {
            start = Some(i);
        } else if text.contains(END_PLACEHOLDER) {
            end = Some(i);
            break;
        }
    }

    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok((s, e)),
        _ => Err(DigestError::PlaceholderMissing),
    }
}

#[derive(Debug, Clone)]
struct XmlNode {
    /// Element name; `None` for text, comments and processing instructions
    name: Option<String>,
    xml: String,
}

impl XmlNode {
    fn is_paragraph(&self) -> bool {
        self.name.as_deref() == Some("w:p")
    }
}

/// The body of `document.xml`, split into top-level nodes
struct Body {
    prefix: String,
    nodes: Vec<XmlNode>,
    suffix: String,
}

impl Body {
    fn parse(xml: &str) -> Result<Self> {
        let open = find_body_open(xml)?;
        let open_end = tag_end(xml, open)?;
        let close = xml
            .rfind("</w:body>")
            .filter(|&c| c >= open_end)
            .ok_or_else(|| DigestError::DocumentError("unterminated <w:body>".to_string()))?;

        Ok(Self {
            prefix: xml[..open_end].to_string(),
            nodes: split_children(&xml[open_end..close])?,
            suffix: xml[close..].to_string(),
        })
    }
}

fn find_body_open(xml: &str) -> Result<usize> {
    let mut from = 0;
    while let Some(offset) = xml[from..].find("<w:body") {
        let idx = from + offset;
        match xml.as_bytes().get(idx + "<w:body".len()) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => return Ok(idx),
            _ => from = idx + 1,
        }
    }
    Err(DigestError::DocumentError("no <w:body> element".to_string()))
}

enum Tag {
    Open(String),
    Empty(String),
    Close,
    Other,
}

/// Split an XML fragment into its top-level nodes
fn split_children(xml: &str) -> Result<Vec<XmlNode>> {
    let mut nodes = Vec::new();
    let mut pos = 0;
    let mut depth = 0usize;
    let mut text_start = 0;
    let mut element_start = 0;
    let mut element_name = String::new();

    while let Some(offset) = xml[pos..].find('<') {
        let lt = pos + offset;
        if depth == 0 && lt > text_start {
            nodes.push(XmlNode {
                name: None,
                xml: xml[text_start..lt].to_string(),
            });
        }

        let rest = &xml[lt..];
        let (end, tag) = if rest.starts_with("<!--") {
            (find_from(xml, lt, "-->")? + 3, Tag::Other)
        } else if rest.starts_with("<![CDATA[") {
            (find_from(xml, lt, "]]>")? + 3, Tag::Other)
        } else if rest.starts_with("<?") {
            (find_from(xml, lt, "?>")? + 2, Tag::Other)
        } else if rest.starts_with("<!") {
            (find_from(xml, lt, ">")? + 1, Tag::Other)
        } else if rest.starts_with("</") {
            (find_from(xml, lt, ">")? + 1, Tag::Close)
        } else {
            let end = tag_end(xml, lt)?;
            let name = tag_name(&xml[lt..end]);
            if xml[..end].ends_with("/>") {
                (end, Tag::Empty(name))
            } else {
                (end, Tag::Open(name))
            }
        };

        match tag {
            Tag::Other | Tag::Empty(_) if depth > 0 => {}
            Tag::Other => nodes.push(XmlNode {
                name: None,
                xml: xml[lt..end].to_string(),
            }),
            Tag::Empty(name) => nodes.push(XmlNode {
                name: Some(name),
                xml: xml[lt..end].to_string(),
            }),
            Tag::Open(name) => {
                if depth == 0 {
                    element_start = lt;
                    element_name = name;
                }
                depth += 1;
            }
            Tag::Close => {
                if depth == 0 {
                    return Err(DigestError::DocumentError(format!(
                        "unbalanced closing tag at byte {}",
                        lt
                    )));
                }
                depth -= 1;
                if depth == 0 {
                    nodes.push(XmlNode {
                        name: Some(std::mem::take(&mut element_name)),
                        xml: xml[element_start..end].to_string(),
                    });
                }
            }
        }

        pos = end;
        if depth == 0 {
            text_start = end;
        }
    }

    if depth != 0 {
        return Err(DigestError::DocumentError("unterminated element".to_string()));
    }
    if text_start < xml.len() {
        nodes.push(XmlNode {
            name: None,
            xml: xml[text_start..].to_string(),
        });
    }

    Ok(nodes)
}

fn find_from(xml: &str, from: usize, pattern: &str) -> Result<usize> {
    xml[from..]
        .find(pattern)
        .map(|offset| from + offset)
        .ok_or_else(|| DigestError::DocumentError(format!("unterminated markup at byte {}", from)))
}

/// Index just past the `>` closing the tag that starts at `lt`
fn tag_end(xml: &str, lt: usize) -> Result<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in xml.as_bytes()[lt..].iter().enumerate() {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(b),
            (None, b'>') => return Ok(lt + i + 1),
            _ => {}
        }
    }
    Err(DigestError::DocumentError(format!("unterminated tag at byte {}", lt)))
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
        .collect()
}

/// Drop the runs of a paragraph, keeping its properties
fn clear_paragraph(xml: &str) -> Result<String> {
    let open_end = tag_end(xml, 0)?;
    if open_end == xml.len() {
        // <w:p/>
        return Ok(xml.to_string());
    }
    let close = xml
        .rfind("</")
        .filter(|&c| c >= open_end)
        .ok_or_else(|| DigestError::DocumentError("unterminated paragraph".to_string()))?;

    let kept: String = split_children(&xml[open_end..close])?
        .into_iter()
        .filter(|n| n.name.as_deref() == Some("w:pPr"))
        .map(|n| n.xml)
        .collect();

    Ok(format!("{}{}{}", &xml[..open_end], kept, &xml[close..]))
}

/// Concatenated `w:t` text of a paragraph
fn paragraph_text(xml: &str) -> String {
    static TEXT_RE: OnceLock<Regex> = OnceLock::new();
    let text_re = TEXT_RE.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("invalid text regex")
    });

    text_re
        .captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .collect()
}

fn declared_style_ids(styles_xml: &str) -> HashSet<String> {
    static STYLE_ID_RE: OnceLock<Regex> = OnceLock::new();
    let style_id_re = STYLE_ID_RE
        .get_or_init(|| Regex::new(r#"w:styleId="([^"]+)""#).expect("invalid style regex"));

    style_id_re
        .captures_iter(styles_xml)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Build a paragraph with the given style; newlines become breaks and tabs become tab stops
fn paragraph_xml(style: &str, text: &str) -> String {
    let mut xml = String::from("<w:p>");
    if style != NORMAL_STYLE {
        xml.push_str(&format!(r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, style));
    }
    xml.push_str("<w:r>");

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            xml.push_str("<w:br/>");
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                xml.push_str("<w:tab/>");
            }
            if !segment.is_empty() {
                xml.push_str(r#"<w:t xml:space="preserve">"#);
                xml.push_str(&escape_xml(segment));
                xml.push_str("</w:t>");
            }
        }
    }

    xml.push_str("</w:r></w:p>");
    xml
}

/// Escape text content, dropping characters XML 1.0 cannot carry
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

fn unescape_xml(text: &str) -> String {
    static ENTITY_RE: OnceLock<Regex> = OnceLock::new();
    let entity_re = ENTITY_RE.get_or_init(|| {
        Regex::new(r"&(#x[0-9A-Fa-f]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("invalid entity regex")
    });

    entity_re
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        entity[1..].parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| caps[0].to_string())
                }
            }
        })
        .into_owned()
}
