//! Integration tests for filling DOCX templates
//!
//! Templates are assembled in memory as minimal WordprocessingML packages and
//! run through the same rendering path the publisher uses.

use affairs_digest::article::parse_article;
use affairs_digest::docx::DocxDocument;
use affairs_digest::{render_docx, Article, ContentBlock, DigestError};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const STYLES_ALL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"/>
<w:style w:type="paragraph" w:styleId="Heading1"/>
<w:style w:type="paragraph" w:styleId="Heading2"/>
<w:style w:type="paragraph" w:styleId="Heading4"/>
<w:style w:type="paragraph" w:styleId="ListBullet"/>
</w:styles>"#;

const STYLES_NO_BULLET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"/>
<w:style w:type="paragraph" w:styleId="Heading1"/>
</w:styles>"#;

fn paragraph(text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>{}</w:t></w:r></w:p>"#,
        text
    )
}

fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#,
        body
    )
}

fn build_docx(body: &str, styles: Option<&str>) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    writer
        .start_file("[Content_Types].xml", SimpleFileOptions::default())
        .unwrap();
    writer
        .write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(document_xml(body).as_bytes()).unwrap();
    if let Some(styles) = styles {
        writer
            .start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(styles.as_bytes()).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

fn template_body() -> String {
    [
        paragraph("Daily Digest"),
        paragraph("START_CONTENT"),
        paragraph("placeholder text to be removed"),
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>old table</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#
            .to_string(),
        paragraph("END_CONTENT"),
        paragraph("Footer"),
    ]
    .concat()
}

fn article(url: &str, title: &str, rest: Vec<ContentBlock>) -> Article {
    let mut blocks = vec![ContentBlock::Heading(title.to_string())];
    blocks.extend(rest);
    Article {
        url: url.to_string(),
        title: title.to_string(),
        blocks,
    }
}

fn part_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(|n| n.to_string()).collect()
}

fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

#[test]
fn content_replaces_region_between_markers() {
    let template = build_docx(&template_body(), Some(STYLES_ALL));
    let articles = vec![
        article(
            "https://x.test/a/",
            "First article",
            vec![
                ContentBlock::Paragraph("Body & more".to_string()),
                ContentBlock::ListItem("• point".to_string()),
            ],
        ),
        article(
            "https://x.test/b/",
            "Second article",
            vec![ContentBlock::Heading2("Background".to_string())],
        ),
    ];

    let rendered = render_docx(&template, &articles).unwrap();
    let document = DocxDocument::from_bytes(&rendered).unwrap();

    assert_eq!(
        document.paragraph_texts().unwrap(),
        vec![
            "Daily Digest",
            "",
            "First article",
            "Body & more",
            "• point",
            "Second article",
            "Background",
            "",
            "Footer",
        ]
    );

    let xml = document.document_xml();
    assert!(!xml.contains("placeholder text to be removed"));
    assert!(!xml.contains("old table"));
    assert!(!xml.contains("START_CONTENT"));
    assert!(!xml.contains("END_CONTENT"));
    assert!(xml.contains(r#"<w:pStyle w:val="Heading1"/>"#));
    assert!(xml.contains(r#"<w:pStyle w:val="ListBullet"/>"#));
    assert!(xml.contains(r#"<w:pStyle w:val="Heading2"/>"#));
    assert!(xml.contains("Body &amp; more"));
    // section properties survive
    assert!(xml.contains(r#"<w:pgSz w:w="11906" w:h="16838"/>"#));
}

#[test]
fn marker_paragraph_properties_are_kept() {
    let template = build_docx(&template_body(), Some(STYLES_ALL));
    let rendered = render_docx(&template, &[article("https://x.test/a/", "T", vec![])]).unwrap();
    let xml = read_part(&rendered, "word/document.xml");

    // Both cleared markers keep their centring but lose their runs
    assert_eq!(
        xml.matches(r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr></w:p>"#)
            .count(),
        2
    );
}

#[test]
fn missing_list_style_falls_back_to_normal() {
    let template = build_docx(&template_body(), Some(STYLES_NO_BULLET));
    let rendered = render_docx(
        &template,
        &[article(
            "https://x.test/a/",
            "T",
            vec![ContentBlock::ListItem("• item".to_string())],
        )],
    )
    .unwrap();
    let xml = read_part(&rendered, "word/document.xml");

    assert!(!xml.contains("ListBullet"));
    assert!(xml.contains(
        r#"<w:p><w:r><w:t xml:space="preserve">• item</w:t></w:r></w:p>"#
    ));
}

#[test]
fn template_without_markers_is_rejected() {
    let template = build_docx(&paragraph("No markers here"), Some(STYLES_ALL));
    let err = render_docx(&template, &[article("https://x.test/a/", "T", vec![])]).unwrap_err();
    assert!(matches!(err, DigestError::PlaceholderMissing));
}

#[test]
fn non_docx_bytes_are_rejected() {
    let err = render_docx(b"<html>not a docx</html>", &[]).unwrap_err();
    assert!(matches!(err, DigestError::ArchiveError(_)));
}

#[test]
fn archive_without_document_part_is_rejected() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/styles.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(STYLES_ALL.as_bytes()).unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let err = DocxDocument::from_bytes(&bytes).err().unwrap();
    assert!(matches!(err, DigestError::DocumentError(_)));
}

#[test]
fn other_parts_are_preserved_in_order() {
    let template = build_docx(&template_body(), Some(STYLES_ALL));
    let rendered = render_docx(&template, &[article("https://x.test/a/", "T", vec![])]).unwrap();

    assert_eq!(part_names(&rendered), part_names(&template));
    assert_eq!(read_part(&rendered, "word/styles.xml"), STYLES_ALL);
}

#[test]
fn scraped_article_renders_end_to_end() {
    let html = r#"
        <div class="inside_post column content_width">
            <h1 id="list">India wins the cup</h1>
            <p>India beat the hosts in the final.</p>
            <ul><li>Venue: Lord's</li></ul>
            <div class="prenext">nav</div>
        </div>
    "#;
    let parsed = parse_article("https://x.test/cup/", html).unwrap();
    let template = build_docx(&template_body(), Some(STYLES_ALL));

    let rendered = render_docx(&template, &[parsed]).unwrap();
    let texts = DocxDocument::from_bytes(&rendered)
        .unwrap()
        .paragraph_texts()
        .unwrap();

    assert_eq!(
        texts,
        vec![
            "Daily Digest",
            "",
            "India wins the cup",
            "India beat the hosts in the final.",
            "• Venue: Lord's",
            "",
            "Footer",
        ]
    );
}

/// Overwrite the uncompressed size recorded for `name` in both the local and
/// central directory headers
fn declare_size(bytes: &mut [u8], name: &str, size: u32) {
    let name = name.as_bytes();
    let mut i = 0;
    while i + 4 <= bytes.len() {
        let (size_at, name_len_at, name_at) = match &bytes[i..i + 4] {
            b"PK\x03\x04" => (22, 26, 30),
            b"PK\x01\x02" => (24, 28, 46),
            _ => {
                i += 1;
                continue;
            }
        };
        let name_len = u16::from_le_bytes([bytes[i + name_len_at], bytes[i + name_len_at + 1]]);
        let start = i + name_at;
        if bytes.get(start..start + name_len as usize) == Some(name) {
            bytes[i + size_at..i + size_at + 4].copy_from_slice(&size.to_le_bytes());
        }
        i += 4;
    }
}

#[test]
fn huge_declared_part_size_does_not_preallocate() {
    let mut template = build_docx(&template_body(), Some(STYLES_ALL));
    declare_size(&mut template, "word/styles.xml", 0xFFFF_0000);

    match DocxDocument::from_bytes(&template) {
        Ok(document) => assert!(document.document_xml().contains("START_CONTENT")),
        Err(err) => assert!(matches!(
            err,
            DigestError::ArchiveError(_) | DigestError::FsError(_)
        )),
    }
}
