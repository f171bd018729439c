//! EPUB extraction: container.xml -> OPF package -> spine documents -> text

use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Document;

/// One chapter of an EPUB in reading order
#[derive(Debug, Clone, PartialEq)]
pub struct EpubChapter {
    /// Position in the spine
    pub index: usize,
    /// Archive path of the XHTML file
    pub href: String,
    /// Extracted text
    pub text: String,
}

/// Read an EPUB file into one document per non-empty chapter
pub fn load_epub(path: &Path) -> Result<Vec<Document>> {
    let source = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| Error::ingestion(&source, e.to_string()))?;
    let chapters = read_chapters(file).map_err(|message| Error::ingestion(&source, message))?;

    Ok(chapters
        .into_iter()
        .filter(|c| !c.text.trim().is_empty())
        .map(|c| {
            Document::new(c.text, source.clone())
                .with_metadata("chapter", c.index)
                .with_metadata("href", c.href)
        })
        .collect())
}

/// Extract every spine item of an EPUB archive
pub fn read_chapters<R: Read + Seek>(reader: R) -> std::result::Result<Vec<EpubChapter>, String> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| format!("not a zip archive: {}", e))?;

    let container = read_entry(&mut archive, "META-INF/container.xml")?;
    let opf_path = rootfile_path(&container)?;
    let opf = read_entry(&mut archive, &opf_path)?;
    let (manifest, spine) = parse_package(&opf)?;

    let base_dir = match opf_path.rfind('/') {
        Some(i) => &opf_path[..=i],
        None => "",
    };

    let mut chapters = Vec::with_capacity(spine.len());
    for (index, idref) in spine.iter().enumerate() {
        let href = manifest
            .get(idref)
            .ok_or_else(|| format!("spine item '{}' missing from manifest", idref))?;
        let entry = resolve_href(base_dir, href);
        let html = read_entry(&mut archive, &entry)?;
        chapters.push(EpubChapter {
            index,
            href: entry,
            text: html_to_text(&html),
        });
    }

    Ok(chapters)
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> std::result::Result<String, String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| format!("missing entry '{}': {}", name, e))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| format!("failed to read '{}': {}", name, e))?;
    Ok(content)
}

/// `full-path` of the first `<rootfile>` in container.xml
fn rootfile_path(container: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(container);
    loop {
        match reader.read_event().map_err(|e| format!("invalid container.xml: {}", e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"rootfile" => {
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| format!("invalid container.xml: {}", e))?;
                    if attr.key.local_name().as_ref() == b"full-path" {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| format!("invalid container.xml: {}", e))?;
                        return Ok(value.into_owned());
                    }
                }
            }
            Event::Eof => return Err("container.xml has no rootfile".to_string()),
            _ => {}
        }
    }
}

/// Manifest (id -> href) and spine (ordered idrefs) of the OPF package
fn parse_package(
    opf: &str,
) -> std::result::Result<(HashMap<String, String>, Vec<String>), String> {
    let mut reader = Reader::from_str(opf);
    let mut manifest = HashMap::new();
    let mut spine = Vec::new();

    loop {
        match reader.read_event().map_err(|e| format!("invalid package document: {}", e))? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name();
                let mut attrs: HashMap<Vec<u8>, String> = HashMap::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| format!("invalid package document: {}", e))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| format!("invalid package document: {}", e))?;
                    attrs.insert(attr.key.local_name().as_ref().to_vec(), value.into_owned());
                }

                match name.as_ref() {
                    b"item" => {
                        if let (Some(id), Some(href)) = (attrs.remove(&b"id"[..]), attrs.remove(&b"href"[..])) {
                            manifest.insert(id, href);
                        }
                    }
                    b"itemref" => {
                        if let Some(idref) = attrs.remove(&b"idref"[..]) {
                            spine.push(idref);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if spine.is_empty() {
        return Err("package document has an empty spine".to_string());
    }
    Ok((manifest, spine))
}

/// Join an href relative to the package directory, folding `.` and `..`
fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Elements that start a new paragraph
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "div", "section",
    "article", "aside", "header", "footer", "nav", "main", "figure", "figcaption", "ul", "ol",
    "dl", "dt", "dd", "table", "tr", "td", "th", "hr", "br",
];

/// Elements whose content is never book text
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "title"];

/// Text of block-level elements separated by blank lines
///
/// The body is walked once, so nested blocks contribute their text a single
/// time and loose text in containers is kept.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body = Selector::parse("body").expect("static selector");
    let root = document.select(&body).next().unwrap_or_else(|| document.root_element());

    let mut paragraphs = Vec::new();
    let mut inline = String::new();
    collect_blocks(root, &mut inline, &mut paragraphs);
    flush_paragraph(&mut inline, &mut paragraphs);
    paragraphs.join("\n\n")
}

fn collect_blocks(element: ElementRef<'_>, inline: &mut String, paragraphs: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => inline.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if BLOCK_ELEMENTS.contains(&name) {
                    flush_paragraph(inline, paragraphs);
                    collect_blocks(child, inline, paragraphs);
                    flush_paragraph(inline, paragraphs);
                } else {
                    // inline markup (em, a, span, ...) stays in the current paragraph
                    collect_blocks(child, inline, paragraphs);
                }
            }
            _ => {}
        }
    }
}

fn flush_paragraph(inline: &mut String, paragraphs: &mut Vec<String>) {
    let text = normalize_whitespace(inline);
    if !text.is_empty() {
        paragraphs.push(text);
    }
    inline.clear();
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const PACKAGE: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <manifest>
    <item id="cover" href="Text/cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="Text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="Text/ch2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="cover"/>
    <itemref idref="ch2"/>
    <itemref idref="ch1"/>
  </spine>
</package>"#;

    /// Build a three-chapter EPUB in memory; the cover has no text
    pub(crate) fn sample_epub() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let files = [
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", PACKAGE),
            ("OEBPS/Text/cover.xhtml", "<html><body><img src=\"c.png\"/></body></html>"),
            (
                "OEBPS/Text/ch1.xhtml",
                "<html><head><title>One</title></head><body><h1>Chapter One</h1><p>Jaskier is a bard.</p></body></html>",
            ),
            (
                "OEBPS/Text/ch2.xhtml",
                "<html><body><p>Geralt   is a\n witcher.</p></body></html>",
            ),
        ];
        for (name, content) in files {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_reads_spine_in_order() {
        let chapters = read_chapters(Cursor::new(sample_epub())).unwrap();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].text, "");
        assert_eq!(chapters[1].href, "OEBPS/Text/ch2.xhtml");
        assert_eq!(chapters[1].text, "Geralt is a witcher.");
        assert_eq!(chapters[2].text, "Chapter One\n\nJaskier is a bard.");
    }

    #[test]
    fn test_load_epub_drops_empty_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libro.epub");
        std::fs::write(&path, sample_epub()).unwrap();

        let docs = load_epub(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.get("chapter"), Some(&serde_json::json!(1)));
        assert_eq!(docs[1].text, "Chapter One\n\nJaskier is a bard.");
    }

    #[test]
    fn test_not_an_epub_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        std::fs::write(&path, b"plain text").unwrap();

        let err = load_epub(&path).unwrap_err();
        assert!(matches!(err, Error::Ingestion { .. }));
    }

    #[test]
    fn test_nested_blocks_are_extracted_once() {
        let html = "<blockquote><p>Only once.</p></blockquote><ul><li><p>Item.</p></li></ul>";
        assert_eq!(html_to_text(html), "Only once.\n\nItem.");
    }

    #[test]
    fn test_div_text_next_to_heading_is_kept() {
        assert_eq!(
            html_to_text("<h1>Title</h1><div>Body text in a div.</div>"),
            "Title\n\nBody text in a div."
        );
    }

    #[test]
    fn test_inline_markup_stays_in_paragraph() {
        let html = "<html><head><style>p { color: red }</style></head><body>\
            <section>Loose <em>intro</em> text<p>A <a href=\"#n\">linked</a> word.</p></section>\
            <script>var x = 1;</script></body></html>";
        assert_eq!(html_to_text(html), "Loose intro text\n\nA linked word.");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS/", "Text/a.xhtml"), "OEBPS/Text/a.xhtml");
        assert_eq!(resolve_href("OEBPS/Text/", "../b.xhtml#frag"), "OEBPS/b.xhtml");
        assert_eq!(resolve_href("", "c.xhtml"), "c.xhtml");
    }
}
