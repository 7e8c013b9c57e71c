//! Slide text and speaker notes from OOXML presentations.
//!
//! Slides are read in presentation order (`p:sldIdLst`), not archive order.
//! Slide text joins the text of every shape with a space; a shape's text
//! joins its paragraphs with a newline. Notes are the body placeholder of
//! the slide's notes part.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::Result;

const NOTES_SLIDE_REL: &str = "/notesSlide";
const SLIDE_REL: &str = "/slide";

/// Text of one slide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideText {
    /// Text of all shapes, space separated
    pub text: String,
    /// Speaker notes, empty when the slide has none
    pub notes: String,
}

/// Read slide texts and notes from an OOXML presentation in memory.
pub fn read_slides(data: &[u8]) -> Result<Vec<SlideText>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let slide_paths = slide_parts(&mut archive)?;
    let mut slides = Vec::with_capacity(slide_paths.len());

    for path in slide_paths {
        let xml = read_part(&mut archive, &path)?;
        let text = shape_texts(&xml)?
            .into_iter()
            .map(|s| s.text)
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let notes = match notes_part(&mut archive, &path)? {
            Some(notes_path) => {
                let notes_xml = read_part(&mut archive, &notes_path)?;
                shape_texts(&notes_xml)?
                    .into_iter()
                    .filter(|s| s.placeholder.as_deref() == Some("body"))
                    .map(|s| s.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            None => String::new(),
        };

        slides.push(SlideText { text, notes });
    }

    log::debug!("Read {} slides from presentation", slides.len());
    Ok(slides)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut file = archive.by_name(name)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Paths of the slide parts, in presentation order.
fn slide_parts<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let presentation = read_part(archive, "ppt/presentation.xml")?;
    let rels = relationships(&read_part(archive, "ppt/_rels/presentation.xml.rels")?)?;

    let mut ids = Vec::new();
    let mut reader = Reader::from_str(&presentation);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"p:sldId" => {
                if let Some(id) = attribute(&e, &reader, b"r:id") {
                    ids.push(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let mut paths: Vec<String> = ids
        .iter()
        .filter_map(|id| rels.get(id))
        .filter(|rel| rel.kind.ends_with(SLIDE_REL))
        .map(|rel| resolve_part("ppt", &rel.target))
        .collect();

    // Some producers omit sldIdLst; fall back to numeric part order
    if paths.is_empty() {
        paths = rels
            .values()
            .filter(|rel| rel.kind.ends_with(SLIDE_REL))
            .map(|rel| resolve_part("ppt", &rel.target))
            .collect();
        paths.sort_by_key(|p| part_number(p));
    }

    Ok(paths)
}

/// The notes part related to a slide part, if any.
fn notes_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    slide_path: &str,
) -> Result<Option<String>> {
    let (dir, file) = slide_path.rsplit_once('/').unwrap_or(("", slide_path));
    let rels_path = format!("{dir}/_rels/{file}.rels");

    let rels_xml = match read_part(archive, &rels_path) {
        Ok(xml) => xml,
        // A slide without relationships has no notes
        Err(_) => return Ok(None),
    };

    Ok(relationships(&rels_xml)?
        .into_values()
        .find(|rel| rel.kind.ends_with(NOTES_SLIDE_REL))
        .map(|rel| resolve_part(dir, &rel.target)))
}

struct Relationship {
    kind: String,
    target: String,
}

fn relationships(xml: &str) -> Result<HashMap<String, Relationship>> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"Relationship" => {
                let id = attribute(&e, &reader, b"Id");
                let kind = attribute(&e, &reader, b"Type");
                let target = attribute(&e, &reader, b"Target");
                if let (Some(id), Some(kind), Some(target)) = (id, kind, target) {
                    rels.insert(id, Relationship { kind, target });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

fn attribute(e: &BytesStart<'_>, reader: &Reader<&[u8]>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.decode_and_unescape_value(reader).ok())
        .map(|v| v.to_string())
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_part(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn part_number(path: &str) -> u32 {
    path.trim_end_matches(".xml")
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .chars()
        .rev()
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// Placeholders without a type attribute are generic content placeholders.
fn placeholder_type(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> String {
    attribute(e, reader, b"type").unwrap_or_else(|| "obj".to_string())
}

/// Text of one `p:sp` shape.
#[derive(Debug, Default)]
struct ShapeText {
    placeholder: Option<String>,
    text: String,
}

/// Extract the text of every shape in a slide or notes part.
fn shape_texts(xml: &str) -> Result<Vec<ShapeText>> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml);
    // Keep whitespace inside runs
    reader.trim_text(false);
    let mut buf = Vec::new();

    let mut in_shape = false;
    let mut in_run_text = false;
    let mut placeholder: Option<String> = None;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut paragraph = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"p:sp" => {
                    in_shape = true;
                    placeholder = None;
                    paragraphs.clear();
                }
                b"p:ph" if in_shape => {
                    placeholder = Some(placeholder_type(&e, &reader));
                }
                b"a:p" if in_shape => paragraph.clear(),
                b"a:t" if in_shape => in_run_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"p:ph" if in_shape => {
                    placeholder = Some(placeholder_type(&e, &reader));
                }
                b"a:br" if in_shape => paragraph.push('\n'),
                b"a:p" if in_shape => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(t) if in_run_text => {
                paragraph.push_str(&t.unescape()?);
            }
            Event::End(e) => match e.name().as_ref() {
                b"a:t" => in_run_text = false,
                b"a:p" if in_shape => paragraphs.push(std::mem::take(&mut paragraph)),
                b"p:sp" if in_shape => {
                    in_shape = false;
                    shapes.push(ShapeText {
                        placeholder: placeholder.take(),
                        text: paragraphs.join("\n"),
                    });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn slide_xml(shapes: &[&[&str]]) -> String {
        let mut body = String::new();
        for paragraphs in shapes {
            body.push_str("<p:sp><p:txBody>");
            for p in *paragraphs {
                body.push_str(&format!("<a:p><a:r><a:t>{p}</a:t></a:r></a:p>"));
            }
            body.push_str("</p:txBody></p:sp>");
        }
        format!(
            r#"<?xml version="1.0"?><p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>{body}</p:spTree></p:cSld></p:sld>"#
        )
    }

    fn notes_xml(text: &str) -> String {
        format!(
            r#"<?xml version="1.0"?><p:notes xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>
<p:sp><p:nvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr></p:sp>
<p:sp><p:nvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:notes>"#
        )
    }

    fn build_deck() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        let mut put = |name: &str, body: &str| {
            zip.start_file(name, opts).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        // rId3 is listed first so presentation order differs from part numbering
        put(
            "ppt/presentation.xml",
            r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId3"/><p:sldId id="257" r:id="rId2"/></p:sldIdLst></p:presentation>"#,
        );
        put(
            "ppt/_rels/presentation.xml.rels",
            r#"<Relationships><Relationship Id="rId1" Type="http://x/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="http://x/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/><Relationship Id="rId3" Type="http://x/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/></Relationships>"#,
        );
        put(
            "ppt/slides/slide1.xml",
            &slide_xml(&[&["Results"], &["Revenue grew", "Costs fell"]]),
        );
        put("ppt/slides/slide2.xml", &slide_xml(&[&["Agenda"]]));
        put(
            "ppt/slides/_rels/slide1.xml.rels",
            r#"<Relationships><Relationship Id="rId1" Type="http://x/officeDocument/2006/relationships/notesSlide" Target="../notesSlides/notesSlide1.xml"/></Relationships>"#,
        );
        put("ppt/notesSlides/notesSlide1.xml", &notes_xml("Mention Q3"));

        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_slides_in_presentation_order() {
        let slides = read_slides(&build_deck()).unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].text, "Agenda");
        assert_eq!(slides[0].notes, "");
        assert_eq!(slides[1].text, "Results Revenue grew\nCosts fell");
        assert_eq!(slides[1].notes, "Mention Q3");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            read_slides(b"%PDF-1.4 not a deck"),
            Err(Error::ExtractionFailed(_))
        ));
    }

    #[test]
    fn test_resolve_part() {
        assert_eq!(resolve_part("ppt", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(
            resolve_part("ppt/slides", "../notesSlides/notesSlide1.xml"),
            "ppt/notesSlides/notesSlide1.xml"
        );
        assert_eq!(resolve_part("ppt", "/ppt/slides/slide9.xml"), "ppt/slides/slide9.xml");
    }

    #[test]
    fn test_part_number() {
        assert_eq!(part_number("ppt/slides/slide12.xml"), 12);
        assert_eq!(part_number("ppt/slides/slide.xml"), 0);
    }

    #[test]
    fn test_run_whitespace_preserved() {
        let xml = r#"<p:sld xmlns:a="a" xmlns:p="p"><p:sp><p:txBody><a:p><a:r><a:t>And </a:t></a:r><a:r><a:t>more</a:t></a:r><a:br/><a:r><a:t>next</a:t></a:r></a:p></p:txBody></p:sp></p:sld>"#;
        let shapes = shape_texts(xml).unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].text, "And more\nnext");
        assert_eq!(shapes[0].placeholder, None);
    }
}
