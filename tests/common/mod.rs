//! Fixtures and mock capabilities shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docingest::error::Result;
use docingest::{
    BoundingBox, Capabilities, ConvertTarget, DeckConverter, GraphClassifier, ImageDescriber,
    PageRasterizer,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Content stream operations drawing one line of text (PDF coordinates).
pub fn text(x: f32, y: f32, size: f32, s: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(s)]),
        Operation::new("ET", vec![]),
    ]
}

/// Stroked rules of a grid with the given edges (PDF coordinates).
pub fn grid(xs: &[f32], ys: &[f32]) -> Vec<Operation> {
    let (x0, x1) = (xs[0], xs[xs.len() - 1]);
    let (y0, y1) = (ys[0], ys[ys.len() - 1]);
    let mut ops = Vec::new();
    for &y in ys {
        ops.push(Operation::new("m", vec![x0.into(), y.into()]));
        ops.push(Operation::new("l", vec![x1.into(), y.into()]));
        ops.push(Operation::new("S", vec![]));
    }
    for &x in xs {
        ops.push(Operation::new("m", vec![x.into(), y0.into()]));
        ops.push(Operation::new("l", vec![x.into(), y1.into()]));
        ops.push(Operation::new("S", vec![]));
    }
    ops
}

/// Draw the page's `/Im1` image at the given rectangle (PDF coordinates).
pub fn image(x: f32, y: f32, w: f32, h: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![w.into(), 0.into(), 0.into(), h.into(), x.into(), y.into()],
        ),
        Operation::new("Do", vec!["Im1".into()]),
        Operation::new("Q", vec![]),
    ]
}

/// Build a US Letter PDF, one page per operation list. Every page can use
/// font `/F1` (Helvetica) and image `/Im1` (2x2 gray).
pub fn build_pdf(pages: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0, 255, 255, 0],
    ));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => dictionary! { "Im1" => image_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// A 1x1 PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(1, 1, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// An OOXML deck. Each slide is `(shape texts, notes)`.
pub fn build_deck(slides: &[(&[&str], Option<&str>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    let mut put = |name: &str, body: &str| {
        zip.start_file(name, opts).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    };

    let ids: String = (0..slides.len())
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 1))
        .collect();
    put(
        "ppt/presentation.xml",
        &format!(
            r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>"#
        ),
    );
    let rels: String = (0..slides.len())
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{}" Type="http://x/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
                i + 1,
                i + 1
            )
        })
        .collect();
    put(
        "ppt/_rels/presentation.xml.rels",
        &format!("<Relationships>{rels}</Relationships>"),
    );

    for (i, (shapes, notes)) in slides.iter().enumerate() {
        let n = i + 1;
        let body: String = shapes
            .iter()
            .map(|t| format!("<p:sp><p:txBody><a:p><a:r><a:t>{t}</a:t></a:r></a:p></p:txBody></p:sp>"))
            .collect();
        put(
            &format!("ppt/slides/slide{n}.xml"),
            &format!(
                r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>{body}</p:spTree></p:cSld></p:sld>"#
            ),
        );

        if let Some(notes) = notes {
            put(
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                &format!(
                    r#"<Relationships><Relationship Id="rId1" Type="http://x/officeDocument/2006/relationships/notesSlide" Target="../notesSlides/notesSlide{n}.xml"/></Relationships>"#
                ),
            );
            put(
                &format!("ppt/notesSlides/notesSlide{n}.xml"),
                &format!(
                    r#"<p:notes xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>{notes}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:notes>"#
                ),
            );
        }
    }

    zip.finish().unwrap().into_inner()
}

/// Rasterizer that returns a tiny PNG and records what it was asked for.
#[derive(Default)]
pub struct MockRasterizer {
    pub calls: Mutex<Vec<(PathBuf, usize, Option<BoundingBox>)>>,
}

#[async_trait]
impl PageRasterizer for MockRasterizer {
    async fn rasterize(
        &self,
        document: &Path,
        page_index: usize,
        clip: Option<BoundingBox>,
    ) -> Result<Vec<u8>> {
        assert!(document.exists(), "rasterizer got a missing document");
        self.calls
            .lock()
            .unwrap()
            .push((document.to_path_buf(), page_index, clip));
        Ok(png_bytes())
    }
}

/// Converter that writes a blank PDF with a fixed page count.
pub struct MockConverter {
    pub pages: usize,
}

#[async_trait]
impl DeckConverter for MockConverter {
    async fn convert(&self, deck: &Path, out_dir: &Path, target: ConvertTarget) -> Result<PathBuf> {
        assert_eq!(target, ConvertTarget::Pdf);
        let stem = deck.file_stem().unwrap().to_string_lossy().to_string();
        let path = out_dir.join(format!("{stem}.pdf"));
        std::fs::write(&path, build_pdf(vec![Vec::new(); self.pages]))?;
        Ok(path)
    }
}

/// Describer with fixed answers. The first `slow_calls` graph
/// descriptions hang for `delay`.
pub struct MockDescriber {
    pub image: String,
    pub graph: String,
    pub slow_calls: usize,
    pub delay: Duration,
    calls: AtomicUsize,
}

impl MockDescriber {
    pub fn new(image: &str, graph: &str) -> Self {
        Self {
            image: image.to_string(),
            graph: graph.to_string(),
            slow_calls: 0,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow_first(mut self, calls: usize, delay: Duration) -> Self {
        self.slow_calls = calls;
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ImageDescriber for MockDescriber {
    async fn describe_image(&self, _image: &[u8]) -> Result<String> {
        Ok(self.image.clone())
    }

    async fn describe_graph(&self, _image: &[u8]) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.slow_calls {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.graph.clone())
    }
}

/// Classifier with a fixed verdict.
pub struct MockClassifier(pub bool);

#[async_trait]
impl GraphClassifier for MockClassifier {
    async fn is_graph(&self, _image: &[u8]) -> Result<bool> {
        Ok(self.0)
    }
}

/// Capabilities that never touch external programs.
pub fn mock_capabilities(describer: MockDescriber, deck_pages: usize) -> (Capabilities, Arc<MockRasterizer>) {
    let rasterizer = Arc::new(MockRasterizer::default());
    let mut caps = Capabilities::default()
        .with_converter(MockConverter { pages: deck_pages })
        .with_describer(describer)
        .with_classifier(MockClassifier(false));
    caps.rasterizer = rasterizer.clone() as Arc<dyn PageRasterizer>;
    (caps, rasterizer)
}
