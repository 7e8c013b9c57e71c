//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for page access, isolating the concrete
//! PDF library (lopdf) from layout analysis and the extractors.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use unicode_normalization::UnicodeNormalization;

use super::content::{ContentInterpreter, FontResolver, PageMarks, XObjectKind};
use super::layout::LayoutAnalyzer;
use crate::detect::detect_pdf;
use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, Segment};
use crate::model::{ExtractedImage, ImagePlacement, PageContent, TextFragment};

/// Page identifier: (object number, generation number).
pub type PageId = (u32, u16);

/// A value from a PDF content stream operand.
#[derive(Debug, Clone)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

/// A single operation from a PDF content stream.
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// Read access to a paginated document.
///
/// Implementations must be shareable across threads: pages are parsed in
/// parallel.
pub trait PagedDocument: Send + Sync {
    /// Number of pages.
    fn page_count(&self) -> usize;

    /// Layout of one page (zero-based index).
    fn page(&self, index: usize) -> Result<PageContent>;

    /// Bytes of an embedded image, re-encoded when the raw stream is not a
    /// standalone image file.
    fn image_data(&self, xref: u32, generation: u16) -> Result<ExtractedImage>;
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|c| {
                if c.len() == 2 {
                    Some(u16::from_be_bytes([c[0], c[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16(&utf16).unwrap_or_default();
    }

    if let Ok(s) = String::from_utf8(bytes.to_vec()) {
        return s;
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

/// Helper: extract a number from a [`PdfValue`].
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(r) => Some(*r),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PdfDocument: concrete implementation backed by lopdf
// ---------------------------------------------------------------------------

/// Default page size when no MediaBox can be found (US Letter).
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// A PDF loaded into memory.
pub struct PdfDocument {
    doc: LopdfDocument,
    pages: Vec<PageId>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.doc.version)
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl PdfDocument {
    /// Load from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        detect_pdf(data)?;

        let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::PdfParse("document is encrypted".to_string()),
            _ => Error::from(e),
        })?;

        if doc.is_encrypted() {
            return Err(Error::PdfParse("document is encrypted".to_string()));
        }

        let pages: Vec<PageId> = doc.get_pages().into_values().collect();
        Ok(Self { doc, pages })
    }

    /// Get PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    fn page_id(&self, index: usize) -> Result<PageId> {
        self.pages
            .get(index)
            .copied()
            .ok_or(Error::PageOutOfRange(index, self.pages.len()))
    }

    /// Follow a reference, returning direct objects unchanged.
    fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object> {
        match obj {
            Object::Reference(id) => Ok(self.doc.get_object(*id)?),
            other => Ok(other),
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        self.resolve(obj).ok().and_then(|o| o.as_dict().ok())
    }

    /// Look up a page attribute, walking up the page tree for inherited keys.
    fn inherited<'a>(&'a self, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
        let mut current = self.doc.get_dictionary(page_id).ok();
        // Guard against cyclic Parent links
        for _ in 0..32 {
            let dict = current?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict
                .get(b"Parent")
                .ok()
                .and_then(|p| p.as_reference().ok())
                .and_then(|id| self.doc.get_dictionary(id).ok());
        }
        None
    }

    fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        let values = self
            .inherited(page_id, b"MediaBox")
            .and_then(|o| self.resolve(o).ok())
            .and_then(|o| o.as_array().ok())
            .filter(|arr| arr.len() >= 4)
            .map(|arr| {
                let mut v = [0.0f32; 4];
                for (slot, obj) in v.iter_mut().zip(arr.iter()) {
                    *slot = self
                        .resolve(obj)
                        .ok()
                        .and_then(|o| o.as_float().ok())
                        .unwrap_or(0.0);
                }
                v
            });

        match values {
            Some([x0, y0, x1, y1]) if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
                [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]
            }
            _ => DEFAULT_MEDIA_BOX,
        }
    }

    fn resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        self.inherited(page_id, b"Resources")
            .and_then(|o| self.resolve_dict(o))
    }

    fn xobjects(&self, resources: Option<&Dictionary>) -> HashMap<Vec<u8>, XObjectKind> {
        let mut map = HashMap::new();
        let Some(xobj_dict) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|o| self.resolve_dict(o))
        else {
            return map;
        };

        for (name, obj) in xobj_dict.iter() {
            let Ok(id) = obj.as_reference() else {
                continue;
            };
            let kind = match self.doc.get_object(id) {
                Ok(Object::Stream(stream)) => match stream.dict.get(b"Subtype") {
                    Ok(Object::Name(n)) if n.as_slice() == b"Image" => XObjectKind::Image {
                        xref: id.0,
                        generation: id.1,
                    },
                    _ => XObjectKind::Form,
                },
                _ => continue,
            };
            map.insert(name.clone(), kind);
        }
        map
    }

    /// Get the (decompressed) content stream bytes for a page.
    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;

        let contents = match page_dict.get(b"Contents") {
            Ok(c) => c,
            // A page without content is blank, not broken
            Err(_) => return Ok(Vec::new()),
        };

        match self.resolve(contents)? {
            Object::Stream(s) => Ok(s
                .decompressed_content()
                .unwrap_or_else(|_| s.content.clone())),
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Ok(Object::Stream(s)) = self.resolve(obj) {
                        match s.decompressed_content() {
                            Ok(data) => content.extend_from_slice(&data),
                            Err(_) => content.extend_from_slice(&s.content),
                        }
                        content.push(b' ');
                    }
                }
                Ok(content)
            }
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>> {
        let content =
            lopdf::content::Content::decode(data).map_err(|e| Error::PdfParse(e.to_string()))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn interpret(&self, page_id: PageId) -> Result<PageMarks> {
        let fonts = PageFonts::load(&self.doc, page_id);
        let xobjects = self.xobjects(self.resources(page_id));
        let raw = self.page_content(page_id)?;
        let ops = self.decode_content(&raw)?;
        Ok(ContentInterpreter::new(&fonts, &xobjects).run(&ops))
    }
}

impl PagedDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<PageContent> {
        let page_id = self.page_id(index)?;
        let [x0, y0, x1, y1] = self.media_box(page_id);
        let (width, height) = (x1 - x0, y1 - y0);

        let marks = self.interpret(page_id)?;

        // User space (bottom-left origin) to page space (top-left origin)
        let flip_y = |y: f32| y1 - y;
        let flip_x = |x: f32| x - x0;
        let flip_box = |b: &BoundingBox| {
            BoundingBox::new(flip_x(b.x1), flip_y(b.y2), flip_x(b.x2), flip_y(b.y1))
        };

        let mut spans = marks.spans;
        for span in &mut spans {
            span.x = flip_x(span.x);
            span.y = flip_y(span.y);
            span.text = span.text.nfc().collect();
        }

        let rules: Vec<Segment> = marks
            .rules
            .iter()
            .map(|s| Segment::new(flip_x(s.x1), flip_y(s.y1), flip_x(s.x2), flip_y(s.y2)))
            .collect();

        let images: Vec<ImagePlacement> = marks
            .images
            .iter()
            .map(|p| ImagePlacement {
                xref: p.xref,
                generation: p.generation,
                bbox: flip_box(&p.bbox),
            })
            .collect();

        let fragments: Vec<TextFragment> = spans
            .iter()
            .map(|s| TextFragment::new(s.bbox(), s.text.trim()))
            .collect();

        let mut page = PageContent::new(index, width, height);
        page.blocks = LayoutAnalyzer::new(width).analyze(spans, &images);
        page.fragments = fragments;
        page.rules = rules;
        page.images = images;

        log::debug!(
            "Page {}: {} blocks, {} rules, {} images",
            index,
            page.blocks.len(),
            page.rules.len(),
            page.images.len()
        );
        Ok(page)
    }

    fn image_data(&self, xref: u32, generation: u16) -> Result<ExtractedImage> {
        let stream = match self.doc.get_object((xref, generation))? {
            Object::Stream(s) => s,
            _ => {
                return Err(Error::ExtractionFailed(format!(
                    "object {xref} {generation} R is not an image stream"
                )))
            }
        };
        decode_image_stream(&self.doc, stream)
    }
}

/// Font encodings of one page, resolved once per page.
struct PageFonts<'a> {
    fonts: BTreeMap<Vec<u8>, (String, Option<lopdf::Encoding<'a>>)>,
}

impl<'a> PageFonts<'a> {
    fn load(doc: &'a LopdfDocument, page_id: PageId) -> Self {
        let mut fonts = BTreeMap::new();
        match doc.get_page_fonts(page_id) {
            Ok(page_fonts) => {
                for (name, font_dict) in page_fonts {
                    let base_font = font_dict
                        .get(b"BaseFont")
                        .ok()
                        .and_then(|o| o.as_name().ok())
                        .map(|n| String::from_utf8_lossy(n).to_string())
                        .unwrap_or_else(|| "Unknown".to_string());
                    let encoding = font_dict.get_font_encoding(doc).ok();
                    fonts.insert(name, (base_font, encoding));
                }
            }
            Err(e) => log::debug!("No fonts resolved for page {:?}: {}", page_id, e),
        }
        Self { fonts }
    }
}

impl FontResolver for PageFonts<'_> {
    fn base_font(&self, resource: &[u8]) -> Option<String> {
        self.fonts.get(resource).map(|(name, _)| name.clone())
    }

    fn decode(&self, resource: &[u8], bytes: &[u8]) -> String {
        if let Some((_, Some(encoding))) = self.fonts.get(resource) {
            if let Ok(text) = LopdfDocument::decode_text(encoding, bytes) {
                return text;
            }
        }
        decode_text_simple(bytes)
    }
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).to_string()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn color_space_name(doc: &LopdfDocument, dict: &Dictionary) -> Option<String> {
    let obj = dict.get(b"ColorSpace").ok()?;
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    match obj {
        Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
        Object::Array(arr) => arr
            .first()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string()),
        _ => None,
    }
}

/// Turn an image XObject into bytes an image viewer can open.
fn decode_image_stream(doc: &LopdfDocument, stream: &lopdf::Stream) -> Result<ExtractedImage> {
    let dict = &stream.dict;
    let filters = filter_names(dict);

    if filters.iter().any(|f| f == "DCTDecode") {
        return Ok(ExtractedImage {
            data: stream.content.clone(),
            extension: "jpg",
        });
    }
    if filters.iter().any(|f| f == "JPXDecode") {
        return Ok(ExtractedImage {
            data: stream.content.clone(),
            extension: "jp2",
        });
    }

    let raw = if filters.iter().any(|f| f == "FlateDecode") {
        let mut decoder = ZlibDecoder::new(stream.content.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).map_err(|e| {
            Error::ExtractionFailed(format!("image decompression failed: {e}"))
        })?;
        decompressed
    } else if filters.is_empty() {
        stream.content.clone()
    } else {
        return Err(Error::ExtractionFailed(format!(
            "unsupported image filter {filters:?}"
        )));
    };

    let width = dict
        .get(b"Width")
        .and_then(|o| o.as_i64())
        .map_err(|_| Error::ExtractionFailed("image without Width".to_string()))?
        as u32;
    let height = dict
        .get(b"Height")
        .and_then(|o| o.as_i64())
        .map_err(|_| Error::ExtractionFailed("image without Height".to_string()))?
        as u32;
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(|o| o.as_i64())
        .unwrap_or(8);
    if bits != 8 {
        return Err(Error::ExtractionFailed(format!(
            "unsupported bit depth {bits}"
        )));
    }

    let pixels = (width as usize) * (height as usize);
    let color_space = color_space_name(doc, dict).unwrap_or_default();
    let components = match color_space.as_str() {
        "DeviceGray" | "CalGray" | "G" => 1,
        "DeviceCMYK" | "CMYK" => 4,
        "DeviceRGB" | "CalRGB" | "RGB" => 3,
        // ICC-based and unnamed spaces: infer from the sample count
        _ if pixels > 0 => raw.len() / pixels,
        _ => 3,
    };

    let img = match components {
        1 => image::GrayImage::from_raw(width, height, truncate(raw, pixels))
            .map(image::DynamicImage::ImageLuma8),
        4 => image::RgbImage::from_raw(width, height, cmyk_to_rgb(&truncate(raw, pixels * 4)))
            .map(image::DynamicImage::ImageRgb8),
        _ => image::RgbImage::from_raw(width, height, truncate(raw, pixels * 3))
            .map(image::DynamicImage::ImageRgb8),
    }
    .ok_or_else(|| {
        Error::ExtractionFailed(format!(
            "image data too short for {width}x{height} {color_space}"
        ))
    })?;

    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(ExtractedImage {
        data: png,
        extension: "png",
    })
}

fn truncate(mut data: Vec<u8>, len: usize) -> Vec<u8> {
    data.truncate(len);
    data
}

/// Convert CMYK bytes to RGB.
fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((cmyk.len() / 4) * 3);
    for chunk in cmyk.chunks_exact(4) {
        let k = 1.0 - f32::from(chunk[3]) / 255.0;
        for &c in &chunk[..3] {
            rgb.push((255.0 * (1.0 - f32::from(c) / 255.0) * k) as u8);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_simple_utf8() {
        assert_eq!(decode_text_simple(b"Hello"), "Hello");
    }

    #[test]
    fn test_decode_text_simple_latin1() {
        // 0xE9 = 'é' in Latin-1
        let bytes = vec![0x48, 0x65, 0x6C, 0x6C, 0xE9];
        assert_eq!(decode_text_simple(&bytes), "Hellé");
    }

    #[test]
    fn test_decode_text_simple_utf16be() {
        let bytes = vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_simple(&bytes), "Hi");
    }

    #[test]
    fn test_get_number_from_value() {
        assert_eq!(get_number_from_value(&PdfValue::Integer(42)), Some(42.0));
        assert_eq!(get_number_from_value(&PdfValue::Real(2.5)), Some(2.5));
        assert_eq!(get_number_from_value(&PdfValue::Other), None);
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), vec![255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), vec![0, 0, 0]);
        assert_eq!(cmyk_to_rgb(&[255, 0, 0, 0]), vec![0, 255, 255]);
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        assert!(matches!(
            PdfDocument::from_bytes(b"definitely not a pdf"),
            Err(Error::UnknownFormat)
        ));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        assert!(PdfDocument::from_bytes(b"%PDF-1.7\n1 0 obj\n<<").is_err());
    }
}
