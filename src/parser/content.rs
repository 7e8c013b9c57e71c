//! Content stream interpretation.
//!
//! Walks the decoded operators of one page and records what the layout and
//! table stages need: positioned text spans, axis-aligned line art and image
//! placements. Coordinates are emitted in PDF user space (origin bottom-left);
//! the backend flips them into page space afterwards.

use std::collections::HashMap;

use super::backend::{get_number_from_value, ContentOp, PdfValue};
use super::layout::{is_spaceless_script_char, TextSpan};
use crate::geometry::{BoundingBox, Segment};

/// Average glyph advance as a fraction of the font size, used when real
/// glyph widths are not consulted.
pub const AVG_GLYPH_WIDTH: f32 = 0.5;

/// TJ adjustments beyond this many thousandths of an em read as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Filled rectangles thinner than this are treated as drawn rules.
const THIN_FILL: f32 = 3.0;

/// Slope tolerance for classifying transformed segments as axis-aligned.
const AXIS_TOLERANCE: f32 = 1.0;

/// Resolves font resources for the page being interpreted.
pub trait FontResolver {
    /// Base font name of a font resource (e.g., "Helvetica-Bold").
    fn base_font(&self, resource: &[u8]) -> Option<String>;

    /// Decode a string operand shown with the given font resource.
    fn decode(&self, resource: &[u8], bytes: &[u8]) -> String;
}

/// What an XObject resource name points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectKind {
    /// A raster image with its object id
    Image { xref: u32, generation: u16 },
    /// A form XObject (not descended into)
    Form,
}

/// An image drawn on the page, in user space.
#[derive(Debug, Clone, Copy)]
pub struct RawPlacement {
    pub xref: u32,
    pub generation: u16,
    pub bbox: BoundingBox,
}

/// Everything recorded while interpreting one page.
#[derive(Debug, Default)]
pub struct PageMarks {
    pub spans: Vec<TextSpan>,
    pub rules: Vec<Segment>,
    pub images: Vec<RawPlacement>,
}

/// 2D affine transform `[a b c d e f]`, as in PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Vertical scale factor.
    pub fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Horizontal scale factor.
    pub fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn from_operands(operands: &[PdfValue]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        let n: Vec<f32> = operands[..6]
            .iter()
            .map(|v| get_number_from_value(v).unwrap_or(0.0))
            .collect();
        Some(Matrix::new(n[0], n[1], n[2], n[3], n[4], n[5]))
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
}

#[derive(Debug, Clone)]
struct TextState {
    font_resource: Vec<u8>,
    font_name: String,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scaling: f32,
    tm: Matrix,
    tlm: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_resource: Vec::new(),
            font_name: String::new(),
            font_size: 12.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translation(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }

    /// Text-space advance of a decoded string.
    fn advance(&self, text: &str) -> f32 {
        let chars = text.chars().count() as f32;
        let spaces = text.chars().filter(|c| *c == ' ').count() as f32;
        (chars * (self.font_size * AVG_GLYPH_WIDTH + self.char_spacing)
            + spaces * self.word_spacing)
            * self.horizontal_scaling
    }
}

/// Path under construction, in user space.
#[derive(Debug, Default)]
struct PathBuilder {
    segments: Vec<(f32, f32, f32, f32)>,
    rects: Vec<BoundingBox>,
    current: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f32, f32)) {
        self.current = Some(p);
        self.subpath_start = Some(p);
    }

    fn line_to(&mut self, p: (f32, f32)) {
        if let Some(cur) = self.current {
            self.segments.push((cur.0, cur.1, p.0, p.1));
        }
        self.current = Some(p);
    }

    fn close(&mut self) {
        if let (Some(cur), Some(start)) = (self.current, self.subpath_start) {
            if cur != start {
                self.segments.push((cur.0, cur.1, start.0, start.1));
            }
            self.current = Some(start);
        }
    }

    fn clear(&mut self) {
        *self = PathBuilder::default();
    }
}

/// Interprets content stream operators for one page.
pub struct ContentInterpreter<'a> {
    fonts: &'a dyn FontResolver,
    xobjects: &'a HashMap<Vec<u8>, XObjectKind>,
    gs: GraphicsState,
    gs_stack: Vec<GraphicsState>,
    ts: TextState,
    path: PathBuilder,
    marks: PageMarks,
}

impl<'a> ContentInterpreter<'a> {
    pub fn new(
        fonts: &'a dyn FontResolver,
        xobjects: &'a HashMap<Vec<u8>, XObjectKind>,
    ) -> Self {
        Self {
            fonts,
            xobjects,
            gs: GraphicsState {
                ctm: Matrix::IDENTITY,
            },
            gs_stack: Vec::new(),
            ts: TextState::default(),
            path: PathBuilder::default(),
            marks: PageMarks::default(),
        }
    }

    /// Run every operation and return the collected marks.
    pub fn run(mut self, ops: &[ContentOp]) -> PageMarks {
        for op in ops {
            self.step(op);
        }
        self.marks
    }

    fn step(&mut self, op: &ContentOp) {
        let num = |i: usize| op.operands.get(i).and_then(get_number_from_value);

        match op.operator.as_str() {
            // Graphics state
            "q" => self.gs_stack.push(self.gs.clone()),
            "Q" => {
                if let Some(gs) = self.gs_stack.pop() {
                    self.gs = gs;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.gs.ctm = m.then(&self.gs.ctm);
                }
            }

            // Text objects and state
            "BT" => {
                self.ts.tm = Matrix::IDENTITY;
                self.ts.tlm = Matrix::IDENTITY;
            }
            "ET" => {}
            "Tf" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    self.ts.font_name = self
                        .fonts
                        .base_font(name)
                        .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
                    self.ts.font_resource = name.clone();
                }
                self.ts.font_size = num(1).unwrap_or(12.0);
            }
            "TL" => self.ts.leading = num(0).unwrap_or(0.0),
            "Tc" => self.ts.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.ts.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.ts.horizontal_scaling = num(0).unwrap_or(100.0) / 100.0,
            "Td" => self
                .ts
                .move_line(num(0).unwrap_or(0.0), num(1).unwrap_or(0.0)),
            "TD" => {
                let ty = num(1).unwrap_or(0.0);
                self.ts.leading = -ty;
                self.ts.move_line(num(0).unwrap_or(0.0), ty);
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.ts.tm = m;
                    self.ts.tlm = m;
                }
            }
            "T*" => self.ts.next_line(),

            // Text showing
            "Tj" => {
                if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                    let text = self.fonts.decode(&self.ts.font_resource, bytes);
                    self.show_text(text);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = op.operands.first() {
                    self.show_array(items);
                }
            }
            "'" => {
                self.ts.next_line();
                if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                    let text = self.fonts.decode(&self.ts.font_resource, bytes);
                    self.show_text(text);
                }
            }
            "\"" => {
                self.ts.word_spacing = num(0).unwrap_or(self.ts.word_spacing);
                self.ts.char_spacing = num(1).unwrap_or(self.ts.char_spacing);
                self.ts.next_line();
                if let Some(PdfValue::Str(bytes)) = op.operands.get(2) {
                    let text = self.fonts.decode(&self.ts.font_resource, bytes);
                    self.show_text(text);
                }
            }

            // Path construction
            "m" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    self.path.move_to(self.gs.ctm.apply(x, y));
                }
            }
            "l" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    self.path.line_to(self.gs.ctm.apply(x, y));
                }
            }
            "c" => {
                if let (Some(x), Some(y)) = (num(4), num(5)) {
                    let p = self.gs.ctm.apply(x, y);
                    self.path.current = Some(p);
                }
            }
            "v" | "y" => {
                if let (Some(x), Some(y)) = (num(2), num(3)) {
                    let p = self.gs.ctm.apply(x, y);
                    self.path.current = Some(p);
                }
            }
            "h" => self.path.close(),
            "re" => {
                if let (Some(x), Some(y), Some(w), Some(h)) = (num(0), num(1), num(2), num(3)) {
                    let corners = [
                        self.gs.ctm.apply(x, y),
                        self.gs.ctm.apply(x + w, y),
                        self.gs.ctm.apply(x + w, y + h),
                        self.gs.ctm.apply(x, y + h),
                    ];
                    for i in 0..4 {
                        let (p, q) = (corners[i], corners[(i + 1) % 4]);
                        self.path.segments.push((p.0, p.1, q.0, q.1));
                    }
                    self.path.rects.push(bbox_of(&corners));
                    self.path.move_to(corners[0]);
                }
            }

            // Path painting
            "S" => self.paint(true, false),
            "s" => {
                self.path.close();
                self.paint(true, false);
            }
            "f" | "F" | "f*" => self.paint(false, true),
            "B" | "B*" => self.paint(true, true),
            "b" | "b*" => {
                self.path.close();
                self.paint(true, true);
            }
            "n" => self.path.clear(),

            // XObjects
            "Do" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    match self.xobjects.get(name) {
                        Some(XObjectKind::Image { xref, generation }) => {
                            let corners = [
                                self.gs.ctm.apply(0.0, 0.0),
                                self.gs.ctm.apply(1.0, 0.0),
                                self.gs.ctm.apply(1.0, 1.0),
                                self.gs.ctm.apply(0.0, 1.0),
                            ];
                            self.marks.images.push(RawPlacement {
                                xref: *xref,
                                generation: *generation,
                                bbox: bbox_of(&corners),
                            });
                        }
                        Some(XObjectKind::Form) => {
                            log::debug!(
                                "Skipping form XObject /{}",
                                String::from_utf8_lossy(name)
                            );
                        }
                        None => {
                            log::debug!(
                                "Unresolved XObject /{}",
                                String::from_utf8_lossy(name)
                            );
                            self.marks.images.push(RawPlacement {
                                xref: 0,
                                generation: 0,
                                bbox: bbox_of(&[
                                    self.gs.ctm.apply(0.0, 0.0),
                                    self.gs.ctm.apply(1.0, 1.0),
                                ]),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn show_array(&mut self, items: &[PdfValue]) {
        for item in items {
            match item {
                PdfValue::Str(bytes) => {
                    let text = self.fonts.decode(&self.ts.font_resource, bytes);
                    self.show_text(text);
                }
                other => {
                    if let Some(n) = get_number_from_value(other) {
                        // Negative adjustments move the pen right
                        let shift = -n / 1000.0 * self.ts.font_size * self.ts.horizontal_scaling;
                        self.ts.tm = Matrix::translation(shift, 0.0).then(&self.ts.tm);
                        if -n > TJ_SPACE_THRESHOLD {
                            self.mark_word_break();
                        }
                    }
                }
            }
        }
    }

    /// Append a space to the last span when a TJ gap reads as a word break.
    fn mark_word_break(&mut self) {
        if let Some(last) = self.marks.spans.last_mut() {
            let ends_blank = last.text.ends_with(' ') || last.text.ends_with('\u{00A0}');
            let spaceless = last
                .text
                .chars()
                .last()
                .map(is_spaceless_script_char)
                .unwrap_or(true);
            if !ends_blank && !spaceless {
                last.text.push(' ');
            }
        }
    }

    fn show_text(&mut self, text: String) {
        let advance = self.ts.advance(&text);
        let trm = self.ts.tm.then(&self.gs.ctm);
        let (x, y) = trm.apply(0.0, 0.0);
        let size = self.ts.font_size * trm.vertical_scale();
        let width = advance * trm.horizontal_scale();

        if !text.trim().is_empty() {
            let mut span = TextSpan::new(text, x, y, size, self.ts.font_name.clone());
            span.width = width;
            self.marks.spans.push(span);
        }

        self.ts.tm = Matrix::translation(advance, 0.0).then(&self.ts.tm);
    }

    fn paint(&mut self, stroke: bool, fill: bool) {
        if stroke {
            for &(x1, y1, x2, y2) in &self.path.segments {
                let seg = Segment::new(x1, y1, x2, y2);
                if seg.is_horizontal(AXIS_TOLERANCE) || seg.is_vertical(AXIS_TOLERANCE) {
                    self.marks.rules.push(seg);
                }
            }
        } else if fill {
            for rect in &self.path.rects {
                if rect.height() <= THIN_FILL && rect.width() > THIN_FILL {
                    let y = (rect.y1 + rect.y2) / 2.0;
                    self.marks.rules.push(Segment::new(rect.x1, y, rect.x2, y));
                } else if rect.width() <= THIN_FILL && rect.height() > THIN_FILL {
                    let x = (rect.x1 + rect.x2) / 2.0;
                    self.marks.rules.push(Segment::new(x, rect.y1, x, rect.y2));
                }
            }
        }
        self.path.clear();
    }
}

fn bbox_of(points: &[(f32, f32)]) -> BoundingBox {
    let min_x = points.iter().map(|p| p.0).fold(f32::MAX, f32::min);
    let max_x = points.iter().map(|p| p.0).fold(f32::MIN, f32::max);
    let min_y = points.iter().map(|p| p.1).fold(f32::MAX, f32::min);
    let max_y = points.iter().map(|p| p.1).fold(f32::MIN, f32::max);
    BoundingBox::new(min_x, min_y, max_x, max_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PlainFonts;

    impl FontResolver for PlainFonts {
        fn base_font(&self, resource: &[u8]) -> Option<String> {
            match resource {
                b"F1" => Some("Helvetica".to_string()),
                b"F2" => Some("Helvetica-Bold".to_string()),
                _ => None,
            }
        }

        fn decode(&self, _resource: &[u8], bytes: &[u8]) -> String {
            String::from_utf8_lossy(bytes).to_string()
        }
    }

    fn op(operator: &str, operands: Vec<PdfValue>) -> ContentOp {
        ContentOp {
            operator: operator.to_string(),
            operands,
        }
    }

    fn n(v: f32) -> PdfValue {
        PdfValue::Real(v)
    }

    fn s(text: &str) -> PdfValue {
        PdfValue::Str(text.as_bytes().to_vec())
    }

    fn run(ops: Vec<ContentOp>) -> PageMarks {
        let xobjects = HashMap::from([(
            b"Im1".to_vec(),
            XObjectKind::Image {
                xref: 12,
                generation: 0,
            },
        )]);
        ContentInterpreter::new(&PlainFonts, &xobjects).run(&ops)
    }

    #[test]
    fn test_text_positions() {
        let marks = run(vec![
            op("BT", vec![]),
            op("Tf", vec![PdfValue::Name(b"F2".to_vec()), n(18.0)]),
            op("Td", vec![n(72.0), n(700.0)]),
            op("Tj", vec![s("Title")]),
            op("Tf", vec![PdfValue::Name(b"F1".to_vec()), n(10.0)]),
            op("TL", vec![n(14.0)]),
            op("T*", vec![]),
            op("Tj", vec![s("Body")]),
            op("ET", vec![]),
        ]);

        assert_eq!(marks.spans.len(), 2);
        let title = &marks.spans[0];
        assert_eq!(title.text, "Title");
        assert_eq!((title.x, title.y), (72.0, 700.0));
        assert_eq!(title.font_size, 18.0);
        assert!(title.is_bold);
        assert_eq!(title.width, 5.0 * 18.0 * AVG_GLYPH_WIDTH);

        let body = &marks.spans[1];
        assert_eq!((body.x, body.y), (72.0, 686.0));
        assert!(!body.is_bold);
    }

    #[test]
    fn test_ctm_scales_text() {
        let marks = run(vec![
            op("q", vec![]),
            op("cm", vec![n(2.0), n(0.0), n(0.0), n(2.0), n(10.0), n(20.0)]),
            op("BT", vec![]),
            op("Tf", vec![PdfValue::Name(b"F1".to_vec()), n(10.0)]),
            op("Tj", vec![s("Big")]),
            op("ET", vec![]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Tj", vec![s("Small")]),
            op("ET", vec![]),
        ]);

        assert_eq!((marks.spans[0].x, marks.spans[0].y), (10.0, 20.0));
        assert_eq!(marks.spans[0].font_size, 20.0);
        assert_eq!((marks.spans[1].x, marks.spans[1].y), (0.0, 0.0));
        assert_eq!(marks.spans[1].font_size, 10.0);
    }

    #[test]
    fn test_tj_array_inserts_word_space() {
        let marks = run(vec![
            op("BT", vec![]),
            op("Tf", vec![PdfValue::Name(b"F1".to_vec()), n(10.0)]),
            op(
                "TJ",
                vec![PdfValue::Array(vec![
                    s("Hello"),
                    PdfValue::Integer(-300),
                    s("World"),
                ])],
            ),
            op("ET", vec![]),
        ]);

        let text: String = marks.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(text, "Hello World");
        // 5 glyphs * 5pt + 300/1000 * 10pt
        assert_eq!(marks.spans[1].x, 28.0);
    }

    #[test]
    fn test_stroked_lines_become_rules() {
        let marks = run(vec![
            op("m", vec![n(50.0), n(500.0)]),
            op("l", vec![n(300.0), n(500.0)]),
            op("S", vec![]),
            op("m", vec![n(0.0), n(0.0)]),
            op("l", vec![n(30.0), n(40.0)]),
            op("S", vec![]),
            op("re", vec![n(10.0), n(10.0), n(100.0), n(50.0)]),
            op("n", vec![]),
        ]);

        assert_eq!(marks.rules, vec![Segment::new(50.0, 500.0, 300.0, 500.0)]);
    }

    #[test]
    fn test_stroked_rect_yields_four_rules() {
        let marks = run(vec![
            op("re", vec![n(10.0), n(10.0), n(100.0), n(50.0)]),
            op("S", vec![]),
        ]);
        assert_eq!(marks.rules.len(), 4);
    }

    #[test]
    fn test_thin_filled_rect_is_rule() {
        let marks = run(vec![
            op("re", vec![n(10.0), n(100.0), n(200.0), n(0.5)]),
            op("f", vec![]),
            op("re", vec![n(10.0), n(10.0), n(200.0), n(80.0)]),
            op("f", vec![]),
        ]);
        assert_eq!(marks.rules.len(), 1);
        assert!(marks.rules[0].is_horizontal(1.0));
        assert_eq!(marks.rules[0].length(), 200.0);
    }

    #[test]
    fn test_image_placement_from_ctm() {
        let marks = run(vec![
            op("q", vec![]),
            op(
                "cm",
                vec![n(200.0), n(0.0), n(0.0), n(100.0), n(50.0), n(300.0)],
            ),
            op("Do", vec![PdfValue::Name(b"Im1".to_vec())]),
            op("Q", vec![]),
            op("Do", vec![PdfValue::Name(b"Missing".to_vec())]),
        ]);

        assert_eq!(marks.images.len(), 2);
        assert_eq!(marks.images[0].xref, 12);
        assert_eq!(
            marks.images[0].bbox,
            BoundingBox::new(50.0, 300.0, 250.0, 400.0)
        );
        assert_eq!(marks.images[1].xref, 0);
    }

    #[test]
    fn test_matrix_composition() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translation(10.0, 5.0);
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 7.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 12.0));
    }
}
