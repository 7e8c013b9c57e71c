//! Per-page layout primitives produced by the parser.

use crate::geometry::{BoundingBox, Segment};

/// Discriminates text blocks from non-text blocks in a page's block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// A run of text lines
    Text,
    /// An image placement
    Image,
}

/// A raw layout block, in reading order.
#[derive(Debug, Clone)]
pub struct RawBlock {
    /// Block extent in page space
    pub bbox: BoundingBox,
    /// Block text, lines separated by `\n` (empty for image blocks)
    pub text: String,
    /// Text or non-text
    pub kind: BlockKind,
    /// Dominant font size in points (0 for image blocks)
    pub font_size: f32,
    /// Whether most of the block is set in a bold face
    pub is_bold: bool,
}

impl RawBlock {
    /// Create a text block.
    pub fn text(bbox: BoundingBox, text: impl Into<String>, font_size: f32) -> Self {
        Self {
            bbox,
            text: text.into(),
            kind: BlockKind::Text,
            font_size,
            is_bold: false,
        }
    }

    /// Create an image block.
    pub fn image(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            text: String::new(),
            kind: BlockKind::Image,
            font_size: 0.0,
            is_bold: false,
        }
    }

    /// Mark the block as bold.
    pub fn bold(mut self, is_bold: bool) -> Self {
        self.is_bold = is_bold;
        self
    }

    pub fn is_text(&self) -> bool {
        self.kind == BlockKind::Text
    }

    /// Number of characters in the block text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Number of text lines in the block.
    pub fn line_count(&self) -> usize {
        self.text.lines().filter(|l| !l.trim().is_empty()).count()
    }
}

/// A positioned piece of text at span granularity.
#[derive(Debug, Clone)]
pub struct TextFragment {
    pub bbox: BoundingBox,
    pub text: String,
}

impl TextFragment {
    pub fn new(bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            bbox,
            text: text.into(),
        }
    }
}

/// Where an embedded raster image is drawn on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    /// Object number of the image XObject (0 = unresolved)
    pub xref: u32,
    /// Generation number of the image XObject
    pub generation: u16,
    /// Drawn extent in page space
    pub bbox: BoundingBox,
}

/// Everything the extractors need to know about one page.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Zero-based page index
    pub index: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Layout blocks in reading order
    pub blocks: Vec<RawBlock>,
    /// Span-level text
    pub fragments: Vec<TextFragment>,
    /// Axis-aligned line art (table rule candidates)
    pub rules: Vec<Segment>,
    /// Embedded image placements in drawing order
    pub images: Vec<ImagePlacement>,
}

impl PageContent {
    /// Create an empty page.
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            blocks: Vec::new(),
            fragments: Vec::new(),
            rules: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Create an empty US Letter page.
    pub fn letter(index: usize) -> Self {
        Self::new(index, 612.0, 792.0)
    }

    /// The page extent as a box.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, self.width, self.height)
    }
}

/// Raw bytes of an embedded image plus a file extension matching them.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub data: Vec<u8>,
    pub extension: &'static str,
}
