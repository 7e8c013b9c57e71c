//! Heading detection and grouping of text blocks into sections.

use regex::Regex;

use crate::geometry::BoundingBox;
use crate::model::RawBlock;
use crate::parser::FontStatistics;

/// Decides whether a text block opens a new section.
pub trait HeadingDetector: Send + Sync {
    fn is_heading(&self, block: &RawBlock, stats: &FontStatistics) -> bool;
}

/// Heading heuristic based on typography and numbering.
///
/// A block is a heading when it is a single short line without a closing
/// period and at least one of these holds: its font is noticeably larger
/// than the page's body size, it is bold, or it starts with a section
/// number such as `2.` or `3.1`.
#[derive(Debug, Clone)]
pub struct FontHeadingDetector {
    /// Points above the body size that mark a heading font
    pub size_delta: f32,
    /// Longest block (in characters) that can still be a heading
    pub max_heading_chars: usize,
    section_number: Regex,
}

impl FontHeadingDetector {
    pub fn new() -> Self {
        Self {
            size_delta: 1.5,
            max_heading_chars: 120,
            section_number: Regex::new(r"^(\d+\.)+\d*\s+\S|^\d+(\.\d+)+\s+\S").unwrap(),
        }
    }

    pub fn with_size_delta(mut self, delta: f32) -> Self {
        self.size_delta = delta;
        self
    }

    pub fn with_max_heading_chars(mut self, chars: usize) -> Self {
        self.max_heading_chars = chars;
        self
    }
}

impl Default for FontHeadingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadingDetector for FontHeadingDetector {
    fn is_heading(&self, block: &RawBlock, stats: &FontStatistics) -> bool {
        let text = block.text.trim();
        if text.is_empty()
            || block.line_count() > 1
            || text.chars().count() > self.max_heading_chars
            || text.ends_with('.')
        {
            return false;
        }

        let larger = stats
            .body_size()
            .is_some_and(|body| block.font_size >= body + self.size_delta);

        larger || block.is_bold || self.section_number.is_match(text)
    }
}

/// A heading and the body blocks that follow it.
#[derive(Debug, Clone, Default)]
pub struct BlockGroup {
    pub heading: Option<String>,
    pub body: Vec<String>,
    pub bbox: Option<BoundingBox>,
    body_chars: usize,
}

impl BlockGroup {
    fn with_heading(block: &RawBlock) -> Self {
        Self {
            heading: Some(block.text.trim().to_string()),
            bbox: Some(block.bbox),
            ..Self::default()
        }
    }

    fn push_body(&mut self, block: &RawBlock) {
        self.body.push(block.text.trim().to_string());
        self.body_chars += block.char_count();
        self.bbox = Some(match self.bbox {
            Some(b) => b.union(&block.bbox),
            None => block.bbox,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.heading.is_none() && self.body.is_empty()
    }

    /// Heading line followed by the body blocks, one per line.
    pub fn text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.body.len() + 1);
        if let Some(heading) = &self.heading {
            parts.push(heading);
        }
        parts.extend(self.body.iter().map(String::as_str));
        parts.join("\n")
    }
}

/// Group text blocks (in reading order) into sections.
///
/// Each heading starts a group. Body blocks before the first heading form
/// a group of their own. A group whose body would grow past
/// `max_group_chars` is closed and the block starts a new group without a
/// heading.
pub fn group_blocks(
    blocks: &[RawBlock],
    detector: &dyn HeadingDetector,
    max_group_chars: usize,
) -> Vec<BlockGroup> {
    let text_blocks: Vec<&RawBlock> = blocks
        .iter()
        .filter(|b| b.is_text() && !b.text.trim().is_empty())
        .collect();
    let stats = FontStatistics::from_blocks(text_blocks.iter().copied());

    let mut groups = Vec::new();
    let mut current = BlockGroup::default();

    for block in text_blocks {
        if detector.is_heading(block, &stats) {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            current = BlockGroup::with_heading(block);
            continue;
        }

        if current.body_chars > 0 && current.body_chars + block.char_count() > max_group_chars {
            groups.push(std::mem::take(&mut current));
        }
        current.push_body(block);
    }

    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
