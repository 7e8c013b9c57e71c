//! Layout analysis for PDF pages.
//!
//! Groups positioned text spans into lines and lines into blocks, in reading
//! order. All coordinates here are in page space (origin top-left).

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::geometry::BoundingBox;
use crate::model::{ImagePlacement, RawBlock};

/// A text span with position and style information.
#[derive(Debug, Clone)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Width of the text
    pub width: f32,
    /// Font size in points
    pub font_size: f32,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: String,
    /// Whether the font appears to be bold
    pub is_bold: bool,
}

impl TextSpan {
    /// Create a new text span.
    pub fn new(text: String, x: f32, y: f32, font_size: f32, font_name: String) -> Self {
        let lower = font_name.to_lowercase();
        let is_bold = lower.contains("bold") || lower.contains("black") || lower.contains("heavy");

        Self {
            text,
            x,
            y,
            width: 0.0,
            font_size,
            font_name,
            is_bold,
        }
    }

    /// Top edge (approximate ascender).
    pub fn top(&self) -> f32 {
        self.y - self.font_size * 0.8
    }

    /// Bottom edge (approximate descender).
    pub fn bottom(&self) -> f32 {
        self.y + self.font_size * 0.2
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.top(), self.x + self.width, self.bottom())
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// A text line composed of spans on the same baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// The spans in this line, sorted by X position
    pub spans: Vec<TextSpan>,
    /// Baseline
    pub y: f32,
    /// Leftmost X position
    pub x: f32,
    /// Dominant font size in this line
    pub font_size: f32,
}

impl TextLine {
    /// Create a new text line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));

        let font_size = weighted_font_size(spans.iter().map(|s| (s.font_size, s.char_count())))
            .unwrap_or(0.0);
        let y = spans.first().map(|s| s.y).unwrap_or(0.0);
        let x = spans.first().map(|s| s.x).unwrap_or(0.0);

        Self {
            spans,
            y,
            x,
            font_size,
        }
    }

    /// Combined text of all spans.
    ///
    /// A space is inserted where the gap between spans exceeds a fifth of
    /// an average glyph, except between characters of spaceless scripts.
    pub fn text(&self) -> String {
        let mut result = String::new();

        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.x - (prev.x + prev.width);

                let chars = span.char_count();
                let glyph = if chars > 0 && span.width > 0.0 {
                    span.width / chars as f32
                } else {
                    span.font_size * 0.5
                };

                let spaceless_join = prev
                    .text
                    .chars()
                    .last()
                    .is_some_and(is_spaceless_script_char)
                    && span
                        .text
                        .chars()
                        .next()
                        .is_some_and(is_spaceless_script_char);
                let already_spaced = prev.text.ends_with([' ', '\u{00A0}'])
                    || span.text.starts_with([' ', '\u{00A0}']);

                if gap > glyph * 0.2 && !spaceless_join && !already_spaced {
                    result.push(' ');
                }
            }
            result.push_str(&span.text);
        }

        result
    }

    /// Check if the line is predominantly bold.
    pub fn is_bold(&self) -> bool {
        let bold: usize = self
            .spans
            .iter()
            .filter(|s| s.is_bold)
            .map(|s| s.char_count())
            .sum();
        let total: usize = self.spans.iter().map(|s| s.char_count()).sum();
        total > 0 && bold as f32 / total as f32 > 0.5
    }

    pub fn bbox(&self) -> BoundingBox {
        let boxes: Vec<BoundingBox> = self.spans.iter().map(|s| s.bbox()).collect();
        BoundingBox::union_all(&boxes).unwrap_or(BoundingBox::new(self.x, self.y, self.x, self.y))
    }

    fn char_count(&self) -> usize {
        self.spans.iter().map(|s| s.char_count()).sum()
    }
}

/// A detected column in the page layout.
#[derive(Debug, Clone)]
pub struct Column {
    /// Left boundary X coordinate
    pub left: f32,
    /// Right boundary X coordinate
    pub right: f32,
    /// Column index (0 = leftmost)
    pub index: usize,
}

impl Column {
    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }

    /// A span belongs to a column if its left edge or its center is inside.
    pub fn contains_span(&self, span: &TextSpan) -> bool {
        self.contains(span.x) || self.contains(span.x + span.width / 2.0)
    }
}

/// Character-weighted font size histogram.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Observed sizes (tenths of a point) with character counts
    pub size_histogram: HashMap<i32, usize>,
}

impl FontStatistics {
    /// Record `chars` characters set at `size`.
    pub fn add_size(&mut self, size: f32, chars: usize) {
        let key = (size * 10.0).round() as i32;
        *self.size_histogram.entry(key).or_insert(0) += chars;
    }

    /// Statistics over the text blocks of a page.
    pub fn from_blocks<'a>(blocks: impl IntoIterator<Item = &'a RawBlock>) -> Self {
        let mut stats = Self::default();
        for block in blocks.into_iter().filter(|b| b.is_text()) {
            stats.add_size(block.font_size, block.char_count());
        }
        stats
    }

    /// The size most characters are set in; ties go to the smaller size.
    pub fn body_size(&self) -> Option<f32> {
        self.size_histogram
            .iter()
            .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(kb.cmp(ka)))
            .map(|(key, _)| *key as f32 / 10.0)
    }
}

/// Turns the spans and image placements of one page into raw blocks.
pub struct LayoutAnalyzer {
    page_width: f32,
}

impl LayoutAnalyzer {
    pub fn new(page_width: f32) -> Self {
        Self { page_width }
    }

    /// Build text blocks from spans and one image block per placement,
    /// ordered column by column, top to bottom.
    pub fn analyze(&self, spans: Vec<TextSpan>, images: &[ImagePlacement]) -> Vec<RawBlock> {
        let columns = self.detect_columns(&spans);
        log::debug!("Detected {} columns", columns.len());

        let mut column_spans: Vec<Vec<TextSpan>> = vec![Vec::new(); columns.len().max(1)];
        for span in spans {
            let col = columns
                .iter()
                .position(|c| c.contains_span(&span))
                .unwrap_or(0);
            column_spans[col].push(span);
        }

        let mut ordered: Vec<(usize, RawBlock)> = Vec::new();
        for (col, spans) in column_spans.into_iter().enumerate() {
            let lines = self.group_spans_into_lines(spans);
            for block in self.group_lines_into_blocks(lines) {
                ordered.push((col, block));
            }
        }

        for placement in images {
            let (cx, _) = placement.bbox.center();
            let col = columns.iter().position(|c| c.contains(cx)).unwrap_or(0);
            ordered.push((col, RawBlock::image(placement.bbox)));
        }

        ordered.sort_by(|(ca, a), (cb, b)| {
            ca.cmp(cb)
                .then(a.bbox.y1.partial_cmp(&b.bbox.y1).unwrap_or(Ordering::Equal))
                .then(a.bbox.x1.partial_cmp(&b.bbox.x1).unwrap_or(Ordering::Equal))
        });
        ordered.into_iter().map(|(_, b)| b).collect()
    }

    /// Detect a two-column layout from a vertical gutter free of text.
    ///
    /// Returns one column when no convincing gutter exists.
    pub fn detect_columns(&self, spans: &[TextSpan]) -> Vec<Column> {
        const SLICE: f32 = 3.0;
        const MIN_GUTTER: f32 = 12.0;
        const MIN_COLUMN_WIDTH: f32 = 80.0;

        const MAX_SLICES: usize = 4096;

        // Text placed far off the page must not size the occupancy buffer
        let bound = self.page_width.abs().max(1.0);
        let clamp = |v: f32| {
            if v.is_finite() {
                v.clamp(-bound, 2.0 * bound)
            } else {
                0.0
            }
        };
        let extents: Vec<(f32, f32)> = spans
            .iter()
            .map(|s| (clamp(s.x), clamp(s.x + s.width)))
            .collect();

        let min_x = extents.iter().map(|e| e.0).fold(f32::MAX, f32::min);
        let max_x = extents.iter().map(|e| e.1).fold(f32::MIN, f32::max);
        let single = || {
            vec![Column {
                left: min_x.min(0.0) - 10.0,
                right: max_x.max(self.page_width) + 10.0,
                index: 0,
            }]
        };

        let extent = max_x - min_x;
        if spans.is_empty() || extent < 250.0 {
            return single();
        }

        let slices = (extent / SLICE) as usize + 1;
        if slices > MAX_SLICES {
            return single();
        }
        let mut occupancy = vec![0usize; slices];
        for &(left, right) in &extents {
            let start = ((left - min_x) / SLICE) as usize;
            let end = ((right - min_x) / SLICE) as usize;
            for slot in occupancy
                .iter_mut()
                .take(end.min(slices - 1) + 1)
                .skip(start)
            {
                *slot += 1;
            }
        }

        // Empty runs in the middle 70% of the text extent
        let search = (slices * 15 / 100)..(slices * 85 / 100);
        let center = slices as f32 / 2.0;
        let mut gaps: Vec<(usize, usize)> = Vec::new();
        let mut run_start: Option<usize> = None;
        for i in search.clone() {
            match (occupancy[i] == 0, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    gaps.push((start, i - start));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            gaps.push((start, search.end - start));
        }

        // Prefer wide gutters, then gutters near the middle
        let best = gaps
            .into_iter()
            .filter(|(_, len)| *len as f32 * SLICE >= MIN_GUTTER)
            .max_by(|a, b| {
                let dist = |g: &(usize, usize)| (g.0 as f32 + g.1 as f32 / 2.0 - center).abs();
                a.1.cmp(&b.1)
                    .then(dist(b).partial_cmp(&dist(a)).unwrap_or(Ordering::Equal))
            });

        let Some((start, len)) = best else {
            log::debug!("No gutter wider than {MIN_GUTTER}pt, treating as single column");
            return single();
        };

        let gutter = min_x + (start as f32 + len as f32 / 2.0) * SLICE;
        if gutter - min_x < MIN_COLUMN_WIDTH || max_x - gutter < MIN_COLUMN_WIDTH {
            log::debug!("Column too narrow, treating as single column");
            return single();
        }

        let left = spans
            .iter()
            .filter(|s| s.x + s.width / 2.0 < gutter)
            .count();
        let right = spans.len() - left;
        let min_spans = (spans.len() / 10).max(2);
        if left < min_spans || right < min_spans {
            log::debug!("Spans too imbalanced ({left}/{right}), treating as single column");
            return single();
        }

        log::debug!("Gutter at x={gutter:.1} ({:.1}pt wide)", len as f32 * SLICE);
        vec![
            Column {
                left: min_x - 10.0,
                right: gutter,
                index: 0,
            },
            Column {
                left: gutter,
                right: max_x + 10.0,
                index: 1,
            },
        ]
    }

    /// Group spans sharing a baseline (within 30% of the font size).
    pub fn group_spans_into_lines(&self, mut spans: Vec<TextSpan>) -> Vec<TextLine> {
        spans.sort_by(|a, b| {
            a.y.partial_cmp(&b.y)
                .unwrap_or(Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
        });

        let mut lines = Vec::new();
        let mut current: Vec<TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in spans {
            let tolerance = span.font_size * 0.3;
            match current_y {
                Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
                _ => {
                    if !current.is_empty() {
                        lines.push(TextLine::from_spans(std::mem::take(&mut current)));
                    }
                    current_y = Some(span.y);
                    current.push(span);
                }
            }
        }
        if !current.is_empty() {
            lines.push(TextLine::from_spans(current));
        }

        lines
    }

    /// Group consecutive lines into blocks, breaking on spacing, size,
    /// weight and indentation changes.
    pub fn group_lines_into_blocks(&self, lines: Vec<TextLine>) -> Vec<RawBlock> {
        let avg_spacing = average_line_spacing(&lines);
        let mut blocks = Vec::new();
        let mut current: Vec<TextLine> = Vec::new();

        for line in lines {
            if let Some(prev) = current.last() {
                if should_break_block(prev, &line, avg_spacing) {
                    blocks.push(lines_to_block(std::mem::take(&mut current)));
                }
            }
            current.push(line);
        }
        if !current.is_empty() {
            blocks.push(lines_to_block(current));
        }

        blocks
    }
}

fn average_line_spacing(lines: &[TextLine]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[1].y - w[0].y).abs())
        .filter(|s| *s > 0.1)
        .collect();

    if spacings.is_empty() {
        12.0
    } else {
        spacings.iter().sum::<f32>() / spacings.len() as f32
    }
}

fn should_break_block(prev: &TextLine, curr: &TextLine, avg_spacing: f32) -> bool {
    let spacing = curr.y - prev.y;
    if spacing > avg_spacing * 1.5 || spacing > prev.font_size * 2.5 || spacing < 0.0 {
        return true;
    }

    if (prev.font_size - curr.font_size).abs() > 1.0 {
        return true;
    }

    if prev.is_bold() != curr.is_bold() {
        return true;
    }

    // Indentation change
    (prev.x - curr.x).abs() > 20.0
}

fn lines_to_block(lines: Vec<TextLine>) -> RawBlock {
    let boxes: Vec<BoundingBox> = lines.iter().map(|l| l.bbox()).collect();
    let bbox = BoundingBox::union_all(&boxes).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0));
    let text = lines
        .iter()
        .map(|l| l.text())
        .collect::<Vec<_>>()
        .join("\n");
    let font_size =
        weighted_font_size(lines.iter().map(|l| (l.font_size, l.char_count()))).unwrap_or(0.0);

    let bold_chars: usize = lines
        .iter()
        .filter(|l| l.is_bold())
        .map(|l| l.char_count())
        .sum();
    let total_chars: usize = lines.iter().map(|l| l.char_count()).sum();
    let is_bold = total_chars > 0 && bold_chars * 2 > total_chars;

    RawBlock::text(bbox, text, font_size).bold(is_bold)
}

/// Average font size weighted by character count.
fn weighted_font_size(sizes: impl Iterator<Item = (f32, usize)>) -> Option<f32> {
    let (sum, chars, first) = sizes.fold((0.0f32, 0usize, None), |(sum, chars, first), (s, n)| {
        (sum + s * n as f32, chars + n, first.or(Some(s)))
    });
    if chars > 0 {
        Some(sum / chars as f32)
    } else {
        first
    }
}

/// Whether a character belongs to a script written without word spaces.
///
/// Chinese and Japanese don't separate words; Korean does.
pub fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and extensions A-F
    (0x4E00..=0x9FFF).contains(&code)
    || (0x3400..=0x4DBF).contains(&code)
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana, Katakana
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}
