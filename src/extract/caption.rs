//! Caption synthesis from the text surrounding a table or image.

use crate::geometry::BoundingBox;
use crate::model::RawBlock;

/// Slack allowed when deciding that a block sits above or below a target.
const EDGE_TOLERANCE: f32 = 1.0;

/// Find the text immediately above and below `target`.
///
/// Only text blocks horizontally aligned with the target (gap at most
/// `target.width() * window_ratio`) and within `page_height * window_ratio`
/// vertically qualify. `before` is the qualifying block whose bottom is
/// closest to the target's top, `after` the one whose top is closest to
/// its bottom. Either side is empty when nothing qualifies.
pub fn text_around(
    blocks: &[RawBlock],
    target: &BoundingBox,
    page_height: f32,
    window_ratio: f32,
) -> (String, String) {
    let max_distance = page_height * window_ratio;
    let max_offset = target.width() * window_ratio;

    let mut before: Option<(&RawBlock, f32)> = None;
    let mut after: Option<(&RawBlock, f32)> = None;

    for block in blocks.iter().filter(|b| b.is_text()) {
        if block.text.trim().is_empty() || block.bbox.horizontal_gap(target) > max_offset {
            continue;
        }

        if block.bbox.y2 <= target.y1 + EDGE_TOLERANCE {
            let distance = (target.y1 - block.bbox.y2).max(0.0);
            if distance <= max_distance && before.map_or(true, |(_, d)| distance < d) {
                before = Some((block, distance));
            }
        } else if block.bbox.y1 >= target.y2 - EDGE_TOLERANCE {
            let distance = (block.bbox.y1 - target.y2).max(0.0);
            if distance <= max_distance && after.map_or(true, |(_, d)| distance < d) {
                after = Some((block, distance));
            }
        }
    }

    let text = |found: Option<(&RawBlock, f32)>| {
        found
            .map(|(b, _)| b.text.trim().to_string())
            .unwrap_or_default()
    };
    (text(before), text(after))
}

/// Join surrounding text and a description into one caption.
///
/// Line breaks in the surrounding text are flattened to spaces and empty
/// parts are left out, so the result never has doubled separators.
pub fn compose_caption(before: &str, description: &str, after: &str) -> String {
    [before, description, after]
        .iter()
        .map(|part| part.replace(['\n', '\r'], " "))
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
