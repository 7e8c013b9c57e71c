//! Ruled table detection.
//!
//! Tables are found from their drawn rules only: horizontal and vertical
//! segments are snapped, merged, and clustered into connected grids whose
//! rule positions become the row and column edges. Text is then assigned to
//! cells by the centre of each fragment. Tables drawn without rules are not
//! detected.

use crate::geometry::{BoundingBox, Segment};
use crate::model::TextFragment;
use crate::options::TableDetectorConfig;

/// A detected table: its grid and cell text.
#[derive(Debug, Clone)]
pub struct TableGrid {
    /// Outer extent of the grid
    pub bbox: BoundingBox,
    /// Y positions of the horizontal rules, top to bottom
    pub row_edges: Vec<f32>,
    /// X positions of the vertical rules, left to right
    pub col_edges: Vec<f32>,
    /// Cell text, row-major
    pub cells: Vec<Vec<String>>,
}

/// What the previous page hands to the next one about a table that ran
/// into its bottom band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableContinuation {
    pub column_count: usize,
}

impl TableGrid {
    pub fn row_count(&self) -> usize {
        self.row_edges.len().saturating_sub(1)
    }

    pub fn column_count(&self) -> usize {
        self.col_edges.len().saturating_sub(1)
    }

    /// Names of the columns, from the first row. Blank cells are named
    /// `Col{index}`.
    pub fn header_names(&self) -> Vec<String> {
        let header = self.cells.first();
        (0..self.column_count())
            .map(|i| {
                header
                    .and_then(|row| row.get(i))
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Col{i}"))
            })
            .collect()
    }

    /// Whether the real header row lies outside this grid.
    ///
    /// That is the case when the first row holds no text, or when the grid
    /// starts in the top band of the page and continues a table with the
    /// same column count that ran into the bottom band of the previous page.
    pub fn header_is_external(
        &self,
        page_height: f32,
        previous: Option<TableContinuation>,
        band_ratio: f32,
    ) -> bool {
        let first_row_empty = self
            .cells
            .first()
            .map_or(true, |row| row.iter().all(|c| c.trim().is_empty()));
        if first_row_empty {
            return true;
        }

        match previous {
            Some(prev) => {
                prev.column_count == self.column_count() && self.bbox.y1 < page_height * band_ratio
            }
            None => false,
        }
    }

    /// The continuation this grid hands to the next page, if it ends in
    /// the bottom band.
    pub fn continuation(&self, page_height: f32, band_ratio: f32) -> Option<TableContinuation> {
        (self.bbox.y2 > page_height * (1.0 - band_ratio)).then(|| TableContinuation {
            column_count: self.column_count(),
        })
    }
}

/// A rule normalised to a constant coordinate and a span along its axis.
#[derive(Debug, Clone, Copy)]
struct Rule {
    at: f32,
    start: f32,
    end: f32,
}

/// Detect ruled tables on a page, ordered top to bottom then left to right.
pub fn detect_ruled_tables(
    segments: &[Segment],
    fragments: &[TextFragment],
    config: &TableDetectorConfig,
) -> Vec<TableGrid> {
    let tol = config.snap_tolerance;
    let (horizontal, vertical) = classify(segments, config);
    if horizontal.len() < 2 || vertical.len() < 2 {
        return Vec::new();
    }

    let horizontal = merge_collinear(horizontal, tol);
    let vertical = merge_collinear(vertical, tol);
    log::debug!(
        "Ruled table candidates: {} horizontal, {} vertical rules",
        horizontal.len(),
        vertical.len()
    );

    let mut tables: Vec<TableGrid> = cluster(&horizontal, &vertical, tol)
        .into_iter()
        .filter_map(|(hs, vs)| build_grid(&hs, &vs, fragments, config))
        .collect();

    tables.sort_by(|a, b| {
        a.bbox
            .y1
            .total_cmp(&b.bbox.y1)
            .then(a.bbox.x1.total_cmp(&b.bbox.x1))
    });
    tables
}

/// Split segments into horizontal and vertical rules, dropping short and
/// diagonal ones.
fn classify(segments: &[Segment], config: &TableDetectorConfig) -> (Vec<Rule>, Vec<Rule>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();

    for seg in segments {
        if seg.length() < config.min_rule_length {
            continue;
        }
        if seg.is_horizontal(config.snap_tolerance) {
            horizontal.push(Rule {
                at: (seg.y1 + seg.y2) / 2.0,
                start: seg.x1.min(seg.x2),
                end: seg.x1.max(seg.x2),
            });
        } else if seg.is_vertical(config.snap_tolerance) {
            vertical.push(Rule {
                at: (seg.x1 + seg.x2) / 2.0,
                start: seg.y1.min(seg.y2),
                end: seg.y1.max(seg.y2),
            });
        }
    }
    (horizontal, vertical)
}

/// Join rules on the same line whose spans touch or overlap.
fn merge_collinear(mut rules: Vec<Rule>, tol: f32) -> Vec<Rule> {
    rules.sort_by(|a, b| a.at.total_cmp(&b.at).then(a.start.total_cmp(&b.start)));

    let mut merged: Vec<Rule> = Vec::with_capacity(rules.len());
    for rule in rules {
        // Snap onto an existing line if one is close enough
        let line_at = merged
            .iter()
            .rev()
            .find(|m| (m.at - rule.at).abs() <= tol)
            .map(|m| m.at)
            .unwrap_or(rule.at);

        match merged
            .iter_mut()
            .rev()
            .find(|m| m.at == line_at && rule.start <= m.end + tol && m.start <= rule.end + tol)
        {
            Some(existing) => {
                existing.start = existing.start.min(rule.start);
                existing.end = existing.end.max(rule.end);
            }
            None => merged.push(Rule {
                at: line_at,
                ..rule
            }),
        }
    }
    merged
}

/// Group rules into connected components of crossing horizontals and
/// verticals.
fn cluster(horizontal: &[Rule], vertical: &[Rule], tol: f32) -> Vec<(Vec<Rule>, Vec<Rule>)> {
    let n = horizontal.len();
    let mut parent: Vec<usize> = (0..n + vertical.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for (hi, h) in horizontal.iter().enumerate() {
        for (vi, v) in vertical.iter().enumerate() {
            let crosses = v.at >= h.start - tol
                && v.at <= h.end + tol
                && h.at >= v.start - tol
                && h.at <= v.end + tol;
            if crosses {
                let a = find(&mut parent, hi);
                let b = find(&mut parent, n + vi);
                if a != b {
                    parent[a] = b;
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<Rule>, Vec<Rule>)> = Vec::new();
    for i in 0..parent.len() {
        let root = find(&mut parent, i);
        let idx = match groups.iter().position(|(r, _, _)| *r == root) {
            Some(idx) => idx,
            None => {
                groups.push((root, Vec::new(), Vec::new()));
                groups.len() - 1
            }
        };
        if i < n {
            groups[idx].1.push(horizontal[i]);
        } else {
            groups[idx].2.push(vertical[i - n]);
        }
    }

    groups.into_iter().map(|(_, hs, vs)| (hs, vs)).collect()
}

/// Sorted distinct positions, merging those within `tol`.
fn distinct_edges(mut positions: Vec<f32>, tol: f32) -> Vec<f32> {
    positions.sort_by(f32::total_cmp);
    let mut edges: Vec<f32> = Vec::with_capacity(positions.len());
    for p in positions {
        match edges.last() {
            Some(last) if p - last <= tol => {}
            _ => edges.push(p),
        }
    }
    edges
}

fn build_grid(
    horizontal: &[Rule],
    vertical: &[Rule],
    fragments: &[TextFragment],
    config: &TableDetectorConfig,
) -> Option<TableGrid> {
    let tol = config.snap_tolerance;
    let row_edges = distinct_edges(horizontal.iter().map(|r| r.at).collect(), tol);
    let col_edges = distinct_edges(vertical.iter().map(|r| r.at).collect(), tol);

    let rows = row_edges.len().saturating_sub(1);
    let cols = col_edges.len().saturating_sub(1);
    if rows < config.min_rows.max(1) || cols < config.min_columns.max(1) || rows * cols < config.min_cells
    {
        log::debug!("Rejected rule cluster with {rows} rows x {cols} columns");
        return None;
    }

    let bbox = BoundingBox::new(
        col_edges[0],
        row_edges[0],
        col_edges[cols],
        row_edges[rows],
    );

    let mut placed: Vec<(usize, usize, &TextFragment)> = fragments
        .iter()
        .filter_map(|f| {
            let (cx, cy) = f.bbox.center();
            if !bbox.contains_point(cx, cy) {
                return None;
            }
            Some((find_band(&row_edges, cy)?, find_band(&col_edges, cx)?, f))
        })
        .collect();
    placed.sort_by(|a, b| {
        a.2.bbox
            .y1
            .total_cmp(&b.2.bbox.y1)
            .then(a.2.bbox.x1.total_cmp(&b.2.bbox.x1))
    });

    let mut cells = vec![vec![String::new(); cols]; rows];
    for (r, c, fragment) in placed {
        let text = fragment.text.trim();
        if text.is_empty() {
            continue;
        }
        let cell = &mut cells[r][c];
        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(text);
    }

    Some(TableGrid {
        bbox,
        row_edges,
        col_edges,
        cells,
    })
}

/// Index of the band `[edges[i], edges[i+1])` containing `value`; the last
/// band includes its far edge.
fn find_band(edges: &[f32], value: f32) -> Option<usize> {
    let last = edges.len().checked_sub(2)?;
    (0..=last).find(|&i| value >= edges[i] && (value < edges[i + 1] || (i == last && value <= edges[i + 1])))
}
