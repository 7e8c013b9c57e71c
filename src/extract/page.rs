//! The per-page pipeline: tables, then images, then text.

use std::path::Path;
use std::sync::Arc;

use crate::capability::Capabilities;
use crate::error::Result;
use crate::geometry::{is_in_margin, BoundingBox};
use crate::model::{ContentUnit, PageContent, RawBlock, SkippedItem, UnitContext, UnitKind};
use crate::options::IngestOptions;
use crate::parser::PagedDocument;
use crate::workspace::WorkingDir;

use super::table_grid::{detect_ruled_tables, TableContinuation};
use super::text::{group_blocks, HeadingDetector};
use super::CancelFlag;

/// What the extractors of one page share: the text they caption from and
/// the regions already claimed. Dropped once the page's units are out.
#[derive(Debug, Clone)]
pub struct PageState {
    pub page_index: usize,
    /// Text blocks outside the header/footer bands, in reading order
    pub text_blocks: Vec<RawBlock>,
    /// Boxes of accepted tables
    pub table_claims: Vec<BoundingBox>,
    /// Boxes of accepted images
    pub image_claims: Vec<BoundingBox>,
    /// Table running in from the previous page
    pub continuation: Option<TableContinuation>,
}

impl PageState {
    pub fn new(page: &PageContent, margin_ratio: f32, continuation: Option<TableContinuation>) -> Self {
        let text_blocks: Vec<RawBlock> = page
            .blocks
            .iter()
            .filter(|b| b.is_text() && !is_in_margin(&b.bbox, page.height, margin_ratio))
            .cloned()
            .collect();
        log::debug!(
            "Page {}: {} of {} blocks outside margins",
            page.index,
            text_blocks.len(),
            page.blocks.len()
        );

        Self {
            page_index: page.index,
            text_blocks,
            table_claims: Vec::new(),
            image_claims: Vec::new(),
            continuation,
        }
    }

    pub fn claim_table(&mut self, bbox: BoundingBox) {
        self.table_claims.push(bbox);
    }

    pub fn claim_image(&mut self, bbox: BoundingBox) {
        self.image_claims.push(bbox);
    }

    /// Whether `bbox` intersects a table accepted earlier on this page.
    pub fn overlaps_table(&self, bbox: &BoundingBox) -> bool {
        self.table_claims.iter().any(|t| t.intersects(bbox))
    }

    /// Whether text covering `bbox` is already represented by a table
    /// (or, with `include_images`, an image).
    pub fn suppresses(&self, bbox: &BoundingBox, include_images: bool) -> bool {
        self.overlaps_table(bbox)
            || (include_images && self.image_claims.iter().any(|i| i.intersects(bbox)))
    }
}

/// Units produced for one page, plus what carries over to the next.
#[derive(Debug, Default)]
pub struct PageOutput {
    /// Tables, then images, then text, each in page order
    pub units: Vec<ContentUnit>,
    pub skipped: Vec<SkippedItem>,
    pub continuation: Option<TableContinuation>,
}

/// Runs the page pipeline for one paginated document.
pub struct PageExtractor<'a> {
    pub ctx: &'a UnitContext,
    pub options: &'a IngestOptions,
    pub caps: &'a Capabilities,
    pub headings: &'a dyn HeadingDetector,
    pub document: Arc<dyn PagedDocument>,
    /// The document on disk, for the rasterizer
    pub document_path: &'a Path,
    /// Position of the document in its batch; scopes artifact directories
    pub input_index: usize,
    pub workdir: &'a WorkingDir,
    pub cancel: &'a CancelFlag,
}

impl PageExtractor<'_> {
    /// Extract every unit of a page.
    ///
    /// Per-item failures end up in [`PageOutput::skipped`]. The only error
    /// is cancellation, in which case nothing from this page is kept.
    pub async fn process_page(
        &self,
        page: &PageContent,
        continuation: Option<TableContinuation>,
    ) -> Result<PageOutput> {
        self.cancel.check()?;

        let mut state = PageState::new(page, self.options.margin_ratio, continuation);
        let mut skipped = Vec::new();

        let grids = detect_ruled_tables(&page.rules, &page.fragments, &self.options.table);
        let band = self.options.table.continuation_band_ratio;
        let next = grids
            .iter()
            .filter_map(|g| g.continuation(page.height, band))
            .last();

        let mut units = self
            .extract_tables(page, &grids, &mut state, &mut skipped)
            .await?;
        units.extend(self.extract_images(page, &mut state, &mut skipped).await?);

        self.cancel.check()?;
        units.extend(self.text_units(page, &state));

        log::debug!(
            "Page {}: {} units, {} skipped items",
            page.index,
            units.len(),
            skipped.len()
        );
        Ok(PageOutput {
            units,
            skipped,
            continuation: next,
        })
    }

    fn text_units(&self, page: &PageContent, state: &PageState) -> Vec<ContentUnit> {
        let groups = group_blocks(&state.text_blocks, self.headings, self.options.max_group_chars);

        let mut units = Vec::new();
        for (i, group) in groups.iter().enumerate() {
            let counter = i + 1;
            let Some(bbox) = group.bbox else {
                continue;
            };
            if state.suppresses(&bbox, self.options.suppress_image_regions) {
                log::debug!("Page {}: block group {} suppressed", page.index, counter);
                continue;
            }

            let text = group.text();
            if text.trim().is_empty() {
                continue;
            }
            let tag = self.ctx.page_tag(page.index, "block", counter);
            units.push(
                ContentUnit::new(UnitKind::Text, text, self.ctx.provenance(tag))
                    .on_page(page.index)
                    .with_bbox(bbox),
            );
        }
        units
    }
}
