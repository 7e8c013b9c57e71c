//! Table units: export, crop, caption.

use crate::error::Result;
use crate::model::{ContentUnit, PageContent, SkippedItem, UnitKind};
use crate::workspace::ArtifactGuard;

use super::caption::{compose_caption, text_around};
use super::page::{PageExtractor, PageState};
use super::table_grid::TableGrid;
use super::with_timeout;

impl PageExtractor<'_> {
    /// Turn the detected grids of a page into table units, claiming the box
    /// of each accepted table.
    pub(super) async fn extract_tables(
        &self,
        page: &PageContent,
        grids: &[TableGrid],
        state: &mut PageState,
        skipped: &mut Vec<SkippedItem>,
    ) -> Result<Vec<ContentUnit>> {
        let band = self.options.table.continuation_band_ratio;
        let mut units = Vec::new();

        for (i, grid) in grids.iter().enumerate() {
            self.cancel.check()?;
            let tag = self.ctx.page_tag(page.index, "table", i + 1);

            if grid.header_is_external(page.height, state.continuation, band) {
                log::debug!("{}: header lies outside the table, skipping", tag);
                continue;
            }
            if state.overlaps_table(&grid.bbox) {
                log::debug!("{}: overlaps an accepted table, skipping", tag);
                continue;
            }

            let result = with_timeout(
                &tag,
                self.options.item_timeout,
                self.table_unit(page, state, grid, &tag),
            )
            .await;

            match result {
                Ok(unit) => {
                    state.claim_table(grid.bbox);
                    units.push(unit);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", tag, e);
                    skipped.push(SkippedItem::new(tag, e));
                }
            }
        }
        Ok(units)
    }

    async fn table_unit(
        &self,
        page: &PageContent,
        state: &PageState,
        grid: &TableGrid,
        tag: &str,
    ) -> Result<ContentUnit> {
        let mut guard = ArtifactGuard::new();
        let tables_dir = self
            .workdir
            .input_dir(self.workdir.tables_dir(), self.input_index)?;

        let export = self.caps.exporter.export(&grid.cells)?;
        let export_name = format!("{tag}.{}", self.caps.exporter.extension());
        guard.write(tables_dir.join(export_name), &export)?;

        let crop = self
            .caps
            .rasterizer
            .rasterize(self.document_path, page.index, Some(grid.bbox))
            .await?;
        guard.write(tables_dir.join(format!("{tag}.png")), &crop)?;

        let (before, after) = text_around(
            &state.text_blocks,
            &grid.bbox,
            page.height,
            self.options.caption_window_ratio,
        );
        let description = self.caps.describer.describe_graph(&crop).await?;

        let names = grid.header_names();
        let caption = if before.is_empty() && after.is_empty() {
            names.join(" ")
        } else {
            compose_caption(&before, &description, &after)
        };

        let text = format!(
            "This is a table with the caption: {}\nThe columns are {}",
            caption,
            names.join(", ")
        );
        log::debug!("{}: {} rows x {} columns", tag, grid.row_count(), grid.column_count());

        Ok(ContentUnit::new(UnitKind::Table, text, self.ctx.provenance(tag))
            .on_page(page.index)
            .with_bbox(grid.bbox)
            .with_caption(caption)
            .with_artifacts(guard.commit()))
    }
}
