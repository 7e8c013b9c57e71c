//! Image units for embedded rasters.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::geometry::is_trivial_image;
use crate::model::{ContentUnit, ImagePlacement, PageContent, SkippedItem, UnitKind};
use crate::workspace::ArtifactGuard;

use super::caption::{compose_caption, text_around};
use super::page::{PageExtractor, PageState};
use super::with_timeout;

impl PageExtractor<'_> {
    /// Turn the image placements of a page into image units.
    ///
    /// Unresolved and icon-sized placements are ignored, as are images with
    /// no surrounding text at all. Each image is extracted once per page.
    pub(super) async fn extract_images(
        &self,
        page: &PageContent,
        state: &mut PageState,
        skipped: &mut Vec<SkippedItem>,
    ) -> Result<Vec<ContentUnit>> {
        let mut seen = HashSet::new();
        let mut units = Vec::new();

        for placement in &page.images {
            self.cancel.check()?;

            if placement.xref == 0 {
                log::debug!("Page {}: unresolved image reference", page.index);
                continue;
            }
            if !seen.insert((placement.xref, placement.generation)) {
                continue;
            }
            if is_trivial_image(
                &placement.bbox,
                page.width,
                page.height,
                self.options.min_image_divisor,
            ) {
                log::debug!(
                    "Page {}: image {} too small ({:.0}x{:.0})",
                    page.index,
                    placement.xref,
                    placement.bbox.width(),
                    placement.bbox.height()
                );
                continue;
            }

            let tag = self.ctx.page_tag(page.index, "image", placement.xref);
            let result = with_timeout(
                &tag,
                self.options.item_timeout,
                self.image_unit(page, state, placement, &tag),
            )
            .await;

            match result {
                Ok(Some(unit)) => {
                    state.claim_image(placement.bbox);
                    units.push(unit);
                }
                Ok(None) => log::debug!("{}: no surrounding text, discarded", tag),
                Err(e) => {
                    log::warn!("Skipping {}: {}", tag, e);
                    skipped.push(SkippedItem::new(tag, e));
                }
            }
        }
        Ok(units)
    }

    async fn image_unit(
        &self,
        page: &PageContent,
        state: &PageState,
        placement: &ImagePlacement,
        tag: &str,
    ) -> Result<Option<ContentUnit>> {
        let (before, after) = text_around(
            &state.text_blocks,
            &placement.bbox,
            page.height,
            self.options.caption_window_ratio,
        );
        if before.is_empty() && after.is_empty() {
            return Ok(None);
        }

        let document = Arc::clone(&self.document);
        let (xref, generation) = (placement.xref, placement.generation);
        let image = tokio::task::spawn_blocking(move || document.image_data(xref, generation))
            .await
            .map_err(|e| Error::ExtractionFailed(format!("image decoding task: {e}")))??;

        let images_dir = self
            .workdir
            .input_dir(self.workdir.images_dir(), self.input_index)?;
        let mut guard = ArtifactGuard::new();
        let name = format!("image{}-page{}.{}", xref, page.index, image.extension);
        guard.write(images_dir.join(name), &image.data)?;

        let description = if self.caps.classifier.is_graph(&image.data).await? {
            self.caps.describer.describe_graph(&image.data).await?
        } else {
            " ".to_string()
        };

        let caption = compose_caption(&before, &description, &after);
        let text = format!("This is an image with the caption: {caption}");
        log::debug!("{}: captioned ({} chars)", tag, caption.len());

        Ok(Some(
            ContentUnit::new(UnitKind::Image, text, self.ctx.provenance(tag))
                .on_page(page.index)
                .with_bbox(placement.bbox)
                .with_caption(caption)
                .with_artifacts(guard.commit()),
        ))
    }
}
