//! Slide decks: one image unit per slide.
//!
//! The deck is rendered through a paginated conversion, each page is
//! rasterized, and the images are paired by position with the slide text
//! and notes read from the deck itself. The two counts must agree.

use std::path::{Path, PathBuf};

use crate::capability::{Capabilities, ConvertTarget};
use crate::detect::{is_ole_bytes, is_zip_bytes};
use crate::error::{Error, Result};
use crate::model::{ContentUnit, SkippedItem, UnitContext, UnitKind};
use crate::options::IngestOptions;
use crate::parser::{read_slides, PagedDocument, PdfDocument, SlideText};
use crate::workspace::{ArtifactGuard, WorkingDir};

use super::caption::compose_caption;
use super::{with_timeout, CancelFlag};

const NOTES_PREFIX: &str = "\n\nThe speaker notes for this slide are: ";

/// Extracts the slides of one deck.
pub struct SlideExtractor<'a> {
    pub ctx: &'a UnitContext,
    pub options: &'a IngestOptions,
    pub caps: &'a Capabilities,
    pub workdir: &'a WorkingDir,
    pub cancel: &'a CancelFlag,
    /// Position of the deck in its batch, keeps renders of same-named
    /// decks apart
    pub input_index: usize,
}

impl SlideExtractor<'_> {
    /// Produce slide units for the deck persisted at `deck_path`.
    ///
    /// Conversion, rendering and count mismatches fail the whole deck.
    /// Failures while captioning a single slide only drop that slide.
    pub async fn extract(
        &self,
        deck_path: &Path,
        data: &[u8],
        skipped: &mut Vec<SkippedItem>,
    ) -> Result<Vec<ContentUnit>> {
        let filename = self.ctx.filename.as_str();
        if !is_zip_bytes(data) && !is_ole_bytes(data) {
            return Err(Error::unreadable(filename, "not an OOXML or legacy binary deck"));
        }
        let out_dir = deck_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.workdir.sources_dir());

        let pdf_path = with_timeout(
            filename,
            self.options.conversion_timeout,
            self.caps.converter.convert(deck_path, &out_dir, ConvertTarget::Pdf),
        )
        .await?;
        let rendered = rendered_page_count(&pdf_path).await?;

        let slides = self.slide_texts(deck_path, data, &out_dir).await?;
        if rendered != slides.len() {
            return Err(Error::StructuralMismatch {
                rendered,
                extracted: slides.len(),
            });
        }
        log::info!("{}: {} slides", filename, slides.len());

        let images = self.render_slides(&pdf_path, rendered).await?;

        let mut units = Vec::with_capacity(slides.len());
        for (index, (slide, image)) in slides.iter().zip(images).enumerate() {
            self.cancel.check()?;
            let item = format!("{}-slide{}", self.ctx.stem(), index);

            let result = with_timeout(
                &item,
                self.options.item_timeout,
                self.slide_unit(index, slide, &image),
            )
            .await;
            match result {
                Ok(unit) => units.push(unit),
                Err(e) => {
                    log::warn!("Skipping {}: {}", item, e);
                    if let Err(err) = std::fs::remove_file(&image) {
                        log::debug!("Could not remove {}: {}", image.display(), err);
                    }
                    skipped.push(SkippedItem::new(item, e));
                }
            }
        }
        Ok(units)
    }

    /// Slide text and notes in presentation order. Legacy binary decks are
    /// converted to OOXML first.
    async fn slide_texts(&self, deck_path: &Path, data: &[u8], out_dir: &Path) -> Result<Vec<SlideText>> {
        if is_zip_bytes(data) {
            return read_slides(data);
        }

        log::debug!("{}: not an OOXML package, converting", self.ctx.filename);
        let pptx = with_timeout(
            &self.ctx.filename,
            self.options.conversion_timeout,
            self.caps.converter.convert(deck_path, out_dir, ConvertTarget::Pptx),
        )
        .await?;
        read_slides(&tokio::fs::read(&pptx).await?)
    }

    /// Rasterize every page of the rendered deck to
    /// `slides/{input}/{stem}_{nnnn}.png`.
    async fn render_slides(&self, pdf_path: &Path, count: usize) -> Result<Vec<PathBuf>> {
        let dir = self
            .workdir
            .input_dir(self.workdir.slides_dir(), self.input_index)?;

        let mut guard = ArtifactGuard::new();
        for index in 0..count {
            self.cancel.check()?;
            let item = format!("{}-slide{}", self.ctx.stem(), index);
            let png = with_timeout(
                &item,
                self.options.item_timeout,
                self.caps.rasterizer.rasterize(pdf_path, index, None),
            )
            .await?;
            let name = format!("{}_{:04}.png", self.ctx.stem(), index);
            guard.write(dir.join(name), &png)?;
        }
        Ok(guard.commit())
    }

    async fn slide_unit(&self, index: usize, slide: &SlideText, image: &Path) -> Result<ContentUnit> {
        let png = tokio::fs::read(image).await?;

        let description = if self.caps.classifier.is_graph(&png).await? {
            self.caps.describer.describe_graph(&png).await?
        } else {
            String::new()
        };
        let description = match description.trim() {
            "" => String::new(),
            d => format!(" {d}"),
        };

        let text = format!("This is a slide with the text: {}{}", slide.text, description);
        let mut caption = compose_caption(&slide.text, &description, "");
        if !slide.notes.trim().is_empty() {
            caption.push_str(NOTES_PREFIX);
            caption.push_str(slide.notes.trim());
        }

        Ok(
            ContentUnit::new(UnitKind::Image, text, self.ctx.provenance(self.ctx.filename.clone()))
                .on_page(index)
                .with_caption(caption)
                .with_artifacts(vec![image.to_path_buf()]),
        )
    }
}

/// Number of pages in a converted deck.
async fn rendered_page_count(pdf_path: &Path) -> Result<usize> {
    let data = tokio::fs::read(pdf_path).await?;
    tokio::task::spawn_blocking(move || PdfDocument::from_bytes(&data).map(|doc| doc.page_count()))
        .await
        .map_err(|e| Error::ExtractionFailed(format!("page count task: {e}")))?
        .map_err(|e| Error::ExtractionFailed(format!("rendered deck is unreadable: {e}")))
}
