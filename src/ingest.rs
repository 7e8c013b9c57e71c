//! The ingestion orchestrator.
//!
//! Inputs are processed one after another in batch order. Each input is
//! dispatched by kind; whatever goes wrong inside one input is logged,
//! recorded in its [`InputReport`] and never stops the batch. The batch's
//! working directory is removed before [`Ingestor::ingest`] returns.

use std::sync::Arc;

use rayon::prelude::*;

use crate::capability::Capabilities;
use crate::detect::detect_image;
use crate::error::{Error, Result};
use crate::extract::{
    with_timeout, CancelFlag, FontHeadingDetector, HeadingDetector, PageExtractor, SlideExtractor,
};
use crate::model::{
    ContentUnit, IngestBatch, IngestInput, IngestOutcome, InputKind, InputReport, InputStatus,
    PageContent, SkippedItem, UnitContext, UnitKind,
};
use crate::options::IngestOptions;
use crate::parser::{PagedDocument, PdfDocument};
use crate::workspace::WorkingDir;

/// Turns batches of documents into content units.
///
/// # Example
///
/// ```no_run
/// use docingest::{IngestBatch, IngestInput, Ingestor};
///
/// # async fn run() -> docingest::Result<()> {
/// let ingestor = Ingestor::builder().build();
/// let batch = IngestBatch::new("research-7", "ref-2")
///     .with_input(IngestInput::from_named_bytes(std::fs::read("paper.pdf")?, "paper.pdf"));
///
/// let outcome = ingestor.ingest(batch).await?;
/// println!("{} units", outcome.units.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Ingestor {
    options: IngestOptions,
    caps: Capabilities,
    headings: Arc<dyn HeadingDetector>,
}

impl Ingestor {
    /// Create an ingestor with the given options and default capabilities.
    pub fn new(options: IngestOptions) -> Self {
        Self::builder().with_options(options).build()
    }

    pub fn builder() -> IngestorBuilder {
        IngestorBuilder::default()
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Ingest a batch.
    ///
    /// Only batch setup errors (empty identifiers, unusable working root)
    /// are returned as `Err`. Per-input failures are in the outcome's
    /// reports.
    pub async fn ingest(&self, batch: IngestBatch) -> Result<IngestOutcome> {
        self.ingest_with_cancel(batch, &CancelFlag::new()).await
    }

    /// Ingest a batch, stopping early once `cancel` is raised.
    ///
    /// Inputs finished before cancellation keep their units; the input in
    /// flight and all later ones are reported as failed.
    pub async fn ingest_with_cancel(
        &self,
        batch: IngestBatch,
        cancel: &CancelFlag,
    ) -> Result<IngestOutcome> {
        if batch.collection_id.trim().is_empty() {
            return Err(Error::InvalidInput("collection id is empty".to_string()));
        }
        if batch.item_id.trim().is_empty() {
            return Err(Error::InvalidInput("item id is empty".to_string()));
        }

        let root = self
            .options
            .working_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let workdir = WorkingDir::create(&root, &batch.collection_id, &batch.item_id)?;

        log::info!(
            "Ingesting {} inputs for {}/{}",
            batch.inputs.len(),
            batch.collection_id,
            batch.item_id
        );
        let outcome = self.run(&batch, &workdir, cancel).await;

        if let Err(e) = workdir.close() {
            log::warn!("{}", e);
        }
        log::info!(
            "Batch {}/{} done: {} units, {}/{} inputs succeeded",
            batch.collection_id,
            batch.item_id,
            outcome.units.len(),
            outcome.succeeded(),
            outcome.reports.len()
        );
        Ok(outcome)
    }

    async fn run(&self, batch: &IngestBatch, workdir: &WorkingDir, cancel: &CancelFlag) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();

        for (index, input) in batch.inputs.iter().enumerate() {
            let ctx = UnitContext::new(&batch.collection_id, &batch.item_id, &input.filename);
            let mut skipped = Vec::new();

            let result = match cancel.check() {
                Ok(()) => {
                    log::info!("Processing {} ({})", input.filename, input.kind);
                    self.ingest_input(index, input, &ctx, workdir, cancel, &mut skipped)
                        .await
                }
                Err(e) => Err(e),
            };

            let status = match result {
                Ok(units) if units.is_empty() => {
                    log::info!("{}: no content", input.filename);
                    InputStatus::Empty
                }
                Ok(units) => {
                    let count = units.len();
                    outcome.units.extend(units);
                    InputStatus::Completed { units: count }
                }
                Err(e) => {
                    log::error!("Failed to ingest {}: {}", input.filename, e);
                    InputStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            outcome.reports.push(InputReport {
                filename: input.filename.clone(),
                kind: input.kind,
                status,
                skipped,
            });
        }
        outcome
    }

    async fn ingest_input(
        &self,
        index: usize,
        input: &IngestInput,
        ctx: &UnitContext,
        workdir: &WorkingDir,
        cancel: &CancelFlag,
        skipped: &mut Vec<SkippedItem>,
    ) -> Result<Vec<ContentUnit>> {
        if input.data.is_empty() {
            return Err(Error::unreadable(&input.filename, "input is empty"));
        }

        match input.kind {
            InputKind::Image => self.ingest_image(input, ctx).await,
            InputKind::Pdf => {
                self.ingest_pdf(index, input, ctx, workdir, cancel, skipped)
                    .await
            }
            InputKind::SlideDeck => {
                let path = workdir.write_source(index, &input.filename, &input.data)?;
                let slides = SlideExtractor {
                    ctx,
                    options: &self.options,
                    caps: &self.caps,
                    workdir,
                    cancel,
                    input_index: index,
                };
                slides.extract(&path, &input.data, skipped).await
            }
            InputKind::Other => self.ingest_other(index, input, ctx, workdir).await,
        }
    }

    /// A standalone raster image: one described unit.
    async fn ingest_image(&self, input: &IngestInput, ctx: &UnitContext) -> Result<Vec<ContentUnit>> {
        let format = detect_image(&input.data).map_err(|e| Error::unreadable(&input.filename, e))?;
        log::debug!("{}: {:?} image", input.filename, format);

        let description = with_timeout(
            &input.filename,
            self.options.item_timeout,
            self.caps.describer.describe_image(&input.data),
        )
        .await?;

        let text = format!(
            "This is an image({}) with the following description: \n{}",
            input.filename, description
        );
        let unit = ContentUnit::new(UnitKind::Image, text, ctx.provenance(&input.filename))
            .with_caption(description);
        Ok(vec![unit])
    }

    /// A paginated document: parse every page, then run the page pipeline
    /// in page order.
    async fn ingest_pdf(
        &self,
        index: usize,
        input: &IngestInput,
        ctx: &UnitContext,
        workdir: &WorkingDir,
        cancel: &CancelFlag,
        skipped: &mut Vec<SkippedItem>,
    ) -> Result<Vec<ContentUnit>> {
        let (document, pages) = self.parse_pdf(input).await?;
        let path = workdir.write_source(index, &input.filename, &input.data)?;

        let extractor = PageExtractor {
            ctx,
            options: &self.options,
            caps: &self.caps,
            headings: self.headings.as_ref(),
            document,
            document_path: &path,
            input_index: index,
            workdir,
            cancel,
        };

        let mut units = Vec::new();
        let mut continuation = None;
        for (page_index, page) in pages.into_iter().enumerate() {
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    let tag = format!("{}-page{}", ctx.stem(), page_index);
                    log::warn!("Skipping {}: {}", tag, e);
                    skipped.push(SkippedItem::new(tag, e));
                    continuation = None;
                    continue;
                }
            };

            let output = extractor.process_page(&page, continuation).await?;
            continuation = output.continuation;
            units.extend(output.units);
            skipped.extend(output.skipped);
        }
        Ok(units)
    }

    /// Load the document and lay out its pages off the async runtime.
    async fn parse_pdf(
        &self,
        input: &IngestInput,
    ) -> Result<(Arc<dyn PagedDocument>, Vec<Result<PageContent>>)> {
        let data = input.data.clone();
        let filename = input.filename.clone();
        let parallel = self.options.parallel;

        let (document, pages) = tokio::task::spawn_blocking(move || -> Result<_> {
            let document =
                PdfDocument::from_bytes(&data).map_err(|e| Error::unreadable(&filename, e))?;
            let count = document.page_count();
            log::debug!("{}: PDF {} with {} pages", filename, document.version(), count);

            let pages: Vec<Result<PageContent>> = if parallel {
                (0..count).into_par_iter().map(|i| document.page(i)).collect()
            } else {
                (0..count).map(|i| document.page(i)).collect()
            };
            Ok((document, pages))
        })
        .await
        .map_err(|e| Error::ExtractionFailed(format!("parse task: {e}")))??;

        let document: Arc<dyn PagedDocument> = Arc::new(document);
        Ok((document, pages))
    }

    /// Anything else goes to the generic extractor; its output is retagged
    /// with the batch's provenance.
    async fn ingest_other(
        &self,
        index: usize,
        input: &IngestInput,
        ctx: &UnitContext,
        workdir: &WorkingDir,
    ) -> Result<Vec<ContentUnit>> {
        let path = workdir.write_source(index, &input.filename, &input.data)?;
        let extracted = with_timeout(
            &input.filename,
            self.options.conversion_timeout,
            self.caps.generic.extract(&path),
        )
        .await?;

        Ok(extracted
            .into_iter()
            .filter(|e| !e.text.trim().is_empty())
            .map(|e| {
                let mut unit = ContentUnit::new(UnitKind::Text, e.text, ctx.provenance(&input.filename));
                unit.extra = e.metadata;
                unit
            })
            .collect())
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Ingestor`].
#[derive(Default)]
pub struct IngestorBuilder {
    options: IngestOptions,
    caps: Capabilities,
    headings: Option<Arc<dyn HeadingDetector>>,
}

impl IngestorBuilder {
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Replace the heading heuristic used to group page text.
    pub fn with_heading_detector(mut self, detector: impl HeadingDetector + 'static) -> Self {
        self.headings = Some(Arc::new(detector));
        self
    }

    pub fn build(self) -> Ingestor {
        Ingestor {
            options: self.options,
            caps: self.caps,
            headings: self
                .headings
                .unwrap_or_else(|| Arc::new(FontHeadingDetector::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_ids_are_rejected() {
        let ingestor = Ingestor::default();
        let err = ingestor.ingest(IngestBatch::new("", "item")).await.unwrap_err();
        assert!(err.is_batch_fatal());

        let err = ingestor.ingest(IngestBatch::new("coll", " ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unusable_working_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let ingestor = Ingestor::new(IngestOptions::new().with_working_root(&file));
        let err = ingestor.ingest(IngestBatch::new("c", "i")).await.unwrap_err();
        assert!(matches!(err, Error::WorkingStorage(_)));
    }

    #[tokio::test]
    async fn test_empty_input_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(IngestOptions::new().with_working_root(dir.path()));
        let batch = IngestBatch::new("c", "i")
            .with_input(IngestInput::from_named_bytes(Vec::new(), "blank.pdf"))
            .with_input(IngestInput::from_named_bytes(b"hello".to_vec(), "notes.txt"));

        let outcome = ingestor.ingest(batch).await.unwrap();
        assert!(!outcome.reports[0].is_success());
        assert_eq!(outcome.reports[1].status, InputStatus::Completed { units: 1 });
        assert_eq!(outcome.units[0].text, "hello");
        assert_eq!(outcome.units[0].provenance.source, "notes.txt");
    }

    #[tokio::test]
    async fn test_cancelled_batch_keeps_nothing_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Ingestor::new(IngestOptions::new().with_working_root(dir.path()));
        let batch = IngestBatch::new("c", "i")
            .with_input(IngestInput::from_named_bytes(b"hello".to_vec(), "a.txt"));

        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcome = ingestor.ingest_with_cancel(batch, &cancel).await.unwrap();
        assert!(outcome.units.is_empty());
        assert!(matches!(
            outcome.reports[0].status,
            InputStatus::Failed { .. }
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
