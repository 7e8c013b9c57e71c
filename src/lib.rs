//! # docingest
//!
//! Document ingestion pipeline for retrieval indexing.
//!
//! This library turns batches of heterogeneous documents (PDFs, slide
//! decks, raster images, arbitrary files) into a flat, ordered sequence of
//! [`ContentUnit`]s ready to be embedded and stored.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docingest::{IngestBatch, IngestInput, Ingestor};
//!
//! #[tokio::main]
//! async fn main() -> docingest::Result<()> {
//!     let batch = IngestBatch::new("research-7", "ref-2")
//!         .with_input(IngestInput::from_path("paper.pdf")?)
//!         .with_input(IngestInput::from_path("slides.pptx")?);
//!
//!     let outcome = Ingestor::default().ingest(batch).await?;
//!     for unit in &outcome.units {
//!         println!("{:?} {}", unit.kind, unit.provenance.source);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Layout analysis**: column-aware reading order, heading grouping,
//!   running header/footer removal
//! - **Ruled tables**: grid detection from drawn rules, CSV export, captions
//!   from the surrounding text
//! - **Embedded images**: decorative images filtered out, graph-like images
//!   described
//! - **Slide decks**: one unit per rendered slide with its speaker notes
//! - **Partial failure**: per-item timeouts and per-input reports instead of
//!   batch-wide errors
//! - **Scoped storage**: side artifacts live in a per-batch directory that is
//!   always removed

pub mod capability;
pub mod detect;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod ingest;
pub mod model;
pub mod options;
pub mod parser;
pub mod workspace;

// Re-export commonly used types
pub use capability::{
    Capabilities, ConvertTarget, CsvTableExporter, DeckConverter, ExtractedText,
    GenericExtractor, GraphClassifier, ImageDescriber, LibreOfficeConverter, NoVision,
    PageRasterizer, PlainTextExtractor, PopplerRasterizer, TableExporter,
};
pub use detect::{detect_image, detect_pdf, PdfFormat};
pub use error::{Error, Result};
pub use extract::{CancelFlag, FontHeadingDetector, HeadingDetector};
pub use geometry::{intersects, is_in_margin, is_trivial_image, BoundingBox};
pub use ingest::{Ingestor, IngestorBuilder};
pub use model::{
    ContentUnit, IngestBatch, IngestInput, IngestOutcome, InputKind, InputReport, InputStatus,
    Provenance, SkippedItem, UnitKind,
};
pub use options::{IngestOptions, TableDetectorConfig};
pub use parser::{PagedDocument, PdfDocument};

/// Ingest a batch with default options and capabilities.
///
/// # Example
///
/// ```no_run
/// use docingest::{ingest, IngestBatch, IngestInput};
///
/// # async fn run() -> docingest::Result<()> {
/// let batch = IngestBatch::new("c1", "i1").with_input(IngestInput::from_path("scan.png")?);
/// let outcome = ingest(batch).await?;
/// assert_eq!(outcome.reports.len(), 1);
/// # Ok(())
/// # }
/// ```
pub async fn ingest(batch: IngestBatch) -> Result<IngestOutcome> {
    Ingestor::default().ingest(batch).await
}
