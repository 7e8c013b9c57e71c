//! Data model shared by the parser, the extractors and the orchestrator.
//!
//! Page-level types ([`PageContent`], [`RawBlock`], ...) live only for the
//! duration of one page; [`ContentUnit`] is the pipeline's output.

mod input;
mod page;
mod unit;

pub use input::{
    IngestBatch, IngestInput, IngestOutcome, InputKind, InputReport, InputStatus, SkippedItem,
};
pub use page::{BlockKind, ExtractedImage, ImagePlacement, PageContent, RawBlock, TextFragment};
pub use unit::{ContentUnit, Provenance, UnitContext, UnitKind};
