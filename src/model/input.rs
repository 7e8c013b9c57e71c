//! Batch inputs and per-input reports.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::unit::ContentUnit;
use crate::error::Result;

/// Declared kind of an input, deciding which extractor handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// A raster image (PNG, JPEG)
    Image,
    /// A paginated document (PDF)
    Pdf,
    /// A slide deck (PPT, PPTX)
    SlideDeck,
    /// Anything else, handed to the generic extractor
    Other,
}

impl InputKind {
    /// Infer the kind from a filename extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Self {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png" | "jpg" | "jpeg") => InputKind::Image,
            Some("pdf") => InputKind::Pdf,
            Some("ppt" | "pptx") => InputKind::SlideDeck,
            _ => InputKind::Other,
        }
    }
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InputKind::Image => "image",
            InputKind::Pdf => "pdf",
            InputKind::SlideDeck => "slide deck",
            InputKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// One file of a batch.
#[derive(Debug, Clone)]
pub struct IngestInput {
    /// File content
    pub data: Vec<u8>,
    /// Declared kind
    pub kind: InputKind,
    /// Original filename
    pub filename: String,
}

impl IngestInput {
    /// Create an input with an explicit kind.
    pub fn new(data: Vec<u8>, kind: InputKind, filename: impl Into<String>) -> Self {
        Self {
            data,
            kind,
            filename: filename.into(),
        }
    }

    /// Create an input whose kind is inferred from the filename.
    pub fn from_named_bytes(data: Vec<u8>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let kind = InputKind::from_filename(&filename);
        Self {
            data,
            kind,
            filename,
        }
    }

    /// Read a file from disk; the kind is inferred from its name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_named_bytes(data, filename))
    }
}

/// A batch of inputs sharing correlation identifiers.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    pub inputs: Vec<IngestInput>,
    pub collection_id: String,
    pub item_id: String,
}

impl IngestBatch {
    pub fn new(collection_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            inputs: Vec::new(),
            collection_id: collection_id.into(),
            item_id: item_id.into(),
        }
    }

    /// Append an input.
    pub fn with_input(mut self, input: IngestInput) -> Self {
        self.inputs.push(input);
        self
    }
}

/// An item (table, image, slide, page) dropped while processing an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Source tag of the dropped item
    pub source: String,
    /// Why it was dropped
    pub reason: String,
}

impl SkippedItem {
    pub fn new(source: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            source: source.into(),
            reason: reason.to_string(),
        }
    }
}

/// How one input fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InputStatus {
    /// Produced at least one unit
    Completed { units: usize },
    /// Processed without error but yielded nothing
    Empty,
    /// Abandoned; no units from this input are in the outcome
    Failed { reason: String },
}

/// Per-input success flag plus the items dropped along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputReport {
    pub filename: String,
    pub kind: InputKind,
    pub status: InputStatus,
    pub skipped: Vec<SkippedItem>,
}

impl InputReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, InputStatus::Failed { .. })
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Units in input order, then page order
    pub units: Vec<ContentUnit>,
    /// One report per input, in input order
    pub reports: Vec<InputReport>,
}

impl IngestOutcome {
    /// Number of inputs that did not fail.
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    /// Reports of failed inputs.
    pub fn failures(&self) -> impl Iterator<Item = &InputReport> {
        self.reports.iter().filter(|r| !r.is_success())
    }
}
