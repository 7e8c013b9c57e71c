//! The content unit: the normalized record handed to the indexing side.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;

/// What a content unit was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Text,
    Table,
    Image,
}

/// Correlation and origin fields carried by every unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Caller-assigned collection identifier
    pub collection_id: String,
    /// Caller-assigned item identifier
    pub item_id: String,
    /// Name of the input file the unit came from
    pub source_filename: String,
    /// Kind-specific source tag, e.g. `report-page2-table1`
    pub source: String,
    /// When the unit was produced
    pub created_at: DateTime<Utc>,
}

/// One normalized (text, metadata) record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    /// The indexable body
    pub text: String,

    /// Text, table or image
    pub kind: UnitKind,

    /// Zero-based page (or slide) index, when the input is paginated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,

    /// Region of the page the unit covers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,

    /// Synthesized description (tables and images)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Rendered side-artifacts in working storage; removed at batch end
    #[serde(skip)]
    pub artifact_paths: Vec<PathBuf>,

    /// Where the unit came from
    pub provenance: Provenance,

    /// Additional metadata reported by a generic extractor
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ContentUnit {
    /// Create a unit with no positional data.
    pub fn new(kind: UnitKind, text: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            text: text.into(),
            kind,
            page_number: None,
            bounding_box: None,
            caption: None,
            artifact_paths: Vec::new(),
            provenance,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the page index.
    pub fn on_page(mut self, page: usize) -> Self {
        self.page_number = Some(page);
        self
    }

    /// Set the page region.
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }

    /// Set the caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Attach working-storage artifacts.
    pub fn with_artifacts(mut self, paths: Vec<PathBuf>) -> Self {
        self.artifact_paths = paths;
        self
    }
}

/// Stamps provenance onto units produced for one input of a batch.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub collection_id: String,
    pub item_id: String,
    pub filename: String,
}

impl UnitContext {
    pub fn new(
        collection_id: impl Into<String>,
        item_id: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            collection_id: collection_id.into(),
            item_id: item_id.into(),
            filename: filename.into(),
        }
    }

    /// Provenance for a unit with the given source tag, timestamped now.
    pub fn provenance(&self, source: impl Into<String>) -> Provenance {
        Provenance {
            collection_id: self.collection_id.clone(),
            item_id: self.item_id.clone(),
            source_filename: self.filename.clone(),
            source: source.into(),
            created_at: Utc::now(),
        }
    }

    /// Filename without its final extension, used to build source tags.
    pub fn stem(&self) -> &str {
        match self.filename.rfind('.') {
            Some(pos) if pos > 0 => &self.filename[..pos],
            _ => &self.filename,
        }
    }

    /// Source tag for an item on a page, e.g. `report-page0-table1`.
    pub fn page_tag(&self, page: usize, item: &str, counter: impl std::fmt::Display) -> String {
        format!("{}-page{}-{}{}", self.stem(), page, item, counter)
    }
}
