//! External collaborators of the pipeline.
//!
//! Rendering, format conversion, table export, vision and generic text
//! extraction are reached through these traits so deployments can swap in
//! their own services. The defaults shell out to Poppler and LibreOffice,
//! write CSV, and describe nothing.

mod export;
mod generic;
mod office;
mod poppler;
mod vision;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::geometry::BoundingBox;

pub use export::CsvTableExporter;
pub use generic::PlainTextExtractor;
pub use office::LibreOfficeConverter;
pub use poppler::PopplerRasterizer;
pub use vision::NoVision;

/// Renders pages of a paginated document to PNG.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render one page (zero-based), optionally clipped to a page-space
    /// region, at one pixel per point.
    async fn rasterize(
        &self,
        document: &Path,
        page_index: usize,
        clip: Option<BoundingBox>,
    ) -> Result<Vec<u8>>;
}

/// Format a deck can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertTarget {
    /// Paginated rendering
    Pdf,
    /// OOXML presentation (for reading legacy binary decks)
    Pptx,
}

impl ConvertTarget {
    pub fn extension(&self) -> &'static str {
        match self {
            ConvertTarget::Pdf => "pdf",
            ConvertTarget::Pptx => "pptx",
        }
    }
}

/// Converts slide decks to other formats.
#[async_trait]
pub trait DeckConverter: Send + Sync {
    /// Convert `deck` into `out_dir`, returning the path of the result.
    async fn convert(&self, deck: &Path, out_dir: &Path, target: ConvertTarget)
        -> Result<PathBuf>;
}

/// Serializes table rows into a side-artifact.
pub trait TableExporter: Send + Sync {
    /// File extension of the exported artifact.
    fn extension(&self) -> &'static str;

    /// Encode the rows (header first).
    fn export(&self, rows: &[Vec<String>]) -> Result<Vec<u8>>;
}

/// Decides whether an image is a chart, plot or diagram.
#[async_trait]
pub trait GraphClassifier: Send + Sync {
    async fn is_graph(&self, image: &[u8]) -> Result<bool>;
}

/// Produces natural-language descriptions of images.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe a standalone image.
    async fn describe_image(&self, image: &[u8]) -> Result<String>;

    /// Describe a chart, plot, table crop or diagram.
    async fn describe_graph(&self, image: &[u8]) -> Result<String>;
}

/// Text produced by a generic extractor, with whatever metadata it reports.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Extracts text from inputs no specialised extractor handles.
#[async_trait]
pub trait GenericExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedText>>;
}

/// The set of capabilities one pipeline run uses.
#[derive(Clone)]
pub struct Capabilities {
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub converter: Arc<dyn DeckConverter>,
    pub exporter: Arc<dyn TableExporter>,
    pub classifier: Arc<dyn GraphClassifier>,
    pub describer: Arc<dyn ImageDescriber>,
    pub generic: Arc<dyn GenericExtractor>,
}

impl Capabilities {
    pub fn with_rasterizer(mut self, rasterizer: impl PageRasterizer + 'static) -> Self {
        self.rasterizer = Arc::new(rasterizer);
        self
    }

    pub fn with_converter(mut self, converter: impl DeckConverter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    pub fn with_exporter(mut self, exporter: impl TableExporter + 'static) -> Self {
        self.exporter = Arc::new(exporter);
        self
    }

    pub fn with_classifier(mut self, classifier: impl GraphClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_describer(mut self, describer: impl ImageDescriber + 'static) -> Self {
        self.describer = Arc::new(describer);
        self
    }

    pub fn with_generic(mut self, generic: impl GenericExtractor + 'static) -> Self {
        self.generic = Arc::new(generic);
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            rasterizer: Arc::new(PopplerRasterizer::default()),
            converter: Arc::new(LibreOfficeConverter::default()),
            exporter: Arc::new(CsvTableExporter),
            classifier: Arc::new(NoVision),
            describer: Arc::new(NoVision),
            generic: Arc::new(PlainTextExtractor),
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// Run an external command, killing it if the future is dropped.
pub(crate) async fn run_command(
    name: &'static str,
    command: &mut tokio::process::Command,
) -> Result<Vec<u8>> {
    let output = command
        .kill_on_drop(true)
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| crate::Error::capability(name, format!("cannot spawn: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(crate::Error::capability(
            name,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(output.stdout)
}
